//! CLI module for ragrelay
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{selected_model, Args, Commands, RetrievalArgs, Verbosity};
