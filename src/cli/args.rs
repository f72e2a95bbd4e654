//! Command-line argument parsing for ragrelay
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::generation::QUALITY_MODEL;
use crate::rag::QueryFilter;

/// ragrelay - answer questions grounded in your document store
#[derive(Parser, Debug)]
#[command(name = "ragrelay")]
#[command(version)]
#[command(about = "Answer questions with context fetched from a document retrieval service", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -v (info), -vv (debug), -vvv (trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve context and generate a grounded answer
    Ask {
        /// Question to answer
        #[arg(value_name = "PROMPT")]
        prompt: String,

        /// Chat model identifier passed through to the provider
        #[arg(short, long, conflicts_with = "quality")]
        model: Option<String>,

        /// Use the higher quality (slower) model tier
        #[arg(long)]
        quality: bool,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Print the context chunks the document store returns for a prompt
    Query {
        /// Text to search for
        #[arg(value_name = "PROMPT")]
        prompt: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Display the effective configuration (secrets masked)
    Config,
}

/// Retrieval options shared by `ask` and `query`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RetrievalArgs {
    /// Maximum number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Restrict retrieval to one document
    #[arg(long)]
    pub document_id: Option<String>,

    /// Restrict retrieval to one source type (file, email, chat)
    #[arg(long)]
    pub source: Option<String>,
}

impl RetrievalArgs {
    /// Filter built from the flags, if any were given
    pub fn filter(&self) -> Option<QueryFilter> {
        if self.document_id.is_none() && self.source.is_none() {
            return None;
        }
        Some(QueryFilter {
            document_id: self.document_id.clone(),
            source: self.source.clone(),
            ..Default::default()
        })
    }
}

/// Resolve the model for `ask`: explicit name, quality tier, or config default
pub fn selected_model(model: Option<String>, quality: bool) -> Option<String> {
    model.or_else(|| quality.then(|| QUALITY_MODEL.to_string()))
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
    Trace,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                2 => Verbosity::Debug,
                _ => Verbosity::Trace,
            }
        }
    }
}

impl Verbosity {
    /// Default log directive for this verbosity
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}
