//! ragrelay - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use ragrelay::cli::{selected_model, Args, Commands};
use ragrelay::rag::{AnswerOptions, ContextRetriever, ContextSource, RagPipeline};
use ragrelay::types::Prompt;
use ragrelay::{logging, Config, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(args.verbosity());

    if let Err(e) = run(args).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.clone()).context("Failed to load configuration")?;

    // Ctrl-C cancels in-flight requests and pending retries
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling");
            trigger.cancel();
        }
    });

    match args.command {
        Commands::Ask {
            prompt,
            model,
            quality,
            retrieval,
        } => {
            if let Some(top_k) = retrieval.top_k {
                config.pipeline.top_k = top_k;
            }
            config.validate()?;

            let pipeline = RagPipeline::from_config_with_cancellation(&config, token)?;
            let options = AnswerOptions {
                filter: retrieval.filter(),
                model: selected_model(model, quality),
            };

            info!("answering prompt");
            let answer = pipeline
                .answer_with(&Prompt::new(prompt), None, &options)
                .await
                .context("Failed to answer prompt")?;

            println!("{}", answer);
        }

        Commands::Query { prompt, retrieval } => {
            let top_k = retrieval.top_k.unwrap_or(config.pipeline.top_k);
            let retriever = ContextRetriever::new(
                config.datastore.clone(),
                RetryPolicy::new(config.retry.to_retry_config()),
            )?
            .with_cancellation(token);

            let chunks = retriever
                .retrieve(&Prompt::new(prompt), top_k, retrieval.filter().as_ref())
                .await
                .context("Failed to query datastore")?;

            if chunks.is_empty() {
                println!("{}", "No matching context.".dimmed());
            }
            for (idx, chunk) in chunks.iter().enumerate() {
                let source = chunk.source().unwrap_or("unknown source");
                println!(
                    "{} {} {}",
                    format!("[{}]", idx + 1).bold(),
                    format!("{:.3}", chunk.score).green(),
                    source.dimmed()
                );
                println!("{}\n", chunk.text);
            }
        }

        Commands::Config => {
            print!("{}", config.redacted().to_toml()?);
        }
    }

    Ok(())
}
