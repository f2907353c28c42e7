//! # Ragline CLI (`rag`)
//!
//! Commands for ingesting documents into the vector index, asking grounded
//! questions, and serving both pipelines over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag ingest <pdf>` | Load, chunk, embed, and upsert a document |
//! | `rag query "<question>"` | Retrieve context and generate a grounded answer |
//! | `rag serve` | Start the HTTP event server |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ragline::config::{load_config, Config};
use ragline::ingest::run_ingest;
use ragline::models::{IngestEvent, QueryEvent};
use ragline::orchestrator::{PipelineRun, RetryPolicy};
use ragline::query::run_query;
use ragline::server::run_server;
use ragline::services::Services;

/// Ragline — a retrieval-augmented-generation pipeline over a vector index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; if the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Ragline — ingest documents and answer questions grounded in retrieved context",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest a document: extract, chunk, embed, and upsert.
    ///
    /// Re-ingesting the same document with the same source id overwrites
    /// the existing records instead of duplicating them.
    Ingest {
        /// Path to the document (PDF or plain text).
        pdf_path: String,

        /// Stable identifier for the document. Defaults to the path.
        #[arg(long)]
        source_id: Option<String>,
    },

    /// Ask a question and get an answer grounded in retrieved chunks.
    Query {
        /// The question to answer.
        question: String,

        /// How many chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Start the HTTP event server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Ingest {
            pdf_path,
            source_id,
        } => {
            let services = Services::from_config(&config)?;
            let run = PipelineRun::new(RetryPolicy::from_config(&config.orchestrator));
            let event = IngestEvent {
                pdf_path,
                source_id,
            };
            let receipt = run_ingest(&services, &config, &run, &event).await?;
            println!("ingested {} chunks", receipt.ingested);
        }

        Commands::Query { question, top_k } => {
            let services = Services::from_config(&config)?;
            let run = PipelineRun::new(RetryPolicy::from_config(&config.orchestrator));
            let event = QueryEvent { question, top_k };
            let result = run_query(&services, &config, &run, &event).await?;

            println!("{}", result.answer);
            println!();
            println!("contexts: {}", result.num_contexts);
            if !result.sources.is_empty() {
                println!(
                    "sources: {}",
                    result.sources.into_iter().collect::<Vec<_>>().join(", ")
                );
            }
        }

        Commands::Serve => {
            let services = Services::from_config(&config)?;
            run_server(&config, services).await?;
        }
    }

    Ok(())
}
