//! CLI commands

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::agent::clean_and_correct_sql;
use crate::config::AppConfig;
use crate::core::state::{warehouse_options, AppState};
use crate::db::{format_rows, SchemaContext, Warehouse};

#[derive(Parser)]
#[command(name = "olist-agent")]
#[command(about = "Ask analytics questions about the Olist warehouse in plain language", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.olist-agent/config.yml)
    #[arg(long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,
    },

    /// Interactive question-and-answer session in the terminal
    Chat,

    /// Guard and run a single statement without the model
    Sql {
        /// SELECT/WITH statement
        query: String,
    },

    /// Print the schema context handed to the model
    Schema,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    // Create a multi-threaded runtime for CLI operations
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        match cli.command {
            Commands::Serve { host, port } => {
                let state = Arc::new(
                    AppState::initialize(&config)
                        .await
                        .context("Startup failed")?,
                );

                let host = host.unwrap_or_else(|| config.server.host.clone());
                let port = port.unwrap_or(config.server.port);

                tracing::info!("Starting API server on {}:{}", host, port);
                crate::api::ApiServer::new(host, port, state).run().await
            }

            Commands::Chat => {
                let state = AppState::initialize(&config)
                    .await
                    .context("Startup failed")?;
                repl(&state).await
            }

            Commands::Sql { query } => {
                let warehouse = open_warehouse(&config).await?;
                let vetted = clean_and_correct_sql(&query)?;
                let rows = warehouse.run_sql(&vetted).await?;
                println!("{}", format_rows(&rows));
                Ok(())
            }

            Commands::Schema => {
                let warehouse = open_warehouse(&config).await?;
                let schema = SchemaContext::build(&warehouse, &config.allowed_tables).await?;
                println!("{}", schema);
                Ok(())
            }
        }
    })
}

async fn open_warehouse(config: &AppConfig) -> Result<Warehouse> {
    let path = config.resolve_warehouse_path()?;
    let warehouse = Warehouse::open(&path, warehouse_options(config))?;
    warehouse.ping().await?;
    Ok(warehouse)
}

/// Read questions from stdin until `quit`/`exit` or end of input
async fn repl(state: &AppState) -> Result<()> {
    println!("\nAgent connected. Ask me about your Olist database!");
    println!("Type 'quit' or 'exit' to stop.\n");

    let conversation_id = state.sessions.create().await?;
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!(">> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let question = line?.trim().to_string();

        if matches!(question.to_lowercase().as_str(), "quit" | "exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match state
            .orchestrator
            .run_turn(Some(&conversation_id), &question)
            .await
        {
            Ok(outcome) => {
                println!("\n=== Agent Response ===");
                println!("{}", outcome.reply);
                println!("======================\n");
            }
            Err(e) => println!("\n[ERROR] {}\n", e),
        }
    }

    println!("Goodbye!");
    Ok(())
}
