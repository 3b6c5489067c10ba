//! Olist agent - natural-language analytics over the Olist warehouse

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "olist_agent=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Olist agent v{}", env!("CARGO_PKG_VERSION"));

    // Run CLI
    olist_agent::cli::run()?;

    Ok(())
}
