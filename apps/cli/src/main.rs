//! Pathwise CLI: verified enrichment for career pathways.
//!
//! Reads baseline career entities, attaches researched salary, demand and
//! training data where it can be verified, and caches the results.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
