//! EventHarvest CLI: pull events from a listing page into a backing store.
//!
//! Walks the listing, resolves each detail page for category and
//! coordinates, normalizes the result and saves it one item at a time.

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
