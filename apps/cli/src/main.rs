//! fleetsql CLI: Fleet integration package metadata as a queryable SQL store.
//!
//! Builds a SQLite store from an integrations checkout and serves it to MCP
//! clients over stdio or HTTP.

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
