//! chainfold CLI: incremental accumulation over long inputs.
//!
//! Walks time periods or document chunks one at a time, folding each
//! model response into a running aggregate.

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
