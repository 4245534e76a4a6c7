//! docsmith CLI — build a documentation tree from a manifest.
//!
//! Materializes local and remote content into an output directory and
//! validates the external links it contains.

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
