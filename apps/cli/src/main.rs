//! Underwrite CLI: draft commercial real estate underwriting memos from
//! free-text property descriptions.
//!
//! Signals are extracted from the text, matched against BigQuery market
//! data, and handed to Gemini together with a fixed memo template.

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
