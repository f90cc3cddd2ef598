//! AOI Relay CLI — headless bridge from AOI tester output to MES imports.
//!
//! Watches an input directory for result files, enriches each record from
//! the MES store, and emits Valor GenericTester XML reports.

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
