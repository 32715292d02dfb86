//! ftpview CLI Binary

use anyhow::Context;
use clap::Parser;
use ftpview::cli::{Cli, CliContext};
use ftpview::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let context = CliContext::new(&cli.workspace)
        .with_context(|| format!("Failed to load settings for {}", cli.workspace.display()))?;
    let logging = cli.logging_config(&context.settings().logging);
    init_logging(Some(&logging)).context("Failed to initialize logging")?;

    let output = context.execute(&cli.command).await?;
    println!("{}", output);
    Ok(())
}
