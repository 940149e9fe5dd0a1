//! footprint CLI main entry point

use anyhow::Result;
use clap::Parser;
use footprint_cli::commands::{Cli, CommandExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let executor = CommandExecutor::new();
    let result = executor.execute(cli.command).await?;

    if result.success {
        std::process::exit(0);
    } else {
        eprintln!("{}", result.message);
        std::process::exit(1);
    }
}
