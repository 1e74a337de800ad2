//! eventing-bench - latency and throughput benchmark for event-delivery systems

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    if let Err(e) = cli::dispatch(cli.command).await {
        let message = format!("{e:#}");
        tracing::error!(error = %message, "eventing-bench failed");
        std::process::exit(1);
    }
}
