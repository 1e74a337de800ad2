//! `receiver` command

use std::sync::Arc;

use anyhow::{Context, Result};
use eventing_bench_core::{AggregatorClient, Receiver, ReceiverConfig};
use tokio_util::sync::CancellationToken;

use super::ReceiverArgs;

pub async fn run(args: ReceiverArgs) -> Result<()> {
    let publisher = AggregatorClient::connect(&args.aggregator)
        .await
        .context("failed to connect to aggregator")?;
    let receiver = Receiver::bind(ReceiverConfig::new(args.listen), Arc::new(publisher)).await?;

    let cancel = CancellationToken::new();
    let signal_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, stopping receiver...");
                    cancel.cancel();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
            }
        })
    };

    let result = receiver.run(cancel).await;
    signal_handle.abort();

    let reply = result.context("receiver run failed")?;
    tracing::info!(records = reply.count, "Receiver finished");
    Ok(())
}
