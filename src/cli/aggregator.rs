//! `aggregator` command

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use eventing_bench_core::{
    AggregatorBuilder, AggregatorConfig, JsonFileSink, MemorySink, MetricsSink, RunMetadata,
};

use super::AggregatorArgs;

pub async fn run(args: AggregatorArgs) -> Result<()> {
    let config = AggregatorConfig::new(args.listen)
        .with_expected_batches(args.expect_records)
        .with_max_message_bytes(args.max_message_bytes);

    let sink: Arc<dyn MetricsSink> = match args.output {
        Some(path) => Arc::new(JsonFileSink::new(
            path,
            RunMetadata {
                benchmark_key: args.benchmark_key,
                benchmark_name: args.benchmark_name,
                tags: args.tags,
            },
        )),
        None => {
            tracing::warn!("No --output given, results are only logged");
            Arc::new(MemorySink::new())
        }
    };

    let aggregator = AggregatorBuilder::new()
        .config(config)
        .sink(sink)
        .record_capacity(args.expect_events)
        .shutdown_hook(|| tracing::error!("Aggregator shutting down after a fatal error"))
        .build()
        .await?;

    let report = aggregator
        .run_with_signal_handling(args.timeout.map(Duration::from_secs))
        .await
        .context("aggregator run failed")?;

    tracing::info!(
        batches = report.batches,
        complete = report.complete,
        delivery_ratio = report.summary.delivery_ratio(),
        output = %report.output,
        "Aggregator finished"
    );
    Ok(())
}
