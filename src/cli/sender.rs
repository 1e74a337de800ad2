//! `sender` command

use std::sync::Arc;

use anyhow::{Context, Result};
use eventing_bench_core::{
    AggregatorClient, HttpLoadGenerator, PacePlan, SenderBuilder, SenderConfig,
};

use super::SenderArgs;

pub async fn run(args: SenderArgs) -> Result<()> {
    let plan = PacePlan::parse(&args.pace)
        .with_context(|| format!("invalid --pace '{}'", args.pace))?;

    let mut config = SenderConfig::default()
        .with_event_source(args.source.clone())
        .with_payload_size(args.msg_size)
        .with_warmup_seconds(args.warmup);
    config.namespace = args.namespace;

    let publisher = AggregatorClient::connect(&args.aggregator)
        .await
        .context("failed to connect to aggregator")?;
    let generator = HttpLoadGenerator::new(&args.target, args.source);

    let sender = SenderBuilder::new()
        .config(config)
        .plan(plan)
        .load_generator(Arc::new(generator))
        .publisher(Arc::new(publisher))
        .build()?;

    let report = sender.run().await.context("sender run failed")?;

    tracing::info!(
        sent = report.sent,
        accepted = report.accepted,
        failed = report.failed,
        "Sender finished"
    );
    Ok(())
}
