//! CLI argument parsing and command dispatch

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use eventing_bench_core::config::{
    DEFAULT_EVENT_SOURCE, DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_NAMESPACE, POD_NAMESPACE_ENV,
    POD_NAME_ENV,
};

mod aggregator;
mod receiver;
mod sender;

#[derive(Parser)]
#[command(name = "eventing-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate paced traffic and report what was sent
    Sender(SenderArgs),
    /// Collect reports, compute statistics and store them
    Aggregator(AggregatorArgs),
    /// Record delivered events and report them
    Receiver(ReceiverArgs),
}

#[derive(Args)]
pub struct SenderArgs {
    /// Aggregator base URL
    #[arg(long)]
    pub aggregator: String,

    /// URL events are POSTed to
    #[arg(long)]
    pub target: String,

    /// Comma-separated phases, each RPS:SECONDS
    #[arg(long)]
    pub pace: String,

    /// Payload size of each event in bytes
    #[arg(long, default_value_t = 100)]
    pub msg_size: usize,

    /// Warmup length in seconds (0 disables)
    #[arg(long, default_value_t = 10)]
    pub warmup: u64,

    /// Source stamped on events
    #[arg(long, env = POD_NAME_ENV, default_value = DEFAULT_EVENT_SOURCE)]
    pub source: String,

    /// Namespace of the run
    #[arg(long, env = POD_NAMESPACE_ENV, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
}

#[derive(Args)]
pub struct AggregatorArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:10000")]
    pub listen: SocketAddr,

    /// Number of reports (sender and receiver batches) to wait for
    #[arg(long, default_value_t = 2)]
    pub expect_records: usize,

    /// Events expected per record class; pre-sizes the aggregation maps
    #[arg(long, default_value_t = 0)]
    pub expect_events: usize,

    /// Write results as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Benchmark key stored with the results
    #[arg(long, default_value = "")]
    pub benchmark_key: String,

    /// Benchmark name stored with the results
    #[arg(long, default_value = "")]
    pub benchmark_name: String,

    /// Tag stored with the results (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Stop waiting after this many seconds and use what arrived
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Largest accepted report body in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,
}

#[derive(Args)]
pub struct ReceiverArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Aggregator base URL
    #[arg(long)]
    pub aggregator: String,
}

/// Run the selected command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Sender(args) => sender::run(args).await,
        Commands::Aggregator(args) => aggregator::run(args).await,
        Commands::Receiver(args) => receiver::run(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_args() {
        let cli = Cli::try_parse_from([
            "eventing-bench",
            "sender",
            "--aggregator",
            "http://aggregator:10000",
            "--target",
            "http://broker/default/default",
            "--pace",
            "100:10,200:20",
            "--msg-size",
            "512",
        ])
        .unwrap();

        match cli.command {
            Commands::Sender(args) => {
                assert_eq!(args.pace, "100:10,200:20");
                assert_eq!(args.msg_size, 512);
                assert_eq!(args.warmup, 10);
            }
            _ => panic!("Expected sender command"),
        }
    }

    #[test]
    fn test_aggregator_args_defaults() {
        let cli = Cli::try_parse_from(["eventing-bench", "aggregator", "--tag", "a", "--tag", "b"])
            .unwrap();

        match cli.command {
            Commands::Aggregator(args) => {
                assert_eq!(args.listen.port(), 10000);
                assert_eq!(args.expect_records, 2);
                assert_eq!(args.expect_events, 0);
                assert_eq!(args.tags, vec!["a", "b"]);
                assert!(args.output.is_none());
                assert!(args.timeout.is_none());
            }
            _ => panic!("Expected aggregator command"),
        }
    }

    #[test]
    fn test_receiver_requires_aggregator() {
        assert!(Cli::try_parse_from(["eventing-bench", "receiver"]).is_err());
    }
}
