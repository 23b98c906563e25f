//! showcase-load: randomized traffic for the OTel showcase services.
//!
//! Each simulated user repeatedly picks one of `/slow`, `/error`,
//! `/compute` and `/server_request` uniformly, issues a GET and then
//! waits a random think time. Per-endpoint statistics are printed when the
//! run ends (after `--run-time`, or on Ctrl+C).

mod runner;
mod scenario;
mod stats;

use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use crate::runner::LoadConfig;
use crate::scenario::WaitTime;

/// Randomized traffic generator for the OTel showcase services.
#[derive(Parser)]
#[command(name = "showcase-load")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Service base URL (e.g., http://localhost:8001)
    #[arg(long, env = "SHOWCASE_TARGET", default_value = "http://localhost:8001")]
    host: String,

    /// Number of concurrent users
    #[arg(short, long, default_value = "10")]
    users: usize,

    /// Users started per second
    #[arg(short = 'r', long, default_value = "1")]
    spawn_rate: f64,

    /// Stop after this many seconds (default: run until Ctrl+C)
    #[arg(short = 't', long)]
    run_time: Option<u64>,

    /// Minimum think time between requests, in seconds
    #[arg(long, default_value = "1")]
    min_wait: f64,

    /// Maximum think time between requests, in seconds
    #[arg(long, default_value = "5")]
    max_wait: f64,

    /// `n` sent to /compute
    #[arg(long, default_value = "10")]
    compute_n: i64,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Resolve on Ctrl+C, or after `run_time` when one is given.
async fn stop_signal(run_time: Option<Duration>) {
    let deadline = async {
        match run_time {
            Some(run_time) => tokio::time::sleep(run_time).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, stopping");
        }
        () = deadline => {
            tracing::info!("Run time elapsed, stopping");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = LoadConfig {
        target: cli.host,
        users: cli.users,
        spawn_interval: runner::spawn_interval(cli.spawn_rate)?,
        wait: WaitTime::from_secs(cli.min_wait, cli.max_wait)?,
        compute_n: cli.compute_n,
    };

    let report = runner::run(config, stop_signal(cli.run_time.map(Duration::from_secs))).await?;
    println!("{}", report.render(cli.output)?);

    Ok(())
}
