//! Load run: spawn users, stream their samples to one aggregator.

use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::scenario::{Task, WaitTime};
use crate::stats::{Outcome, Report, Sample, Stats};

/// Samples buffered between users and the aggregator.
const SAMPLE_CHANNEL_SIZE: usize = 1024;

/// Per-request timeout; `/slow` answers within two seconds.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Service base URL, e.g. `http://localhost:8001`.
    pub target: String,
    pub users: usize,
    /// Delay between two user starts.
    pub spawn_interval: Duration,
    pub wait: WaitTime,
    pub compute_n: i64,
}

/// Delay between two user starts for `spawn_rate` users per second.
///
/// A rate of zero or infinity starts every user at once.
pub fn spawn_interval(spawn_rate: f64) -> anyhow::Result<Duration> {
    anyhow::ensure!(
        spawn_rate >= 0.0,
        "spawn rate must be a non-negative number, got {spawn_rate}"
    );
    if spawn_rate == 0.0 || spawn_rate.is_infinite() {
        return Ok(Duration::ZERO);
    }
    Duration::try_from_secs_f64(1.0 / spawn_rate)
        .map_err(|e| anyhow::anyhow!("spawn rate {spawn_rate} is too small: {e}"))
}

impl LoadConfig {
    fn url(&self, task: Task) -> String {
        format!(
            "{}{}",
            self.target.trim_end_matches('/'),
            task.path(self.compute_n)
        )
    }
}

/// Run users until `shutdown` resolves, then report.
pub async fn run(config: LoadConfig, shutdown: impl Future<Output = ()>) -> anyhow::Result<Report> {
    let config = Arc::new(config);
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let (sample_tx, sample_rx) = mpsc::channel(SAMPLE_CHANNEL_SIZE);
    let (stop_tx, stop_rx) = watch::channel(false);
    let aggregator = tokio::spawn(aggregate(sample_rx));
    let started = Instant::now();

    tracing::info!(
        target = %config.target,
        users = config.users,
        spawn_interval_ms = config.spawn_interval.as_millis() as u64,
        "Starting load"
    );

    let mut users = JoinSet::new();
    {
        let spawning = async {
            let interval = config.spawn_interval;
            for id in 0..config.users {
                if id > 0 {
                    tokio::time::sleep(interval).await;
                }
                tracing::debug!(user = id, "spawning user");
                users.spawn(user(
                    client.clone(),
                    config.clone(),
                    sample_tx.clone(),
                    stop_rx.clone(),
                ));
            }
            std::future::pending::<()>().await
        };

        tokio::select! {
            () = spawning => {}
            () = shutdown => {}
        }
    }

    tracing::info!("Stopping users");
    let _ = stop_tx.send(true);
    drop(sample_tx);
    while users.join_next().await.is_some() {}

    let stats = aggregator.await?;
    Ok(stats.report(started.elapsed(), config.compute_n))
}

/// One simulated user: request, think, repeat.
async fn user(
    client: Client,
    config: Arc<LoadConfig>,
    samples: mpsc::Sender<Sample>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }

        let task = Task::random();
        let sample = tokio::select! {
            sample = issue(&client, &config, task) => sample,
            _ = stop.changed() => break,
        };
        if samples.send(sample).await.is_err() {
            break;
        }

        let wait = config.wait.sample();
        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            _ = stop.changed() => break,
        }
    }
}

/// Issue `task` once. Responses are not validated.
async fn issue(client: &Client, config: &LoadConfig, task: Task) -> Sample {
    let url = config.url(task);
    let started = Instant::now();
    let outcome = match client.get(&url).send().await {
        Ok(response) => {
            let status = response.status();
            let _ = response.bytes().await;
            if status.is_success() {
                Outcome::Success
            } else {
                Outcome::Status(status.as_u16())
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, url = %url, "request failed");
            Outcome::Transport
        }
    };
    Sample {
        task,
        latency: started.elapsed(),
        outcome,
    }
}

async fn aggregate(mut samples: mpsc::Receiver<Sample>) -> Stats {
    let mut stats = Stats::default();
    while let Some(sample) = samples.recv().await {
        stats.record(&sample);
    }
    stats
}
