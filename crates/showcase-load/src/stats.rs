//! Per-task request statistics and the end-of-run report.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::scenario::Task;
use crate::OutputFormat;

/// How a single request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx response.
    Success,
    /// Any other status code.
    Status(u16),
    /// No response at all (connect error, timeout, ...).
    Transport,
}

impl Outcome {
    pub fn is_failure(self) -> bool {
        !matches!(self, Outcome::Success)
    }
}

/// One finished request, streamed from a user to the aggregator.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub task: Task,
    pub latency: Duration,
    pub outcome: Outcome,
}

#[derive(Debug, Default, Clone)]
struct Accumulator {
    requests: u64,
    failures: u64,
    total: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
}

impl Accumulator {
    fn record(&mut self, sample: &Sample) {
        self.requests += 1;
        if sample.outcome.is_failure() {
            self.failures += 1;
        }
        self.total += sample.latency;
        self.min = Some(self.min.map_or(sample.latency, |m| m.min(sample.latency)));
        self.max = Some(self.max.map_or(sample.latency, |m| m.max(sample.latency)));
    }

    fn merge(&mut self, other: &Accumulator) {
        self.requests += other.requests;
        self.failures += other.failures;
        self.total += other.total;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    fn summarize(&self, name: String) -> TaskSummary {
        let mean_ms = if self.requests == 0 {
            0.0
        } else {
            millis(self.total) / self.requests as f64
        };
        TaskSummary {
            name,
            requests: self.requests,
            failures: self.failures,
            mean_ms,
            min_ms: self.min.map_or(0.0, millis),
            max_ms: self.max.map_or(0.0, millis),
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Running statistics keyed by task.
#[derive(Debug, Default)]
pub struct Stats {
    by_task: BTreeMap<Task, Accumulator>,
}

impl Stats {
    pub fn record(&mut self, sample: &Sample) {
        self.by_task.entry(sample.task).or_default().record(sample);
    }

    pub fn requests(&self) -> u64 {
        self.by_task.values().map(|acc| acc.requests).sum()
    }

    /// Freeze into a report; `compute_n` only labels the compute row.
    pub fn report(&self, elapsed: Duration, compute_n: i64) -> Report {
        let mut aggregated = Accumulator::default();
        let tasks = self
            .by_task
            .iter()
            .map(|(task, acc)| {
                aggregated.merge(acc);
                acc.summarize(format!("GET {}", task.path(compute_n)))
            })
            .collect();
        Report {
            elapsed_secs: elapsed.as_secs_f64(),
            tasks,
            total: aggregated.summarize("Aggregated".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskSummary {
    pub name: String,
    pub requests: u64,
    pub failures: u64,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Summary printed when the run ends.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub elapsed_secs: f64,
    pub tasks: Vec<TaskSummary>,
    pub total: TaskSummary,
}

impl Report {
    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        match format {
            OutputFormat::Text => Ok(self.to_table()),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }

    fn to_table(&self) -> String {
        let mut out = String::new();
        let row = |s: &TaskSummary| {
            format!(
                "{:<28} {:>8} {:>8} {:>10.1} {:>10.1} {:>10.1}\n",
                s.name, s.requests, s.failures, s.mean_ms, s.min_ms, s.max_ms
            )
        };
        out.push_str(&format!(
            "{:<28} {:>8} {:>8} {:>10} {:>10} {:>10}\n",
            "NAME", "REQS", "FAILS", "AVG(ms)", "MIN(ms)", "MAX(ms)"
        ));
        out.push_str(&"-".repeat(79));
        out.push('\n');
        for task in &self.tasks {
            out.push_str(&row(task));
        }
        out.push_str(&"-".repeat(79));
        out.push('\n');
        out.push_str(&row(&self.total));
        out.push_str(&format!("\nRan for {:.1}s\n", self.elapsed_secs));
        out
    }
}
