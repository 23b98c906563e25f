//! What a simulated user does: which endpoint to hit and how long to think.

use rand::Rng;
use std::time::Duration;

/// One weighted-equally request a user may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    Slow,
    Error,
    Compute,
    ServerRequest,
}

impl Task {
    pub const ALL: [Task; 4] = [Task::Slow, Task::Error, Task::Compute, Task::ServerRequest];

    /// Pick a task uniformly at random.
    pub fn random() -> Self {
        let index = rand::thread_rng().gen_range(0..Self::ALL.len());
        Self::ALL[index]
    }

    /// Request path, including the query string for `/compute`.
    pub fn path(self, compute_n: i64) -> String {
        match self {
            Task::Slow => "/slow".to_string(),
            Task::Error => "/error".to_string(),
            Task::Compute => format!("/compute?n={compute_n}"),
            Task::ServerRequest => "/server_request".to_string(),
        }
    }
}

/// Uniform think time between two requests of the same user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTime {
    min: Duration,
    max: Duration,
}

impl WaitTime {
    pub fn new(min: Duration, max: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(
            min <= max,
            "minimum wait ({min:?}) exceeds maximum wait ({max:?})"
        );
        Ok(Self { min, max })
    }

    /// Parse bounds given in (fractional) seconds.
    pub fn from_secs(min: f64, max: f64) -> anyhow::Result<Self> {
        Self::new(
            Duration::try_from_secs_f64(min)?,
            Duration::try_from_secs_f64(max)?,
        )
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}
