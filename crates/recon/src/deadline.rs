use std::time::{Duration, Instant};

use crate::error::ReconError;

/// Wall-clock budget for one reconciliation. Checked between row batches so
/// a slow run surfaces `TimedOut` instead of hanging the caller. The budget
/// is spent once elapsed time reaches the limit; a zero limit always trips.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn none() -> Self {
        Self { started: Instant::now(), limit: None }
    }

    pub fn after(limit: Duration) -> Self {
        Self { started: Instant::now(), limit: Some(limit) }
    }

    pub fn from_option(limit: Option<Duration>) -> Self {
        Self { started: Instant::now(), limit }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn check(&self) -> Result<(), ReconError> {
        match self.limit {
            Some(limit) if self.started.elapsed() >= limit => Err(ReconError::TimedOut {
                elapsed_ms: self.started.elapsed().as_millis(),
                limit_ms: limit.as_millis(),
            }),
            _ => Ok(()),
        }
    }
}
