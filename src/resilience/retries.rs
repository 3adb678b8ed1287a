//! Retry pacing.
//!
//! # Design Decisions
//! - Budget is wall-clock time, not an attempt count
//! - The deadline is checked before sleeping, so the final interval may
//!   overshoot the budget by up to one `try_interval`
//! - Sleeping yields the task; other requests keep running

use std::time::Duration;

use tokio::time::Instant;

/// Time budget for one request's selection attempts.
#[derive(Debug, Clone, Copy)]
pub struct TryBudget {
    start: Instant,
    duration: Duration,
    interval: Duration,
}

impl TryBudget {
    /// Start the clock now.
    pub fn start(duration: Duration, interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            duration,
            interval,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns false once the budget is spent; otherwise waits one interval
    /// and returns true.
    pub async fn keep_retrying(&self) -> bool {
        if self.elapsed() >= self.duration {
            return false;
        }
        tokio::time::sleep(self.interval).await;
        true
    }
}
