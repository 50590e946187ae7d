//! Bounded polling.
//!
//! Every wait in the resolver goes through [`Poller`], which never runs past
//! its ceiling. Time comes from `tokio::time`, so tests can pause the clock.

use std::time::Duration;

use tokio::time::Instant;

/// Drives a poll loop: `while poller.tick().await { ... }`.
///
/// The first tick returns immediately; later ticks sleep for the interval
/// (clipped to the remaining budget) and return `false` once the ceiling or
/// the attempt limit is reached.
#[derive(Debug)]
pub struct Poller {
    interval: Duration,
    deadline: Instant,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl Poller {
    /// Poll every `interval` until `ceiling` has elapsed.
    pub fn new(interval: Duration, ceiling: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + ceiling,
            max_attempts: None,
            attempts: 0,
        }
    }

    /// Poll exactly `attempts` times, `interval` apart.
    pub fn attempts(attempts: u32, interval: Duration) -> Self {
        let ceiling = interval * attempts.saturating_sub(1);
        Self {
            interval,
            deadline: Instant::now() + ceiling,
            max_attempts: Some(attempts),
            attempts: 0,
        }
    }

    /// Number of ticks handed out so far.
    pub fn attempts_made(&self) -> u32 {
        self.attempts
    }

    /// Wait for the next attempt; `false` when the budget is spent.
    pub async fn tick(&mut self) -> bool {
        if self.max_attempts.is_some_and(|max| self.attempts >= max) {
            return false;
        }
        if self.attempts > 0 {
            let now = Instant::now();
            if now >= self.deadline {
                return false;
            }
            let remaining = self.deadline - now;
            tokio::time::sleep(self.interval.min(remaining)).await;
        }
        self.attempts += 1;
        true
    }
}
