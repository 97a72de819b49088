use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Length of the sliding window the store counts requests in.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(60);

/// Sliding one-minute window of recorded call times.
#[derive(Debug, Clone)]
pub struct QuotaTracker {
    max_calls: usize,
    min_interval: Duration,
    calls: VecDeque<Instant>,
}

/// Calls in the current window against capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub used: usize,
    pub max: usize,
}

impl QuotaUsage {
    pub fn percent(&self) -> f64 {
        if self.max == 0 {
            return 100.0;
        }
        self.used as f64 * 100.0 / self.max as f64
    }
}

impl QuotaTracker {
    pub fn new(max_calls: usize, min_interval: Duration) -> Self {
        QuotaTracker {
            max_calls: max_calls.max(1),
            min_interval,
            calls: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= QUOTA_WINDOW {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long to wait before the next call may go out, if at all.
    pub fn wait_time(&mut self, now: Instant) -> Option<Duration> {
        self.prune(now);

        let mut wait = Duration::ZERO;
        if self.calls.len() >= self.max_calls {
            if let Some(&oldest) = self.calls.front() {
                wait = (oldest + QUOTA_WINDOW).saturating_duration_since(now);
            }
        }
        if let Some(&latest) = self.calls.back() {
            let spacing = (latest + self.min_interval).saturating_duration_since(now);
            wait = wait.max(spacing);
        }

        (!wait.is_zero()).then_some(wait)
    }

    /// Take a slot in the window if one is free, otherwise say how long to wait.
    ///
    /// Checking and recording happen in one step, so callers sharing a
    /// tracker behind a lock can never overrun the window together.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        match self.wait_time(now) {
            Some(wait) => Err(wait),
            None => {
                self.record(now);
                Ok(())
            }
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.prune(now);
        self.calls.push_back(now);
    }

    pub fn usage(&mut self, now: Instant) -> QuotaUsage {
        self.prune(now);
        QuotaUsage {
            used: self.calls.len(),
            max: self.max_calls,
        }
    }

    pub fn reset(&mut self) {
        self.calls.clear();
    }
}
