use crate::clock::Clock;
use crate::error::{RemoteError, StoreError};
use rand::Rng;
use std::time::Duration;

/// Exponential backoff settings for quota errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to each backoff
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(750),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after failed attempt number `attempt` (0-based),
    /// without jitter: `min(max_delay, base_delay * multiplier^attempt)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    fn jitter(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

/// What the store said about one attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// Quota or rate limit; worth another try after a pause
    Retryable(RemoteError),
    Fatal(RemoteError),
}

/// Whether an error is the store telling us to slow down.
///
/// Matches status 429, or "429", "quota" or "rate limit" anywhere in the
/// message, ignoring case.
pub fn is_transient(error: &RemoteError) -> bool {
    if error.status == Some(429) {
        return true;
    }
    let message = error.message.to_lowercase();
    message.contains("429") || message.contains("quota") || message.contains("rate limit")
}

pub fn classify<T>(result: Result<T, RemoteError>) -> Attempt<T> {
    match result {
        Ok(value) => Attempt::Done(value),
        Err(e) if is_transient(&e) => Attempt::Retryable(e),
        Err(e) => Attempt::Fatal(e),
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy runs out.
///
/// Sleeps go through `clock` so callers decide whether they really block.
pub fn retry<T, C, F>(policy: &RetryPolicy, clock: &C, mut op: F) -> Result<T, StoreError>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<T, RemoteError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match classify(op()) {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fatal(e) => return Err(StoreError::Remote(e)),
            Attempt::Retryable(e) if attempt + 1 >= max_attempts => {
                log::warn!("giving up after {} attempts: {}", attempt + 1, e);
                return Err(StoreError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: e,
                });
            }
            Attempt::Retryable(e) => {
                let delay = policy.backoff(attempt) + policy.jitter();
                log::warn!(
                    "attempt {} rate limited ({}), retrying in {:?}",
                    attempt + 1,
                    e,
                    delay
                );
                clock.sleep(delay);
                attempt += 1;
            }
        }
    }
}
