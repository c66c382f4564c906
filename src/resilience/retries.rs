//! Retry policy seam.
//!
//! The engine owns the retry loop and its attempt bound; a [`RetryPolicy`]
//! only answers whether a given failure is worth another attempt and how
//! long to wait first. Backoff tuning lives in the policy, not here.

use std::error::Error;
use std::fmt::Debug;
use std::time::Duration;

/// Decides whether and when a failed attempt is retried.
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub trait RetryPolicy: Send + Sync + Debug {
    fn should_retry(&self, error: &(dyn Error + Send + Sync + 'static), attempt: u32) -> bool;

    fn next_delay(&self, error: &(dyn Error + Send + Sync + 'static), attempt: u32) -> Duration;
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _error: &(dyn Error + Send + Sync + 'static), _attempt: u32) -> bool {
        false
    }

    fn next_delay(&self, _error: &(dyn Error + Send + Sync + 'static), _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Retries every failure after the same delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl RetryPolicy for FixedDelay {
    fn should_retry(&self, _error: &(dyn Error + Send + Sync + 'static), _attempt: u32) -> bool {
        true
    }

    fn next_delay(&self, _error: &(dyn Error + Send + Sync + 'static), _attempt: u32) -> Duration {
        self.0
    }
}
