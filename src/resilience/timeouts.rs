//! Timeout enforcement.
//!
//! A [`Deadline`] is fixed when a call starts and bounds everything the call
//! does afterwards: rate-limiter wait, every attempt, and retry sleeps.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities (and Tokio's clock, so paused-time tests work)
//! - Timeout errors are a distinct type callers can downcast to
//! - Expiry drops the in-flight future; work the operation already handed to
//!   another task is not cancelled and may still complete in the background

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// The call budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// A fixed point in time by which a call must finish.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Run `fut`, failing if the deadline passes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineExceeded> {
        tokio::time::timeout(self.remaining(), fut)
            .await
            .map_err(|_| DeadlineExceeded(self.budget))
    }
}
