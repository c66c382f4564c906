//! Resilience primitives.
//!
//! # Data Flow
//! ```text
//! Protected call:
//!     → timeouts.rs (one deadline bounds admission, attempts and sleeps)
//!     → rate_limit.rs (admission before SMART/FULL/CRITICAL calls)
//!     → On failure: retries.rs (policy decides retry + delay)
//!
//! Dead-lettered request:
//!     → backoff.rs (minimum age before the next replay)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every call has a deadline
//! - Rate limiter and retry policy are pluggable trait objects
//! - The engine owns the loops; strategies only answer questions

pub mod backoff;
pub mod rate_limit;
pub mod retries;
pub mod timeouts;

pub use backoff::replay_backoff;
pub use rate_limit::{Priority, RateLimiter, Unlimited};
pub use retries::{FixedDelay, NoRetry, RetryPolicy};
pub use timeouts::{Deadline, DeadlineExceeded};
