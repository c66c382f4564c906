//! Dead-letter queue.
//!
//! # Data Flow
//! ```text
//! Terminal call failure:
//!     → queue.rs (bounded FIFO, oldest evicted on overflow)
//!
//! Drain tick:
//!     → queue.rs get_retryable (backoff elapsed, retries left)
//!     → replay.rs (registered function, bounded by the replay timeout)
//!     → Success: remove as processed, refresh fallback cache
//!     → Failure: retry_count + 1, drop once exhausted
//! ```
//!
//! # Design Decisions
//! - Entry timestamp is the first failure; backoff is measured from it
//! - Replay functions are registered by name, never stored in the entry
//! - A missing replay function is a failed attempt, not a crash

pub mod queue;
pub mod replay;

pub use queue::{DeadLetterQueue, DlqStats, FailedRequest};
pub use replay::{drain_once, DrainReport, ReplayFn, ReplayRegistry};
