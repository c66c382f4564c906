//! Rate-limiter seam and call priorities.
//!
//! Admission math (token buckets, per-tier budgets) belongs to the
//! [`RateLimiter`] implementation. The engine only asks for admission before
//! SMART/FULL/CRITICAL calls and reports the outcome afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::time::Duration;
use uuid::Uuid;

/// Call priority, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub const HIGHEST: Priority = Priority::Critical;

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission control consulted before a call.
#[async_trait]
pub trait RateLimiter: Send + Sync + Debug {
    /// Wait for admission. `false` means the request was not admitted in time.
    async fn acquire(&self, priority: Priority, timeout: Option<Duration>, request_id: Uuid) -> bool;

    /// Report how an admitted call went.
    fn record_response(&self, duration: Duration, success: bool, priority: Priority);
}

/// Admits everything immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&self, _priority: Priority, _timeout: Option<Duration>, _request_id: Uuid) -> bool {
        true
    }

    fn record_response(&self, _duration: Duration, _success: bool, _priority: Priority) {}
}
