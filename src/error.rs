//! Error types.
//!
//! [`ExecuteError`] is what callers of `ResilienceEngine::execute` branch on.
//! [`BookkeepingError`] covers cache, DLQ and persistence housekeeping; those
//! failures are logged where they happen and never surface through `execute`.

use std::time::Duration;
use thiserror::Error;

use crate::resilience::timeouts::DeadlineExceeded;

/// Boxed error returned by protected operations and replay functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failure of a protected call.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The rate limiter did not admit the call in time. The operation was not invoked.
    #[error("rate limiter did not admit call to {endpoint} within {waited:?}")]
    RateLimitTimeout { endpoint: String, waited: Duration },

    /// The endpoint is classified Down and no cached fallback was available.
    #[error("endpoint {endpoint} is down, call not attempted")]
    EndpointDown { endpoint: String },

    /// The operation failed, after any retries, or overran the call deadline.
    #[error("upstream call to {endpoint} failed after {attempts} attempt(s): {source}")]
    Upstream {
        endpoint: String,
        attempts: u32,
        #[source]
        source: BoxError,
    },
}

impl ExecuteError {
    pub fn endpoint(&self) -> &str {
        match self {
            ExecuteError::RateLimitTimeout { endpoint, .. }
            | ExecuteError::EndpointDown { endpoint }
            | ExecuteError::Upstream { endpoint, .. } => endpoint,
        }
    }

    /// True when the call deadline expired while the operation was running.
    pub fn is_timeout(&self) -> bool {
        match self {
            ExecuteError::Upstream { source, .. } => source.downcast_ref::<DeadlineExceeded>().is_some(),
            _ => false,
        }
    }

    /// Stable label for telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecuteError::RateLimitTimeout { .. } => "rate_limit_timeout",
            ExecuteError::EndpointDown { .. } => "endpoint_down",
            ExecuteError::Upstream { .. } if self.is_timeout() => "timeout",
            ExecuteError::Upstream { .. } => "upstream_error",
        }
    }
}

/// Housekeeping failures. Always non-fatal.
#[derive(Debug, Error)]
pub enum BookkeepingError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("no replay function registered for '{function}'")]
    ReplayUnregistered { function: String },
}
