//! Result of a protected call.

use crate::error::ExecuteError;

/// What `execute` returned.
///
/// A degraded value is a cached response served because the fresh call could
/// not be made or failed; `cause` says why.
#[must_use = "a degraded or failed outcome must be inspected"]
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Degraded { value: T, cause: ExecuteError },
    Failed(ExecuteError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Fresh or cached value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) | Outcome::Degraded { value, .. } => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    /// The failure behind a degraded or failed outcome.
    pub fn error(&self) -> Option<&ExecuteError> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Degraded { cause, .. } | Outcome::Failed(cause) => Some(cause),
        }
    }

    /// Strict view: only a fresh success is `Ok`.
    pub fn into_result(self) -> Result<T, ExecuteError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Degraded { cause, .. } | Outcome::Failed(cause) => Err(cause),
        }
    }

    /// Lenient view: a degraded value is accepted.
    pub fn into_value(self) -> Result<T, ExecuteError> {
        match self {
            Outcome::Success(value) | Outcome::Degraded { value, .. } => Ok(value),
            Outcome::Failed(cause) => Err(cause),
        }
    }
}
