//! Execution modes and the step pipeline each one assembles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::resilience::Priority;

/// Protection level of a call, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Basic,
    Enhanced,
    Smart,
    #[default]
    Full,
    Critical,
}

impl ExecutionMode {
    pub const ALL: [ExecutionMode; 5] = [
        ExecutionMode::Basic,
        ExecutionMode::Enhanced,
        ExecutionMode::Smart,
        ExecutionMode::Full,
        ExecutionMode::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Basic => "basic",
            ExecutionMode::Enhanced => "enhanced",
            ExecutionMode::Smart => "smart",
            ExecutionMode::Full => "full",
            ExecutionMode::Critical => "critical",
        }
    }

    /// CRITICAL calls always run at the highest priority.
    pub fn effective_priority(&self, requested: Priority) -> Priority {
        match self {
            ExecutionMode::Critical => Priority::HIGHEST,
            _ => requested,
        }
    }

    /// CRITICAL calls get twice the requested budget.
    pub fn effective_timeout(&self, requested: Duration) -> Duration {
        match self {
            ExecutionMode::Critical => requested.saturating_mul(2),
            _ => requested,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mode-specific stage run ahead of the upstream call.
///
/// The health gate and the fallback cache wrap every mode and are not steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Ask the rate limiter for admission and report the outcome back.
    Admission,
    /// Re-run failed attempts while the retry policy allows it.
    Retry,
}

/// Ordered steps a mode runs, applied first to last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn for_mode(mode: ExecutionMode) -> Self {
        let steps = match mode {
            ExecutionMode::Basic => vec![],
            ExecutionMode::Enhanced => vec![Step::Retry],
            ExecutionMode::Smart => vec![Step::Admission],
            ExecutionMode::Full | ExecutionMode::Critical => vec![Step::Admission, Step::Retry],
        };
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}
