//! Per-call options.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::mode::ExecutionMode;
use crate::resilience::Priority;

/// Describes one protected call.
///
/// `function` and `args` identify the call for the fallback cache and for
/// replay from the dead-letter queue. Unset options fall back to the engine
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec {
    pub endpoint: String,
    pub function: String,
    pub args: Value,
    pub priority: Priority,
    pub timeout: Option<Duration>,
    pub mode: Option<ExecutionMode>,
    pub fallback: Option<bool>,
    pub tokens: Option<u64>,
}

impl CallSpec {
    pub fn new(endpoint: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            function: function.into(),
            args: Value::Null,
            priority: Priority::default(),
            timeout: None,
            mode: None,
            fallback: None,
            tokens: None,
        }
    }

    /// Serialize the call arguments.
    ///
    /// A value that cannot be serialized is logged and recorded as `null`; the
    /// call still runs, but its cache and replay identity is lost.
    pub fn args<A: Serialize>(mut self, args: &A) -> Self {
        self.args = match serde_json::to_value(args) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(function = %self.function, error = %e, "Failed to serialize call arguments");
                Value::Null
            }
        };
        self
    }

    pub fn args_value(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Override `cache.fallback_enabled` for this call.
    pub fn fallback(mut self, enabled: bool) -> Self {
        self.fallback = Some(enabled);
        self
    }

    /// Token estimate reported to telemetry.
    pub fn tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }
}
