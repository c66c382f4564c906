//! Per-call telemetry seam.

use std::fmt::Debug;
use std::time::Duration;

use super::metrics;

/// One terminal call outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub endpoint: String,
    pub function: String,
    pub duration: Duration,
    pub success: bool,
    /// `ExecuteError::kind` of the failure, if any.
    pub error_type: Option<&'static str>,
    pub tokens_used: Option<u64>,
    /// The returned value came from the fallback cache.
    pub cache_hit: bool,
}

impl CallRecord {
    pub fn outcome(&self) -> &'static str {
        match (self.success, self.cache_hit) {
            (true, _) => "success",
            (false, true) => "degraded",
            (false, false) => self.error_type.unwrap_or("error"),
        }
    }
}

/// Receives one record per `execute` call.
pub trait TelemetryCollector: Send + Sync + Debug {
    fn record_call(&self, record: CallRecord);
}

/// Forwards records to the metrics facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsTelemetry;

impl TelemetryCollector for MetricsTelemetry {
    fn record_call(&self, record: CallRecord) {
        metrics::record_call(
            &record.endpoint,
            &record.function,
            record.outcome(),
            record.duration,
            record.tokens_used,
        );
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetryCollector for NoopTelemetry {
    fn record_call(&self, _record: CallRecord) {}
}
