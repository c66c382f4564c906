//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Engine, once per execute call:
//!     → telemetry.rs (CallRecord to the configured collector)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap and silent when no recorder is installed
//! - Telemetry is a trait so callers can route call records elsewhere

pub mod logging;
pub mod metrics;
pub mod telemetry;

pub use logging::init_logging;
pub use metrics::init_metrics;
pub use telemetry::{CallRecord, MetricsTelemetry, NoopTelemetry, TelemetryCollector};
