//! Resilience orchestration.
//!
//! # Data Flow
//! ```text
//! execute(CallSpec, op)
//!     → mode.rs (mode → ordered steps, priority and budget overrides)
//!     → health gate (every mode): endpoint Down + fallback → cached value or EndpointDown
//!     → mode steps, in order:
//!         Admission: RateLimiter::acquire within the budget, else RateLimitTimeout
//!         Retry: allow up to retry.max_attempts attempts
//!     → Attempts: op() under the deadline, retries consult RetryPolicy
//!     → Success: health ✓, cache put, Outcome::Success
//!     → Failure: health ✗, DLQ add, cache lookup → Degraded or Failed
//!     → One CallRecord to telemetry per call
//! ```
//!
//! # Design Decisions
//! - Modes are ordered step lists over one call path, not separate code paths
//! - Health gate and fallback cache wrap every mode, so they are not steps
//! - Degraded results are a variant of [`Outcome`], never a silent success
//! - The engine is an explicit value shared by clone, not a global

pub mod call;
pub mod mode;
pub mod orchestrator;
pub mod outcome;

pub use call::CallSpec;
pub use mode::{ExecutionMode, Pipeline, Step};
pub use orchestrator::{EngineBuilder, HealthReport, ResilienceEngine, SystemStatus};
pub use outcome::Outcome;
