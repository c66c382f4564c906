//! Resilience execution engine.
//!
//! Protects calls to an unreliable upstream with health tracking, rate-limit
//! admission, retries, a fallback cache for degraded responses and a
//! dead-letter queue for later replay.
//!
//! ```text
//!     Caller ──execute(CallSpec, op)──▶ engine ──▶ op ──▶ Upstream
//!                                         │
//!            ┌──────────────┬─────────────┼──────────────┬──────────────┐
//!            ▼              ▼             ▼              ▼              ▼
//!         health        resilience      cache           dlq       observability
//!      (status gate)  (limiter/retry) (fallback)   (replay later)  (telemetry)
//!
//!     lifecycle: background loops ── persistence: state across restarts
//! ```

// Core components
pub mod cache;
pub mod dlq;
pub mod engine;
pub mod health;

// Collaborator seams
pub mod clock;
pub mod resilience;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod persistence;

pub use config::ResilienceConfig;
pub use engine::{CallSpec, ExecutionMode, Outcome, ResilienceEngine};
pub use error::{BoxError, ExecuteError};
pub use lifecycle::BackgroundScheduler;
pub use resilience::Priority;
