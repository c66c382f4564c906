//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Request outcome (monitor.rs):
//!     Engine reports success/failure + elapsed time
//!     → Update running success rate, EWMA, failure streak
//!     → Reclassify via state.rs, log transition if status changed
//!
//! Periodic recompute (availability.rs):
//!     Scheduler tick
//!     → Prune status-change log (24h / size cap)
//!     → Recompute 1h windowed availability per endpoint
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function of success rate, failure streak and EWMA
//! - Health state is per-endpoint; unknown endpoints are treated as Healthy
//! - Only Down short-circuits calls; the other states are advisory

pub mod availability;
pub mod monitor;
pub mod state;

pub use availability::StatusChange;
pub use monitor::HealthMonitor;
pub use state::{EndpointHealth, HealthStatus};
