//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (ResilienceEngine::start):
//!     Load persisted state → spawn loops (scheduler.rs)
//!         health recompute | DLQ drain | cache sweep | state persist
//!
//! Shutdown (scheduler.rs → shutdown.rs):
//!     Broadcast signal → every loop exits → TaskGroup joined → final save
//! ```
//!
//! # Design Decisions
//! - One broadcast signal for every loop
//! - Shutdown returns only after all loops have finished (no orphaned tasks)
//! - Final state save runs after the loops, so it sees their last writes

pub mod scheduler;
pub mod shutdown;

pub use scheduler::BackgroundScheduler;
pub use shutdown::{Shutdown, TaskGroup};
