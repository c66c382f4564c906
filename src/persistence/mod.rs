//! State persistence.
//!
//! # Data Flow
//! ```text
//! Engine start:
//!     → store.rs load → DLQ restore + cache restore (expired entries skipped)
//!
//! Persist tick / shutdown:
//!     → DLQ snapshot + cache snapshot → store.rs save (temp file + rename)
//! ```
//!
//! # Design Decisions
//! - Health state is not persisted; endpoints re-learn after restart
//! - A missing state file is an empty state, not an error
//! - Save failures are logged and retried on the next tick

pub mod store;

pub use store::{JsonFileStore, PersistedState, StateStore, STATE_VERSION};
