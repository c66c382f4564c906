//! Fallback caching subsystem.
//!
//! # Data Flow
//! ```text
//! Successful call
//!     → key.rs (hash of function name + canonical args)
//!     → fallback.rs put (value, now)
//!
//! Endpoint down / call failed
//!     → fallback.rs get: live entry → degraded response, expired → evict + miss
//!
//! Scheduler tick (every sweep interval)
//!     → fallback.rs sweep (drop entries past TTL even if never re-read)
//! ```

pub mod fallback;
pub mod key;

pub use fallback::{CacheEntry, CacheStats, FallbackCache};
pub use key::cache_key;
