//! Replay backoff for dead-lettered requests.

use std::time::Duration;

/// Minimum age before an entry that has been replayed `retry_count` times is
/// eligible again: `min(cap, 2^retry_count seconds)`.
pub fn replay_backoff(retry_count: u32, cap: Duration) -> Duration {
    let secs = 2u64.saturating_pow(retry_count);
    Duration::from_secs(secs).min(cap)
}
