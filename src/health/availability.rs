//! Windowed availability from the status-change log.
//!
//! Availability is derived from status-change events only, not from
//! continuous sampling. The status in effect at the start of the window is
//! taken from the last event before it; when the log holds nothing that old,
//! the `from` side of the first event in the window is used, or the current
//! status when there are no events at all. Downtime older than the retained
//! log is therefore invisible to the computation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::elapsed_between;
use crate::health::state::HealthStatus;

/// A recorded health transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub endpoint: String,
    pub from: HealthStatus,
    pub to: HealthStatus,
    pub at: DateTime<Utc>,
}

/// Fraction of `[window_start, now]` that an endpoint spent available.
///
/// `events` must be this endpoint's transitions in chronological order.
pub fn windowed_availability(
    events: &[&StatusChange],
    current: HealthStatus,
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let total = elapsed_between(window_start, now).as_secs_f64();
    if total <= 0.0 {
        return if current.is_available() { 1.0 } else { 0.0 };
    }

    let in_window_from = events.iter().position(|e| e.at > window_start);
    let mut state = match in_window_from {
        Some(0) => events[0].from,
        Some(i) => events[i - 1].to,
        None => events.last().map(|e| e.to).unwrap_or(current),
    };

    let mut available = 0.0;
    let mut cursor = window_start;
    if let Some(start) = in_window_from {
        for event in &events[start..] {
            let at = event.at.min(now);
            if state.is_available() {
                available += elapsed_between(cursor, at).as_secs_f64();
            }
            cursor = at;
            state = event.to;
        }
    }
    if state.is_available() {
        available += elapsed_between(cursor, now).as_secs_f64();
    }

    (available / total).clamp(0.0, 1.0)
}
