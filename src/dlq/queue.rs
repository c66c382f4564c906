//! Bounded dead-letter queue.
//!
//! Every mutation and every read happens under a single lock, so
//! [`DeadLetterQueue::get_retryable`] always sees a consistent snapshot.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::clock::{elapsed_between, Clock};
use crate::observability::metrics;
use crate::resilience::{replay_backoff, Priority};

/// A call that failed terminally and is kept for later replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRequest {
    pub id: Uuid,
    /// Endpoint the call was aimed at.
    pub endpoint: String,
    /// Replay table key.
    pub function_name: String,
    pub serialized_args: Value,
    pub priority: Priority,
    /// When the request was first dead-lettered.
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: String,
}

impl FailedRequest {
    pub fn new(
        endpoint: impl Into<String>,
        function_name: impl Into<String>,
        serialized_args: Value,
        priority: Priority,
        max_retries: u32,
        last_error: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            function_name: function_name.into(),
            serialized_args,
            priority,
            timestamp,
            retry_count: 0,
            max_retries,
            last_error: last_error.into(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqStats {
    pub queue_size: usize,
    pub total_added: u64,
    /// Removed without a successful replay.
    pub total_removed: u64,
    /// Removed after a successful replay.
    pub total_processed: u64,
    /// Evicted to make room.
    pub total_expired: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<FailedRequest>,
    stats: DlqStats,
}

impl QueueState {
    fn push(&mut self, request: FailedRequest, max_size: usize) {
        self.entries.push_back(request);
        while self.entries.len() > max_size {
            if let Some(evicted) = self.entries.pop_front() {
                self.stats.total_expired += 1;
                tracing::warn!(
                    id = %evicted.id,
                    function = %evicted.function_name,
                    "Dead-letter queue full, evicted oldest entry"
                );
                metrics::record_dlq_event("expired");
            }
        }
        self.stats.queue_size = self.entries.len();
    }
}

/// Bounded FIFO store of failed requests.
#[derive(Debug)]
pub struct DeadLetterQueue {
    state: Mutex<QueueState>,
    max_size: usize,
    max_backoff: Duration,
    clock: Arc<dyn Clock>,
}

impl DeadLetterQueue {
    pub fn new(max_size: usize, max_backoff: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            max_size,
            max_backoff,
            clock,
        }
    }

    /// Append a request, evicting the oldest entry on overflow.
    pub fn add(&self, request: FailedRequest) {
        tracing::debug!(
            id = %request.id,
            function = %request.function_name,
            endpoint = %request.endpoint,
            "Request dead-lettered"
        );
        let mut state = self.state.lock();
        state.stats.total_added += 1;
        state.push(request, self.max_size);
        metrics::record_dlq_event("added");
        metrics::record_dlq_size(state.entries.len());
    }

    /// Entries with retries left whose backoff has elapsed at `now`.
    pub fn get_retryable(&self, now: DateTime<Utc>) -> Vec<FailedRequest> {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .filter(|r| {
                !r.is_exhausted()
                    && elapsed_between(r.timestamp, now) >= replay_backoff(r.retry_count, self.max_backoff)
            })
            .cloned()
            .collect()
    }

    /// Like [`get_retryable`](Self::get_retryable) at the clock's current time.
    pub fn retryable_now(&self) -> Vec<FailedRequest> {
        self.get_retryable(self.clock.now())
    }

    /// Delete an entry. `processed` marks a successful replay.
    pub fn remove(&self, id: Uuid, processed: bool) -> Option<FailedRequest> {
        let mut state = self.state.lock();
        let index = state.entries.iter().position(|r| r.id == id)?;
        let removed = state.entries.remove(index);

        if processed {
            state.stats.total_processed += 1;
            metrics::record_dlq_event("processed");
        } else {
            state.stats.total_removed += 1;
            metrics::record_dlq_event("removed");
        }
        state.stats.queue_size = state.entries.len();
        metrics::record_dlq_size(state.entries.len());
        removed
    }

    /// Count a failed replay in place. Returns the updated entry.
    pub fn mark_attempt_failed(&self, id: Uuid, error: &str) -> Option<FailedRequest> {
        let mut state = self.state.lock();
        let entry = state.entries.iter_mut().find(|r| r.id == id)?;
        entry.retry_count = entry.retry_count.saturating_add(1);
        entry.last_error = error.to_string();
        Some(entry.clone())
    }

    pub fn stats(&self) -> DlqStats {
        self.state.lock().stats
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry, oldest first.
    pub fn snapshot(&self) -> Vec<FailedRequest> {
        self.state.lock().entries.iter().cloned().collect()
    }

    /// The `limit` most recently dead-lettered entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<FailedRequest> {
        let mut entries = self.snapshot();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        entries
    }

    /// Reload persisted entries, oldest first. Entries beyond capacity are
    /// dropped from the front without touching the stats. Returns how many
    /// restored entries are held afterwards.
    pub fn restore(&self, entries: Vec<FailedRequest>) -> usize {
        let mut state = self.state.lock();
        let held_before = state.entries.len();
        let incoming = entries.len();

        state.entries.extend(entries);
        let overflow = state.entries.len().saturating_sub(self.max_size);
        if overflow > 0 {
            state.entries.drain(..overflow);
            tracing::warn!(
                dropped = overflow,
                capacity = self.max_size,
                "Persisted dead letters exceed capacity, dropped oldest"
            );
        }
        state.stats.queue_size = state.entries.len();
        metrics::record_dlq_size(state.entries.len());

        incoming - overflow.saturating_sub(held_before).min(incoming)
    }
}
