//! Fallback cache of last-good responses.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{elapsed_between, Clock};
use crate::error::BookkeepingError;
use crate::observability::metrics;

/// A cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    /// When the value was stored.
    pub timestamp: DateTime<Utc>,
}

/// Cache counters and size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub ttl_secs: u64,
}

/// A thread-safe TTL cache used for degraded responses.
///
/// Values are stored as JSON so they can be persisted and served back to
/// callers of any deserializable type.
#[derive(Debug)]
pub struct FallbackCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl FallbackCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Store a value. Serialization failures are logged and dropped.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value).map_err(BookkeepingError::from) {
            Ok(json) => self.put_value(key, json),
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to cache response"),
        }
    }

    pub fn put_value(&self, key: &str, value: Value) {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            timestamp: self.clock.now(),
        };
        self.entries.insert(key.to_string(), entry);
        metrics::record_cache_size(self.entries.len());
    }

    /// Fetch a live value, evicting it if it has expired.
    ///
    /// A value that no longer deserializes as `T` is reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let found = self
            .entries
            .get(key)
            .map(|e| (self.is_live(&e, now), e.value.clone()));

        let hit = match found {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                if self.entries.remove_if(key, |_, e| !self.is_live(e, now)).is_some() {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None
            }
            None => None,
        };

        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_cache_lookup(hit.is_some());
        hit
    }

    fn is_live(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        elapsed_between(entry.timestamp, now) < self.ttl
    }

    /// Remove every expired entry. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| self.is_live(e, now));
        let evicted = before.saturating_sub(self.entries.len());

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            tracing::debug!(evicted, remaining = self.entries.len(), "Cache sweep");
        }
        metrics::record_cache_size(self.entries.len());
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            ttl_secs: self.ttl.as_secs(),
        }
    }

    /// Copy of every live entry, for persistence.
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|e| self.is_live(e.value(), now))
            .map(|e| e.value().clone())
            .collect()
    }

    /// Load persisted entries, skipping expired ones. Returns how many were kept.
    pub fn restore(&self, entries: Vec<CacheEntry>) -> usize {
        let now = self.clock.now();
        let mut restored = 0;
        for entry in entries {
            if self.is_live(&entry, now) {
                self.entries.insert(entry.key.clone(), entry);
                restored += 1;
            }
        }
        metrics::record_cache_size(self.entries.len());
        restored
    }
}
