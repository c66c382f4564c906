//! Passive health tracking for protected endpoints.
//!
//! # Responsibilities
//! - Register endpoints and fold every request outcome into their metrics
//! - Record status transitions in a bounded change log
//! - Periodically recompute windowed availability and prune the log
//!
//! Unknown endpoints report Healthy. Nothing here performs I/O or fails.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{saturating_sub, Clock};
use crate::config::HealthConfig;
use crate::health::availability::{windowed_availability, StatusChange};
use crate::health::state::{EndpointHealth, HealthStatus};
use crate::observability::metrics;

/// Per-endpoint health registry.
#[derive(Debug)]
pub struct HealthMonitor {
    endpoints: DashMap<String, EndpointHealth>,
    events: Mutex<VecDeque<StatusChange>>,
    config: HealthConfig,
    clock: Arc<dyn Clock>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            endpoints: DashMap::new(),
            events: Mutex::new(VecDeque::new()),
            config,
            clock,
        }
    }

    /// Create the endpoint entry if it does not exist yet.
    ///
    /// Calling this again never resets existing metrics.
    pub fn register_endpoint(&self, name: &str) {
        if self.endpoints.contains_key(name) {
            return;
        }
        let now = self.clock.now();
        self.endpoints
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(endpoint = %name, "Endpoint registered");
                EndpointHealth::new(name, now)
            });
    }

    /// Record one request outcome and return the resulting status.
    pub fn record_request(&self, name: &str, success: bool, response_time: Duration) -> HealthStatus {
        let now = self.clock.now();
        let mut entry = self
            .endpoints
            .entry(name.to_string())
            .or_insert_with(|| EndpointHealth::new(name, now));

        let transition = entry.record(success, response_time, now, &self.config);
        let status = entry.status;
        drop(entry);

        if let Some(previous) = transition {
            self.log_transition(name, previous, status, now);
        }
        status
    }

    fn log_transition(&self, name: &str, from: HealthStatus, to: HealthStatus, at: DateTime<Utc>) {
        if to > from {
            tracing::warn!(endpoint = %name, from = %from, to = %to, "Endpoint health worsened");
        } else {
            tracing::info!(endpoint = %name, from = %from, to = %to, "Endpoint health improved");
        }
        metrics::record_endpoint_status(name, to);

        let mut events = self.events.lock();
        events.push_back(StatusChange {
            endpoint: name.to_string(),
            from,
            to,
            at,
        });
        while events.len() > self.config.max_events {
            events.pop_front();
        }
    }

    /// Current status, Healthy for endpoints never seen.
    pub fn status(&self, name: &str) -> HealthStatus {
        self.endpoints
            .get(name)
            .map(|e| e.status)
            .unwrap_or(HealthStatus::Healthy)
    }

    /// Snapshot of one endpoint, `None` if it was never registered.
    pub fn get_status(&self, name: &str) -> Option<EndpointHealth> {
        self.endpoints.get(name).map(|e| e.value().clone())
    }

    /// Snapshot of every endpoint, sorted by name.
    pub fn snapshot(&self) -> Vec<EndpointHealth> {
        let mut all: Vec<_> = self.endpoints.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Retained status-change events, oldest first.
    pub fn status_events(&self) -> Vec<StatusChange> {
        self.events.lock().iter().cloned().collect()
    }

    /// Prune the change log and recompute windowed availability.
    pub fn recompute_availability(&self) {
        let now = self.clock.now();
        let cutoff = saturating_sub(now, Duration::from_secs(self.config.event_retention_secs));
        let window_start = saturating_sub(now, Duration::from_secs(self.config.availability_window_secs));

        // Copy out so the log lock is never held while endpoint shards are locked.
        let events: Vec<StatusChange> = {
            let mut events = self.events.lock();
            while events.front().is_some_and(|e| e.at < cutoff) {
                events.pop_front();
            }
            events.iter().cloned().collect()
        };

        for mut entry in self.endpoints.iter_mut() {
            let own: Vec<&StatusChange> = events
                .iter()
                .filter(|e| e.endpoint == entry.name)
                .collect();
            entry.availability = windowed_availability(&own, entry.status, window_start, now);
        }

        tracing::debug!(
            endpoints = self.endpoints.len(),
            events = events.len(),
            "Availability recomputed"
        );
    }
}
