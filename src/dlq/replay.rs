//! Replay table and the drain pass.

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::queue::{DeadLetterQueue, FailedRequest};
use crate::cache::{cache_key, FallbackCache};
use crate::error::{BookkeepingError, BoxError};
use crate::health::HealthMonitor;

pub type ReplayFuture = BoxFuture<'static, Result<Value, BoxError>>;

/// A registered replay function: serialized arguments in, JSON result out.
pub type ReplayFn = Arc<dyn Fn(Value) -> ReplayFuture + Send + Sync>;

/// Function name to replay function.
#[derive(Default)]
pub struct ReplayRegistry {
    functions: DashMap<String, ReplayFn>,
}

impl fmt::Debug for ReplayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.functions.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("ReplayRegistry").field("functions", &names).finish()
    }
}

impl ReplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the replay function for `name`.
    pub fn register<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        let replay: ReplayFn = Arc::new(move |args| Box::pin(f(args)));
        self.functions.insert(name.into(), replay);
    }

    pub fn get(&self, name: &str) -> Option<ReplayFn> {
        self.functions.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

/// Outcome of one drain pass.
///
/// `failed` counts every failed attempt, including entries with no registered
/// function (also counted in `unregistered`). `dropped` counts entries removed
/// because their retries ran out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub replayed: usize,
    pub failed: usize,
    pub dropped: usize,
    pub unregistered: usize,
}

/// Replay every entry that is currently due.
///
/// Replays run outside the queue lock. A successful replay refreshes `cache`,
/// when given, for the same function and arguments. Every executed replay
/// is recorded against its endpoint's health, which is how a Down endpoint
/// behind a fallback recovers.
pub async fn drain_once(
    queue: &DeadLetterQueue,
    registry: &ReplayRegistry,
    cache: Option<&FallbackCache>,
    health: &HealthMonitor,
    replay_timeout: Duration,
) -> DrainReport {
    let mut report = DrainReport::default();

    for entry in queue.retryable_now() {
        report.attempted += 1;

        let Some(replay) = registry.get(&entry.function_name) else {
            let err = BookkeepingError::ReplayUnregistered {
                function: entry.function_name.clone(),
            };
            tracing::error!(id = %entry.id, error = %err, "Cannot replay dead-lettered request");
            report.unregistered += 1;
            record_failure(queue, &entry, &err.to_string(), &mut report);
            continue;
        };

        let started = tokio::time::Instant::now();
        let result = tokio::time::timeout(replay_timeout, replay(entry.serialized_args.clone())).await;
        health.record_request(&entry.endpoint, matches!(result, Ok(Ok(_))), started.elapsed());

        match result {
            Ok(Ok(value)) => {
                if queue.remove(entry.id, true).is_some() {
                    if let Some(cache) = cache {
                        cache.put_value(&cache_key(&entry.function_name, &entry.serialized_args), value);
                    }
                    report.replayed += 1;
                    tracing::info!(
                        id = %entry.id,
                        function = %entry.function_name,
                        retry_count = entry.retry_count,
                        "Dead-lettered request replayed"
                    );
                }
            }
            Ok(Err(e)) => record_failure(queue, &entry, &e.to_string(), &mut report),
            Err(_) => {
                let msg = format!("replay timed out after {replay_timeout:?}");
                record_failure(queue, &entry, &msg, &mut report);
            }
        }
    }

    if report.attempted > 0 {
        tracing::debug!(
            attempted = report.attempted,
            replayed = report.replayed,
            failed = report.failed,
            dropped = report.dropped,
            "Dead-letter drain complete"
        );
    }
    report
}

fn record_failure(queue: &DeadLetterQueue, entry: &FailedRequest, error: &str, report: &mut DrainReport) {
    report.failed += 1;

    // The entry may have been evicted while the replay ran.
    let Some(updated) = queue.mark_attempt_failed(entry.id, error) else {
        return;
    };

    if updated.is_exhausted() {
        queue.remove(updated.id, false);
        report.dropped += 1;
        tracing::error!(
            id = %updated.id,
            function = %updated.function_name,
            endpoint = %updated.endpoint,
            retries = updated.retry_count,
            last_error = %updated.last_error,
            "Dead-lettered request exhausted its retries, dropping"
        );
    } else {
        tracing::warn!(
            id = %updated.id,
            function = %updated.function_name,
            retry_count = updated.retry_count,
            error = %error,
            "Replay failed"
        );
    }
}
