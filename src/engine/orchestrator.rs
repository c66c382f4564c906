//! The resilience engine.
//!
//! # Responsibilities
//! - Run protected calls through the step pipeline of their mode
//! - Feed every terminal outcome to health, cache, DLQ and telemetry
//! - Start and own the background loops
//!
//! No lock is held across an await; each component locks only for its own
//! update.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::call::CallSpec;
use super::mode::{Pipeline, Step};
use super::outcome::Outcome;
use crate::cache::{cache_key, CacheStats, FallbackCache};
use crate::clock::{Clock, SystemClock};
use crate::config::ResilienceConfig;
use crate::dlq::{drain_once, DeadLetterQueue, DlqStats, DrainReport, FailedRequest, ReplayRegistry};
use crate::error::{BookkeepingError, BoxError, ExecuteError};
use crate::health::{EndpointHealth, HealthMonitor, HealthStatus};
use crate::lifecycle::BackgroundScheduler;
use crate::observability::{CallRecord, MetricsTelemetry, TelemetryCollector};
use crate::persistence::{JsonFileStore, PersistedState, StateStore};
use crate::resilience::{Deadline, NoRetry, RateLimiter, RetryPolicy, Unlimited};

/// How many dead letters a health report lists.
const RECENT_FAILURES: usize = 10;

/// Per-endpoint health plus DLQ and cache counters.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub endpoints: Vec<EndpointHealth>,
    pub dlq: DlqStats,
    pub cache: CacheStats,
}

/// Condensed health view.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Worst status across endpoints, Healthy when none are known.
    pub overall_health: HealthStatus,
    pub counts_by_status: BTreeMap<HealthStatus, usize>,
    /// Newest dead letters first.
    pub recent_failures: Vec<FailedRequest>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct EngineInner {
    config: ResilienceConfig,
    clock: Arc<dyn Clock>,
    health: HealthMonitor,
    cache: FallbackCache,
    dlq: DeadLetterQueue,
    replays: ReplayRegistry,
    rate_limiter: Arc<dyn RateLimiter>,
    retry_policy: Arc<dyn RetryPolicy>,
    telemetry: Arc<dyn TelemetryCollector>,
    store: Option<Arc<dyn StateStore>>,
}

/// Builder for [`ResilienceEngine`].
#[derive(Debug)]
pub struct EngineBuilder {
    config: ResilienceConfig,
    clock: Option<Arc<dyn Clock>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    telemetry: Option<Arc<dyn TelemetryCollector>>,
    store: Option<Arc<dyn StateStore>>,
}

impl EngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetryCollector>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Persist to `store` regardless of `persistence.enabled`.
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> ResilienceEngine {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self.store.or_else(|| {
            config
                .persistence
                .enabled
                .then(|| Arc::new(JsonFileStore::new(&config.persistence.path)) as Arc<dyn StateStore>)
        });

        let inner = EngineInner {
            health: HealthMonitor::new(config.health.clone(), clock.clone()),
            cache: FallbackCache::new(config.cache.ttl(), clock.clone()),
            dlq: DeadLetterQueue::new(config.dlq.max_size, config.dlq.max_backoff(), clock.clone()),
            replays: ReplayRegistry::new(),
            rate_limiter: self.rate_limiter.unwrap_or_else(|| Arc::new(Unlimited)),
            retry_policy: self.retry_policy.unwrap_or_else(|| Arc::new(NoRetry)),
            telemetry: self.telemetry.unwrap_or_else(|| Arc::new(MetricsTelemetry)),
            store,
            clock,
            config,
        };

        ResilienceEngine { inner: Arc::new(inner) }
    }
}

/// Protects calls to unreliable endpoints.
///
/// Cheap to clone; clones share all state. Construct once and pass it to
/// call sites.
#[derive(Debug, Clone)]
pub struct ResilienceEngine {
    inner: Arc<EngineInner>,
}

impl ResilienceEngine {
    pub fn builder(config: ResilienceConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            clock: None,
            rate_limiter: None,
            retry_policy: None,
            telemetry: None,
            store: None,
        }
    }

    /// Engine with default collaborators.
    pub fn new(config: ResilienceConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.inner.config
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.inner.health
    }

    pub fn cache(&self) -> &FallbackCache {
        &self.inner.cache
    }

    pub fn dlq(&self) -> &DeadLetterQueue {
        &self.inner.dlq
    }

    pub fn register_endpoint(&self, name: &str) {
        self.inner.health.register_endpoint(name);
    }

    /// Run `op` under the protection of the call's mode.
    ///
    /// `op` is invoked once per attempt. The call budget covers admission,
    /// every attempt and every retry delay. When it runs out the in-flight
    /// attempt is dropped; work `op` handed to other tasks keeps running.
    pub async fn execute<T, F, Fut, E>(&self, call: CallSpec, mut op: F) -> Outcome<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let inner = &*self.inner;
        let mode = call.mode.unwrap_or(inner.config.execution.default_mode);
        let pipeline = Pipeline::for_mode(mode);
        let priority = mode.effective_priority(call.priority);
        let budget = mode.effective_timeout(call.timeout.unwrap_or_else(|| inner.config.execution.default_timeout()));
        let fallback = call.fallback.unwrap_or(inner.config.cache.fallback_enabled);
        let key = cache_key(&call.function, &call.args);
        let deadline = Deadline::after(budget);
        let request_id = Uuid::new_v4();

        inner.health.register_endpoint(&call.endpoint);
        tracing::debug!(
            request_id = %request_id,
            endpoint = %call.endpoint,
            function = %call.function,
            mode = %mode,
            priority = %priority,
            budget_ms = budget.as_millis() as u64,
            "Executing protected call"
        );

        if fallback && inner.health.status(&call.endpoint) == HealthStatus::Down {
            tracing::warn!(endpoint = %call.endpoint, function = %call.function, "Endpoint down, call not attempted");
            let cause = ExecuteError::EndpointDown {
                endpoint: call.endpoint.clone(),
            };
            return self.fallback_or_fail(&call, &key, fallback, cause, deadline.elapsed());
        }

        let mut admitted = false;
        let mut max_attempts = 1;
        for step in pipeline.steps() {
            match step {
                Step::Admission => {
                    admitted = deadline
                        .run(inner.rate_limiter.acquire(priority, Some(deadline.remaining()), request_id))
                        .await
                        .unwrap_or(false);

                    if !admitted {
                        let err = ExecuteError::RateLimitTimeout {
                            endpoint: call.endpoint.clone(),
                            waited: deadline.elapsed(),
                        };
                        tracing::warn!(
                            request_id = %request_id,
                            endpoint = %call.endpoint,
                            priority = %priority,
                            "Rate limiter rejected call"
                        );
                        self.report(&call, deadline.elapsed(), Some(&err), false);
                        return Outcome::Failed(err);
                    }
                }
                Step::Retry => max_attempts = inner.config.retry.max_attempts.max(1),
            }
        }

        let call_started = tokio::time::Instant::now();
        let mut attempts = 0u32;

        let result: Result<T, BoxError> = loop {
            attempts += 1;
            let err: BoxError = match deadline.run(op()).await {
                Ok(Ok(value)) => break Ok(value),
                Ok(Err(e)) => e.into(),
                Err(expired) => break Err(expired.into()),
            };

            if attempts >= max_attempts || !inner.retry_policy.should_retry(err.as_ref(), attempts) {
                break Err(err);
            }

            let delay = inner.retry_policy.next_delay(err.as_ref(), attempts);
            tracing::debug!(
                request_id = %request_id,
                endpoint = %call.endpoint,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt failed, retrying"
            );
            if let Err(expired) = deadline.run(tokio::time::sleep(delay)).await {
                break Err(expired.into());
            }
        };

        let elapsed = call_started.elapsed();
        if admitted {
            inner.rate_limiter.record_response(elapsed, result.is_ok(), priority);
        }

        match result {
            Ok(value) => {
                inner.health.record_request(&call.endpoint, true, elapsed);
                if fallback {
                    inner.cache.put(&key, &value);
                }
                self.report(&call, deadline.elapsed(), None, false);
                Outcome::Success(value)
            }
            Err(source) => {
                inner.health.record_request(&call.endpoint, false, elapsed);
                inner.dlq.add(FailedRequest::new(
                    call.endpoint.clone(),
                    call.function.clone(),
                    call.args.clone(),
                    priority,
                    inner.config.dlq.max_retries,
                    source.to_string(),
                    inner.clock.now(),
                ));

                let err = ExecuteError::Upstream {
                    endpoint: call.endpoint.clone(),
                    attempts,
                    source,
                };
                tracing::warn!(
                    request_id = %request_id,
                    endpoint = %call.endpoint,
                    function = %call.function,
                    attempts,
                    error = %err,
                    "Protected call failed"
                );
                self.fallback_or_fail(&call, &key, fallback, err, deadline.elapsed())
            }
        }
    }

    fn fallback_or_fail<T: DeserializeOwned>(
        &self,
        call: &CallSpec,
        key: &str,
        fallback: bool,
        cause: ExecuteError,
        duration: Duration,
    ) -> Outcome<T> {
        if fallback {
            if let Some(value) = self.inner.cache.get::<T>(key) {
                tracing::info!(
                    endpoint = %call.endpoint,
                    function = %call.function,
                    reason = cause.kind(),
                    "Serving cached fallback"
                );
                self.report(call, duration, Some(&cause), true);
                return Outcome::Degraded { value, cause };
            }
        }
        self.report(call, duration, Some(&cause), false);
        Outcome::Failed(cause)
    }

    fn report(&self, call: &CallSpec, duration: Duration, error: Option<&ExecuteError>, cache_hit: bool) {
        self.inner.telemetry.record_call(CallRecord {
            endpoint: call.endpoint.clone(),
            function: call.function.clone(),
            duration,
            success: error.is_none(),
            error_type: error.map(ExecuteError::kind),
            tokens_used: call.tokens,
            cache_hit,
        });
    }

    /// Register the function used to replay dead letters named `function`.
    pub fn register_replay<F, Fut>(&self, function: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.inner.replays.register(function, f);
    }

    /// Run one dead-letter drain pass now.
    pub async fn drain_dead_letters(&self) -> DrainReport {
        let inner = &*self.inner;
        drain_once(
            &inner.dlq,
            &inner.replays,
            inner.config.cache.fallback_enabled.then_some(&inner.cache),
            &inner.health,
            inner.config.dlq.replay_timeout(),
        )
        .await
    }

    pub fn get_system_status(&self) -> SystemStatus {
        SystemStatus {
            endpoints: self.inner.health.snapshot(),
            dlq: self.inner.dlq.stats(),
            cache: self.inner.cache.stats(),
        }
    }

    pub fn get_health_report(&self) -> HealthReport {
        let endpoints = self.inner.health.snapshot();
        let mut counts_by_status: BTreeMap<HealthStatus, usize> =
            HealthStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for endpoint in &endpoints {
            *counts_by_status.entry(endpoint.status).or_default() += 1;
        }

        HealthReport {
            overall_health: endpoints
                .iter()
                .map(|e| e.status)
                .max()
                .unwrap_or(HealthStatus::Healthy),
            counts_by_status,
            recent_failures: self.inner.dlq.recent(RECENT_FAILURES),
            generated_at: self.inner.clock.now(),
        }
    }

    /// Restore persisted DLQ and cache entries. Returns how many were kept.
    pub fn load_state(&self) -> Result<usize, BookkeepingError> {
        let Some(store) = &self.inner.store else {
            return Ok(0);
        };
        let Some(state) = store.load()? else {
            return Ok(0);
        };

        let dlq = self.inner.dlq.restore(state.dlq_entries);
        let cache = self.inner.cache.restore(state.cache_entries);
        tracing::info!(dlq_entries = dlq, cache_entries = cache, "Restored persisted state");
        Ok(dlq + cache)
    }

    /// Save DLQ and cache entries. A no-op without a state store.
    pub fn save_state(&self) -> Result<(), BookkeepingError> {
        let Some(store) = &self.inner.store else {
            return Ok(());
        };
        let state = PersistedState::new(
            self.inner.clock.now(),
            self.inner.dlq.snapshot(),
            self.inner.cache.snapshot(),
        );
        store.save(&state)
    }

    fn save_state_logged(&self) {
        if let Err(e) = self.save_state() {
            tracing::error!(error = %e, "Failed to persist state");
        }
    }

    /// Load persisted state and start the background loops.
    ///
    /// The returned scheduler must be shut down to stop the loops and write
    /// the final state.
    pub fn start(&self) -> BackgroundScheduler {
        if let Err(e) = self.load_state() {
            tracing::error!(error = %e, "Failed to load persisted state, starting empty");
        }

        let config = &self.inner.config;
        let mut scheduler = BackgroundScheduler::new();

        let engine = self.clone();
        scheduler.spawn_periodic("health-recompute", config.health.check_interval(), move || {
            let engine = engine.clone();
            async move { engine.inner.health.recompute_availability() }
        });

        let engine = self.clone();
        scheduler.spawn_periodic("dlq-drain", config.dlq.drain_interval(), move || {
            let engine = engine.clone();
            async move {
                engine.drain_dead_letters().await;
            }
        });

        let engine = self.clone();
        scheduler.spawn_periodic("cache-sweep", config.cache.sweep_interval(), move || {
            let engine = engine.clone();
            async move {
                engine.inner.cache.sweep();
            }
        });

        if self.inner.store.is_some() {
            let engine = self.clone();
            scheduler.spawn_periodic("state-persist", config.persistence.interval(), move || {
                let engine = engine.clone();
                async move { engine.save_state_logged() }
            });

            let engine = self.clone();
            scheduler.on_stop(move || engine.save_state_logged());
        }

        tracing::info!(tasks = scheduler.task_count(), "Resilience engine started");
        scheduler
    }
}
