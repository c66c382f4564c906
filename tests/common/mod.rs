//! Shared fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use resilience_engine::clock::ManualClock;
use resilience_engine::config::ResilienceConfig;
use resilience_engine::observability::{CallRecord, TelemetryCollector};
use resilience_engine::resilience::{RateLimiter, RetryPolicy};
use resilience_engine::{Priority, ResilienceEngine};

/// Rate limiter that admits or rejects on command and records every call.
#[derive(Debug, Default)]
pub struct ScriptedLimiter {
    reject: AtomicBool,
    hang: AtomicBool,
    pub acquired: Mutex<Vec<Priority>>,
    pub responses: Mutex<Vec<(bool, Priority)>>,
}

impl ScriptedLimiter {
    pub fn admitting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting() -> Arc<Self> {
        let limiter = Self::default();
        limiter.reject.store(true, Ordering::SeqCst);
        Arc::new(limiter)
    }

    /// Never answers; only the call deadline ends the wait.
    pub fn hanging() -> Arc<Self> {
        let limiter = Self::default();
        limiter.hang.store(true, Ordering::SeqCst);
        Arc::new(limiter)
    }

    pub fn acquire_count(&self) -> usize {
        self.acquired.lock().unwrap().len()
    }

    pub fn response_count(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl RateLimiter for ScriptedLimiter {
    async fn acquire(&self, priority: Priority, _timeout: Option<Duration>, _request_id: Uuid) -> bool {
        self.acquired.lock().unwrap().push(priority);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        !self.reject.load(Ordering::SeqCst)
    }

    fn record_response(&self, _duration: Duration, success: bool, priority: Priority) {
        self.responses.lock().unwrap().push((success, priority));
    }
}

/// Retries everything after `delay`, recording each consulted attempt number.
#[derive(Debug)]
pub struct RecordingRetry {
    delay: Duration,
    pub consulted: Mutex<Vec<u32>>,
}

impl RecordingRetry {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            consulted: Mutex::new(Vec::new()),
        })
    }
}

impl RetryPolicy for RecordingRetry {
    fn should_retry(&self, _error: &(dyn Error + Send + Sync + 'static), attempt: u32) -> bool {
        self.consulted.lock().unwrap().push(attempt);
        true
    }

    fn next_delay(&self, _error: &(dyn Error + Send + Sync + 'static), _attempt: u32) -> Duration {
        self.delay
    }
}

/// Keeps every call record.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    pub records: Mutex<Vec<CallRecord>>,
}

impl RecordingTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TelemetryCollector for RecordingTelemetry {
    fn record_call(&self, record: CallRecord) {
        self.records.lock().unwrap().push(record);
    }
}

/// Upstream that fails a set number of times before succeeding.
#[derive(Debug)]
pub struct FlakyUpstream {
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl FlakyUpstream {
    pub fn failing_first(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_first(u32::MAX)
    }

    pub fn healthy() -> Arc<Self> {
        Self::failing_first(0)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err("upstream returned 503".to_string())
        } else {
            Ok(format!("completion for {prompt}"))
        }
    }
}

/// Engine plus the fakes wired into it.
pub struct Harness {
    pub engine: ResilienceEngine,
    pub clock: ManualClock,
    pub limiter: Arc<ScriptedLimiter>,
    pub retry: Arc<RecordingRetry>,
    pub telemetry: Arc<RecordingTelemetry>,
}

impl Harness {
    pub fn new(config: ResilienceConfig, limiter: Arc<ScriptedLimiter>) -> Self {
        let clock = ManualClock::default();
        let retry = RecordingRetry::new(Duration::ZERO);
        let telemetry = RecordingTelemetry::new();
        let engine = ResilienceEngine::builder(config)
            .clock(Arc::new(clock.clone()))
            .rate_limiter(limiter.clone())
            .retry_policy(retry.clone())
            .telemetry(telemetry.clone())
            .build();

        Self {
            engine,
            clock,
            limiter,
            retry,
            telemetry,
        }
    }

    pub fn default_config() -> Self {
        Self::new(ResilienceConfig::default(), ScriptedLimiter::admitting())
    }
}
