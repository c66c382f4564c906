//! End-to-end behaviour of `ResilienceEngine::execute`.

use serde_json::json;
use std::time::Duration;

use resilience_engine::cache::cache_key;
use resilience_engine::config::ResilienceConfig;
use resilience_engine::health::HealthStatus;
use resilience_engine::{CallSpec, ExecuteError, ExecutionMode, Outcome, Priority};

mod common;
use common::{FlakyUpstream, Harness, ScriptedLimiter};

fn gen_call(mode: ExecutionMode) -> CallSpec {
    CallSpec::new("gen-api", "complete")
        .args(&json!({"prompt": "hello", "max_tokens": 64}))
        .mode(mode)
        .timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_full_mode_success_populates_cache() {
    let h = Harness::default_config();
    let upstream = FlakyUpstream::healthy();

    let outcome = h
        .engine
        .execute(gen_call(ExecutionMode::Full), || {
            let upstream = upstream.clone();
            async move { upstream.complete("hello").await }
        })
        .await;

    assert_eq!(outcome.into_result().unwrap(), "completion for hello");

    let health = h.engine.health().get_status("gen-api").unwrap();
    assert_eq!(health.success_rate, 1.0);
    assert_eq!(health.status, HealthStatus::Healthy);

    // Key order of the arguments does not matter.
    let key = cache_key("complete", &json!({"max_tokens": 64, "prompt": "hello"}));
    assert_eq!(h.engine.cache().get::<String>(&key).as_deref(), Some("completion for hello"));

    assert_eq!(h.limiter.acquire_count(), 1);
    assert_eq!(h.limiter.response_count(), 1);
}

#[tokio::test]
async fn test_down_endpoint_serves_degraded_cached_value() {
    let h = Harness::default_config();
    let upstream = FlakyUpstream::healthy();

    let first = h
        .engine
        .execute(gen_call(ExecutionMode::Basic), || {
            let upstream = upstream.clone();
            async move { upstream.complete("hello").await }
        })
        .await;
    assert!(first.is_success());

    let broken = FlakyUpstream::always_failing();
    for _ in 0..5 {
        let outcome = h
            .engine
            .execute(gen_call(ExecutionMode::Basic), || {
                let broken = broken.clone();
                async move { broken.complete("hello").await }
            })
            .await;
        assert!(outcome.is_degraded());
    }
    assert_eq!(h.engine.health().status("gen-api"), HealthStatus::Down);
    assert_eq!(broken.calls(), 5);

    let outcome = h
        .engine
        .execute(gen_call(ExecutionMode::Basic), || {
            let broken = broken.clone();
            async move { broken.complete("hello").await }
        })
        .await;

    match outcome {
        Outcome::Degraded { value, cause } => {
            assert_eq!(value, "completion for hello");
            assert!(matches!(cause, ExecuteError::EndpointDown { .. }));
        }
        other => panic!("expected degraded outcome, got {other:?}"),
    }
    assert_eq!(broken.calls(), 5, "down endpoint must not be called");
}

#[tokio::test]
async fn test_down_endpoint_without_cache_fails_fast() {
    let h = Harness::default_config();
    for _ in 0..5 {
        h.engine.health().record_request("gen-api", false, Duration::from_millis(10));
    }
    let upstream = FlakyUpstream::healthy();

    let outcome: Outcome<String> = h
        .engine
        .execute(gen_call(ExecutionMode::Full), || {
            let upstream = upstream.clone();
            async move { upstream.complete("hello").await }
        })
        .await;

    assert!(matches!(outcome, Outcome::Failed(ExecuteError::EndpointDown { .. })));
    assert_eq!(upstream.calls(), 0);
    assert!(h.engine.dlq().is_empty());
    assert_eq!(h.limiter.acquire_count(), 0);
}

#[tokio::test]
async fn test_rate_limit_rejection_skips_call_and_health() {
    let h = Harness::new(ResilienceConfig::default(), ScriptedLimiter::rejecting());
    let upstream = FlakyUpstream::healthy();

    let outcome: Outcome<String> = h
        .engine
        .execute(gen_call(ExecutionMode::Smart), || {
            let upstream = upstream.clone();
            async move { upstream.complete("hello").await }
        })
        .await;

    assert!(matches!(outcome, Outcome::Failed(ExecuteError::RateLimitTimeout { .. })));
    assert_eq!(upstream.calls(), 0);

    let health = h.engine.health().get_status("gen-api").unwrap();
    assert_eq!(health.total_requests, 0);
    assert!(h.engine.dlq().is_empty());
    assert_eq!(h.limiter.response_count(), 0);

    let records = h.telemetry.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error_type, Some("rate_limit_timeout"));
}

#[tokio::test(start_paused = true)]
async fn test_limiter_wait_bounded_by_timeout() {
    let h = Harness::new(ResilienceConfig::default(), ScriptedLimiter::hanging());
    let upstream = FlakyUpstream::healthy();

    let outcome: Outcome<String> = h
        .engine
        .execute(gen_call(ExecutionMode::Full).timeout(Duration::from_secs(1)), || {
            let upstream = upstream.clone();
            async move { upstream.complete("hello").await }
        })
        .await;

    match outcome {
        Outcome::Failed(ExecuteError::RateLimitTimeout { waited, .. }) => {
            assert!(waited >= Duration::from_secs(1));
        }
        other => panic!("expected rate limit timeout, got {other:?}"),
    }
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_modes_without_admission_ignore_limiter() {
    let h = Harness::new(ResilienceConfig::default(), ScriptedLimiter::rejecting());

    for mode in [ExecutionMode::Basic, ExecutionMode::Enhanced] {
        let outcome = h
            .engine
            .execute(gen_call(mode), || async { Ok::<_, String>(1u32) })
            .await;
        assert!(outcome.is_success(), "{mode} should not consult the limiter");
    }
    assert_eq!(h.limiter.acquire_count(), 0);
}

#[tokio::test]
async fn test_retry_recovers_within_attempt_bound() {
    let h = Harness::default_config();
    let upstream = FlakyUpstream::failing_first(2);

    let outcome = h
        .engine
        .execute(gen_call(ExecutionMode::Full), || {
            let upstream = upstream.clone();
            async move { upstream.complete("hello").await }
        })
        .await;

    assert!(outcome.is_success());
    assert_eq!(upstream.calls(), 3);
    assert_eq!(*h.retry.consulted.lock().unwrap(), vec![1, 2]);

    // One terminal outcome, not one per attempt.
    let health = h.engine.health().get_status("gen-api").unwrap();
    assert_eq!(health.total_requests, 1);
    assert_eq!(h.limiter.response_count(), 1);
    assert_eq!(h.telemetry.records().len(), 1);
    assert!(h.engine.dlq().is_empty());
}

#[tokio::test]
async fn test_retry_exhaustion_dead_letters_once() {
    let h = Harness::default_config();
    let upstream = FlakyUpstream::always_failing();

    let outcome: Outcome<String> = h
        .engine
        .execute(gen_call(ExecutionMode::Enhanced).fallback(false), || {
            let upstream = upstream.clone();
            async move { upstream.complete("hello").await }
        })
        .await;

    match outcome {
        Outcome::Failed(ExecuteError::Upstream { attempts, ref source, .. }) => {
            assert_eq!(attempts, 3);
            assert_eq!(source.to_string(), "upstream returned 503");
        }
        ref other => panic!("expected upstream error, got {other:?}"),
    }
    assert_eq!(upstream.calls(), 3);

    let dead = h.engine.dlq().snapshot();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].endpoint, "gen-api");
    assert_eq!(dead[0].serialized_args, json!({"prompt": "hello", "max_tokens": 64}));
    assert_eq!(dead[0].retry_count, 0);
}

#[tokio::test]
async fn test_smart_mode_does_not_retry() {
    let h = Harness::default_config();
    let upstream = FlakyUpstream::failing_first(1);

    let outcome: Outcome<String> = h
        .engine
        .execute(gen_call(ExecutionMode::Smart), || {
            let upstream = upstream.clone();
            async move { upstream.complete("hello").await }
        })
        .await;

    assert!(outcome.is_failed());
    assert_eq!(upstream.calls(), 1);
    assert!(h.retry.consulted.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_counted_as_failure() {
    let h = Harness::default_config();

    let outcome: Outcome<String> = h
        .engine
        .execute(gen_call(ExecutionMode::Basic).timeout(Duration::from_secs(1)), || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, String>("too late".to_string())
        })
        .await;

    let err = outcome.into_result().unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.kind(), "timeout");

    let health = h.engine.health().get_status("gen-api").unwrap();
    assert_eq!(health.consecutive_failures, 1);
    assert_eq!(h.engine.dlq().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_covers_retry_delays() {
    let clock = resilience_engine::clock::ManualClock::default();
    let engine = resilience_engine::ResilienceEngine::builder(ResilienceConfig::default())
        .clock(std::sync::Arc::new(clock))
        .retry_policy(std::sync::Arc::new(resilience_engine::resilience::FixedDelay(
            Duration::from_secs(10),
        )))
        .build();
    let upstream = FlakyUpstream::failing_first(1);

    let started = tokio::time::Instant::now();
    let outcome: Outcome<String> = engine
        .execute(gen_call(ExecutionMode::Enhanced).timeout(Duration::from_secs(2)), || {
            let upstream = upstream.clone();
            async move { upstream.complete("hello").await }
        })
        .await;

    assert!(outcome.error().is_some_and(ExecuteError::is_timeout));
    assert_eq!(upstream.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_critical_mode_doubles_timeout_and_raises_priority() {
    let h = Harness::default_config();
    let slow = || async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        Ok::<_, String>("done".to_string())
    };

    let full = h
        .engine
        .execute(
            gen_call(ExecutionMode::Full).timeout(Duration::from_secs(1)).priority(Priority::Low),
            slow,
        )
        .await;
    assert!(full.error().is_some_and(ExecuteError::is_timeout));

    let critical = h
        .engine
        .execute(
            gen_call(ExecutionMode::Critical).timeout(Duration::from_secs(1)).priority(Priority::Low),
            slow,
        )
        .await;
    assert!(critical.is_success());

    let acquired = h.limiter.acquired.lock().unwrap().clone();
    assert_eq!(acquired, vec![Priority::Low, Priority::Critical]);
}

#[tokio::test]
async fn test_telemetry_records_degraded_cache_hit() {
    let h = Harness::default_config();
    let _ = h
        .engine
        .execute(gen_call(ExecutionMode::Basic).tokens(120), || async { Ok::<_, String>(7u32) })
        .await;
    let outcome = h
        .engine
        .execute(gen_call(ExecutionMode::Basic).tokens(120), || async { Err::<u32, _>("boom") })
        .await;
    assert_eq!(outcome.value(), Some(&7));

    let records = h.telemetry.records();
    assert_eq!(records.len(), 2);
    assert!(records[0].success && !records[0].cache_hit);
    assert_eq!(records[0].tokens_used, Some(120));
    assert!(!records[1].success && records[1].cache_hit);
    assert_eq!(records[1].error_type, Some("upstream_error"));
}

#[tokio::test]
async fn test_system_status_and_health_report() {
    let h = Harness::default_config();
    h.engine.register_endpoint("search");
    for i in 0..12 {
        let call = CallSpec::new("gen-api", "complete")
            .args(&json!({ "n": i }))
            .mode(ExecutionMode::Basic)
            .fallback(false);
        let _ = h.engine.execute(call, || async { Err::<u32, _>("boom") }).await;
        h.clock.advance(Duration::from_secs(1));
    }

    let status = h.engine.get_system_status();
    assert_eq!(status.endpoints.len(), 2);
    assert_eq!(status.dlq.queue_size, 12);
    assert_eq!(status.dlq.total_added, 12);

    let report = h.engine.get_health_report();
    assert_eq!(report.overall_health, HealthStatus::Down);
    assert_eq!(report.recent_failures.len(), 10);
    assert_eq!(report.recent_failures[0].serialized_args, json!({"n": 11}));
    assert_eq!(report.counts_by_status[&HealthStatus::Healthy], 1);
}
