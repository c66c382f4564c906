//! Dead-letter replay, background loops and persistence across restarts.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use resilience_engine::cache::cache_key;
use resilience_engine::clock::ManualClock;
use resilience_engine::config::ResilienceConfig;
use resilience_engine::persistence::{JsonFileStore, StateStore};
use resilience_engine::{BoxError, CallSpec, ExecutionMode, Outcome, ResilienceEngine};

mod common;
use common::Harness;

async fn failing_call(h: &Harness, prompt: &str) -> Outcome<String> {
    let call = CallSpec::new("gen-api", "complete")
        .args(&json!({ "prompt": prompt }))
        .mode(ExecutionMode::Basic);
    h.engine
        .execute(call, || async { Err::<String, _>("upstream returned 503") })
        .await
}

#[tokio::test]
async fn test_drain_replays_and_refreshes_cache() {
    let h = Harness::default_config();
    h.engine.register_replay("complete", |args: Value| async move {
        Ok::<_, BoxError>(json!(format!("replayed {}", args["prompt"].as_str().unwrap_or_default())))
    });

    assert!(failing_call(&h, "hello").await.is_failed());
    assert_eq!(h.engine.dlq().len(), 1);

    // Not due until 2^0 seconds after the failure.
    assert_eq!(h.engine.drain_dead_letters().await.attempted, 0);

    h.clock.advance(Duration::from_secs(1));
    let report = h.engine.drain_dead_letters().await;
    assert_eq!(report.replayed, 1);
    assert!(h.engine.dlq().is_empty());
    assert_eq!(h.engine.dlq().stats().total_processed, 1);

    let key = cache_key("complete", &json!({"prompt": "hello"}));
    assert_eq!(h.engine.cache().get::<String>(&key).as_deref(), Some("replayed hello"));
}

#[tokio::test]
async fn test_unregistered_replay_dropped_after_max_retries() {
    let mut config = ResilienceConfig::default();
    config.dlq.max_retries = 2;
    let h = Harness::new(config, common::ScriptedLimiter::admitting());

    let _ = failing_call(&h, "hello").await;

    h.clock.advance(Duration::from_secs(1));
    let first = h.engine.drain_dead_letters().await;
    assert_eq!((first.unregistered, first.dropped), (1, 0));
    assert_eq!(h.engine.dlq().snapshot()[0].retry_count, 1);

    // Backoff for retry_count 1 is 2 seconds from the original failure.
    h.clock.advance(Duration::from_secs(1));
    let second = h.engine.drain_dead_letters().await;
    assert_eq!((second.unregistered, second.dropped), (1, 1));
    assert!(h.engine.dlq().is_empty());
    assert_eq!(h.engine.dlq().stats().total_removed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_background_drain_loop_runs_until_shutdown() {
    let mut config = ResilienceConfig::default();
    config.dlq.drain_interval_secs = 1;
    let h = Harness::new(config, common::ScriptedLimiter::admitting());
    h.engine.register_replay("complete", |_args: Value| async { Ok::<_, BoxError>(json!("ok")) });

    let _ = failing_call(&h, "hello").await;
    h.clock.advance(Duration::from_secs(5));

    let scheduler = h.engine.start();
    assert_eq!(scheduler.task_count(), 3);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(h.engine.dlq().is_empty());
    assert_eq!(h.engine.dlq().stats().total_processed, 1);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_background_sweep_evicts_unqueried_entries() {
    let h = Harness::default_config();
    let ok = h
        .engine
        .execute(CallSpec::new("gen-api", "complete"), || async { Ok::<_, String>(7u32) })
        .await;
    assert!(ok.is_success());
    assert_eq!(h.engine.cache().len(), 1);

    h.clock.advance(Duration::from_secs(3601));
    let scheduler = h.engine.start();

    // The first sweep is one interval after start.
    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(h.engine.cache().len(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.engine.cache().is_empty());
    assert_eq!(h.engine.cache().stats().evictions, 1);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_background_health_recompute_updates_availability() {
    let h = Harness::default_config();
    for _ in 0..5 {
        let _ = failing_call(&h, "hello").await;
    }
    assert_eq!(h.engine.health().get_status("gen-api").unwrap().availability, 1.0);

    h.clock.advance(Duration::from_secs(30 * 60));
    let scheduler = h.engine.start();
    tokio::time::sleep(Duration::from_secs(31)).await;

    let availability = h.engine.health().get_status("gen-api").unwrap().availability;
    assert!((availability - 0.5).abs() < 1e-6, "availability = {availability}");

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_drain_skips_cache_when_fallback_disabled() {
    let mut config = ResilienceConfig::default();
    config.cache.fallback_enabled = false;
    let h = Harness::new(config, common::ScriptedLimiter::admitting());
    h.engine.register_replay("complete", |_args: Value| async { Ok::<_, BoxError>(json!("ok")) });

    let _ = failing_call(&h, "hello").await;
    h.clock.advance(Duration::from_secs(1));

    assert_eq!(h.engine.drain_dead_letters().await.replayed, 1);
    assert!(h.engine.cache().is_empty());
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut config = ResilienceConfig::default();
    config.persistence.enabled = true;
    config.persistence.path = path.display().to_string();

    let first = ResilienceEngine::new(config.clone());
    let scheduler = first.start();
    assert_eq!(scheduler.task_count(), 4);

    let ok = first
        .execute(
            CallSpec::new("gen-api", "complete").args(&json!({"prompt": "cached"})),
            || async { Ok::<_, String>("fresh".to_string()) },
        )
        .await;
    assert!(ok.is_success());
    let failed: Outcome<String> = first
        .execute(
            CallSpec::new("gen-api", "complete").args(&json!({"prompt": "lost"})),
            || async { Err::<String, _>("boom") },
        )
        .await;
    assert!(failed.is_failed());

    scheduler.shutdown().await;

    let saved = JsonFileStore::new(&path).load().unwrap().unwrap();
    assert_eq!(saved.dlq_entries.len(), 1);
    assert_eq!(saved.cache_entries.len(), 1);

    let second = ResilienceEngine::new(config);
    let scheduler = second.start();
    assert_eq!(second.dlq().len(), 1);
    assert_eq!(second.dlq().snapshot()[0].serialized_args, json!({"prompt": "lost"}));

    let key = cache_key("complete", &json!({"prompt": "cached"}));
    assert_eq!(second.cache().get::<String>(&key).as_deref(), Some("fresh"));
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_expired_cache_entries_not_restored() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("state.json")));
    let clock = ManualClock::default();

    let first = ResilienceEngine::builder(ResilienceConfig::default())
        .clock(Arc::new(clock.clone()))
        .state_store(store.clone())
        .build();
    let _ = first
        .execute(CallSpec::new("gen-api", "complete"), || async { Ok::<_, String>(1u32) })
        .await;
    first.save_state().unwrap();

    clock.advance(Duration::from_secs(3601));
    let second = ResilienceEngine::builder(ResilienceConfig::default())
        .clock(Arc::new(clock))
        .state_store(store)
        .build();
    assert_eq!(second.load_state().unwrap(), 0);
    assert!(second.cache().is_empty());
}

#[tokio::test]
async fn test_missing_state_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ResilienceEngine::builder(ResilienceConfig::default())
        .state_store(Arc::new(JsonFileStore::new(dir.path().join("absent.json"))))
        .build();

    assert_eq!(engine.load_state().unwrap(), 0);
    let scheduler = engine.start();
    scheduler.shutdown().await;
    assert!(dir.path().join("absent.json").exists());
}
