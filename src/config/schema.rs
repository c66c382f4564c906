//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::ExecutionMode;

/// Root configuration for the resilience engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Health classification thresholds and availability window.
    pub health: HealthConfig,

    /// Fallback cache settings.
    pub cache: CacheConfig,

    /// Dead-letter queue capacity and drain settings.
    pub dlq: DlqConfig,

    /// Retry loop bound for ENHANCED/FULL/CRITICAL calls.
    pub retry: RetryConfig,

    /// Defaults applied to calls that do not override them.
    pub execution: ExecutionConfig,

    /// State persistence across restarts.
    pub persistence: PersistenceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Health classification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Success rate below which an endpoint is at least DEGRADED.
    pub degraded_threshold: f64,

    /// Success rate below which a failing endpoint is marked Down.
    pub unhealthy_threshold: f64,

    /// Response time EWMA above which an endpoint is DEGRADED (milliseconds).
    pub slow_response_ms: u64,

    /// Smoothing factor for the response time EWMA.
    pub ewma_alpha: f64,

    /// Interval between availability recomputations in seconds.
    pub check_interval_secs: u64,

    /// Window over which availability is computed in seconds.
    pub availability_window_secs: u64,

    /// Age after which status-change events are pruned in seconds.
    pub event_retention_secs: u64,

    /// Hard cap on retained status-change events.
    pub max_events: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degraded_threshold: 0.8,
            unhealthy_threshold: 0.5,
            slow_response_ms: 10_000,
            ewma_alpha: 0.1,
            check_interval_secs: 30,
            availability_window_secs: 3600,
            event_retention_secs: 86_400,
            max_events: 10_000,
        }
    }
}

impl HealthConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn slow_response(&self) -> Duration {
        Duration::from_millis(self.slow_response_ms)
    }
}

/// Fallback cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve cached responses when an endpoint is down or a call fails.
    pub fallback_enabled: bool,

    /// Entry lifetime in seconds.
    pub ttl_secs: u64,

    /// Interval between expired-entry sweeps in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            ttl_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Dead-letter queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DlqConfig {
    /// Maximum number of queued failed requests (oldest evicted first).
    pub max_size: usize,

    /// Replay attempts before a failed request is dropped.
    pub max_retries: u32,

    /// Interval between drain passes in seconds.
    pub drain_interval_secs: u64,

    /// Cap on the per-entry replay backoff in seconds.
    pub max_backoff_secs: u64,

    /// Deadline for a single replay in seconds.
    pub replay_timeout_secs: u64,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            max_retries: 3,
            drain_interval_secs: 60,
            max_backoff_secs: 300,
            replay_timeout_secs: 30,
        }
    }
}

impl DlqConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn replay_timeout(&self) -> Duration {
        Duration::from_secs(self.replay_timeout_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (first call included).
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Per-call defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Timeout applied when a call does not set one, in seconds.
    pub default_timeout_secs: u64,

    /// Mode applied when a call does not set one.
    pub default_mode: ExecutionMode,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 60,
            default_mode: ExecutionMode::Full,
        }
    }
}

impl ExecutionConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

/// State persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Persist DLQ and cache state periodically and on shutdown.
    pub enabled: bool,

    /// Path of the JSON state file.
    pub path: String,

    /// Interval between periodic saves in seconds.
    pub interval_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "resilience_state.json".to_string(),
            interval_secs: 300,
        }
    }
}

impl PersistenceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
