//! Configuration validation.
//!
//! Serde handles syntactic checks; this module checks value ranges and
//! cross-field consistency. Validation is a pure function that reports
//! every violation rather than stopping at the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ResilienceConfig;

/// A single semantic configuration violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("health.unhealthy_threshold ({unhealthy}) must not exceed health.degraded_threshold ({degraded})")]
    ThresholdOrder { unhealthy: f64, degraded: f64 },

    #[error("health.ewma_alpha must be within (0, 1], got {0}")]
    InvalidAlpha(f64),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("observability.metrics_address '{0}' is not a valid socket address")]
    InvalidAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let health = &config.health;

    for (field, value) in [
        ("health.degraded_threshold", health.degraded_threshold),
        ("health.unhealthy_threshold", health.unhealthy_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ValidationError::OutOfUnitRange { field, value });
        }
    }

    if health.unhealthy_threshold > health.degraded_threshold {
        errors.push(ValidationError::ThresholdOrder {
            unhealthy: health.unhealthy_threshold,
            degraded: health.degraded_threshold,
        });
    }

    if !(health.ewma_alpha > 0.0 && health.ewma_alpha <= 1.0) {
        errors.push(ValidationError::InvalidAlpha(health.ewma_alpha));
    }

    let positive: [(&'static str, u64); 10] = [
        ("health.check_interval_secs", health.check_interval_secs),
        ("health.availability_window_secs", health.availability_window_secs),
        ("health.event_retention_secs", health.event_retention_secs),
        ("cache.ttl_secs", config.cache.ttl_secs),
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs),
        ("dlq.drain_interval_secs", config.dlq.drain_interval_secs),
        ("dlq.max_backoff_secs", config.dlq.max_backoff_secs),
        ("dlq.replay_timeout_secs", config.dlq.replay_timeout_secs),
        ("execution.default_timeout_secs", config.execution.default_timeout_secs),
        ("persistence.interval_secs", config.persistence.interval_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if health.max_events == 0 {
        errors.push(ValidationError::Zero("health.max_events"));
    }
    if config.dlq.max_size == 0 {
        errors.push(ValidationError::Zero("dlq.max_size"));
    }
    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::Zero("retry.max_attempts"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
