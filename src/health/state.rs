//! Endpoint health state and classification.
//!
//! # States
//! - Healthy: normal operation
//! - Degraded: failing intermittently, slow, or below the degraded success rate
//! - Down: sustained failure; calls are short-circuited
//!
//! # Classification (first match wins)
//! ```text
//! consecutive_failures >= 5 AND success_rate < unhealthy  → Down
//! consecutive_failures >= 3 OR success_rate < degraded
//!     OR response_time_ewma > slow_response               → Degraded
//! otherwise                                               → Healthy
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::HealthConfig;

pub const DOWN_FAILURE_STREAK: u32 = 5;
pub const DEGRADED_FAILURE_STREAK: u32 = 3;

/// Health classification of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

impl HealthStatus {
    pub const ALL: [HealthStatus; 3] = [
        HealthStatus::Healthy,
        HealthStatus::Degraded,
        HealthStatus::Down,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
        }
    }

    /// Whether the endpoint counts as serving for availability purposes.
    pub fn is_available(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an endpoint from its running metrics.
pub fn classify(
    success_rate: f64,
    consecutive_failures: u32,
    response_time_ewma: Duration,
    config: &HealthConfig,
) -> HealthStatus {
    if consecutive_failures >= DOWN_FAILURE_STREAK && success_rate < config.unhealthy_threshold {
        HealthStatus::Down
    } else if consecutive_failures >= DEGRADED_FAILURE_STREAK
        || success_rate < config.degraded_threshold
        || response_time_ewma > config.slow_response()
    {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Running health metrics for one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    /// Exponentially weighted moving average of response time.
    #[serde(with = "duration_millis")]
    pub response_time_ewma: Duration,
    /// Fraction of successful requests, always within [0, 1].
    pub success_rate: f64,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    /// Fraction of the availability window spent Healthy or Degraded.
    pub availability: f64,
}

impl EndpointHealth {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            last_check: now,
            response_time_ewma: Duration::ZERO,
            success_rate: 1.0,
            consecutive_failures: 0,
            total_requests: 0,
            availability: 1.0,
        }
    }

    /// Fold one request outcome into the metrics and reclassify.
    ///
    /// Returns the previous status if it changed.
    pub fn record(
        &mut self,
        success: bool,
        response_time: Duration,
        now: DateTime<Utc>,
        config: &HealthConfig,
    ) -> Option<HealthStatus> {
        self.total_requests += 1;
        let n = self.total_requests as f64;
        let outcome = if success { 1.0 } else { 0.0 };
        self.success_rate = ((self.success_rate * (n - 1.0) + outcome) / n).clamp(0.0, 1.0);

        // The first sample seeds the average instead of decaying from zero.
        self.response_time_ewma = if self.total_requests == 1 {
            response_time
        } else {
            let alpha = config.ewma_alpha;
            Duration::from_secs_f64(
                alpha * response_time.as_secs_f64()
                    + (1.0 - alpha) * self.response_time_ewma.as_secs_f64(),
            )
        };

        if success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }

        self.last_check = now;
        let previous = self.status;
        self.status = classify(
            self.success_rate,
            self.consecutive_failures,
            self.response_time_ewma,
            config,
        );

        (previous != self.status).then_some(previous)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HealthConfig {
        HealthConfig::default()
    }

    #[test]
    fn test_classification_order() {
        let cfg = config();
        let fast = Duration::from_millis(100);

        assert_eq!(classify(1.0, 0, fast, &cfg), HealthStatus::Healthy);
        assert_eq!(classify(0.79, 0, fast, &cfg), HealthStatus::Degraded);
        assert_eq!(classify(0.95, 3, fast, &cfg), HealthStatus::Degraded);
        assert_eq!(classify(0.4, 3, fast, &cfg), HealthStatus::Degraded);
        assert_eq!(classify(0.0, 4, fast, &cfg), HealthStatus::Degraded);
        assert_eq!(classify(0.4, 5, fast, &cfg), HealthStatus::Down);
        // A long success history keeps a failure streak out of Down.
        assert_eq!(classify(0.9, 5, fast, &cfg), HealthStatus::Degraded);
        assert_eq!(
            classify(1.0, 0, Duration::from_secs(11), &cfg),
            HealthStatus::Degraded
        );
    }

    #[test]
    fn test_failure_streak_never_healthy() {
        let cfg = config();
        let now = Utc::now();

        for successes in 0..5u32 {
            let mut health = EndpointHealth::new("gen-api", now);
            for _ in 0..successes {
                health.record(true, Duration::from_millis(50), now, &cfg);
            }
            for _ in 0..5 + successes * 2 {
                health.record(false, Duration::from_millis(50), now, &cfg);
            }
            assert!(health.consecutive_failures >= DOWN_FAILURE_STREAK);
            assert!(health.success_rate < cfg.unhealthy_threshold);
            assert_eq!(health.status, HealthStatus::Down);
        }
    }

    #[test]
    fn test_running_success_rate() {
        let cfg = config();
        let now = Utc::now();
        let mut health = EndpointHealth::new("gen-api", now);

        health.record(true, Duration::from_millis(10), now, &cfg);
        health.record(false, Duration::from_millis(10), now, &cfg);
        health.record(true, Duration::from_millis(10), now, &cfg);
        health.record(true, Duration::from_millis(10), now, &cfg);

        assert_eq!(health.total_requests, 4);
        assert!((health.success_rate - 0.75).abs() < 1e-9);
        assert_eq!(health.consecutive_failures, 0);
    }

    #[test]
    fn test_ewma_smoothing() {
        let cfg = config();
        let now = Utc::now();
        let mut health = EndpointHealth::new("gen-api", now);

        health.record(true, Duration::from_millis(1000), now, &cfg);
        assert_eq!(health.response_time_ewma, Duration::from_millis(1000));

        health.record(true, Duration::from_millis(2000), now, &cfg);
        let ms = health.response_time_ewma.as_secs_f64() * 1000.0;
        assert!((ms - 1100.0).abs() < 0.01);
    }

    #[test]
    fn test_record_reports_transition() {
        let cfg = config();
        let now = Utc::now();
        let mut health = EndpointHealth::new("gen-api", now);

        assert_eq!(health.record(true, Duration::ZERO, now, &cfg), None);
        assert_eq!(
            health.record(false, Duration::ZERO, now, &cfg),
            Some(HealthStatus::Healthy)
        );
        assert_eq!(health.status, HealthStatus::Degraded);
    }
}
