//! Demo runner.
//!
//! Drives a simulated flaky upstream through the engine and prints the
//! resulting system status and health report as JSON.
//!
//! ```text
//!   workers ──execute──▶ ResilienceEngine ──▶ SimulatedUpstream
//!                             │                 (random faults, optional outage)
//!                             ▼
//!                  DLQ drain replays failures once the workload ends
//! ```

use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

use resilience_engine::config::{load_config, ResilienceConfig};
use resilience_engine::observability::{init_logging, init_metrics};
use resilience_engine::resilience::FixedDelay;
use resilience_engine::{BoxError, CallSpec, ExecutionMode, Outcome, Priority, ResilienceEngine};

const PROMPTS: &[&str] = &[
    "summarize the quarterly report",
    "translate the release notes",
    "draft a reply to the customer",
    "list open action items",
];

#[derive(Parser)]
#[command(name = "resilience-engine")]
#[command(about = "Run a simulated workload through the resilience engine", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Total calls to issue
    #[arg(long, default_value_t = 200)]
    calls: usize,

    /// Concurrent workers
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Probability that a single upstream call fails
    #[arg(long, default_value_t = 0.2)]
    failure_rate: f64,

    /// Fail every call after this many have been issued
    #[arg(long)]
    outage_after: Option<usize>,
}

#[derive(Debug, Error)]
enum UpstreamFault {
    #[error("upstream returned 503")]
    Unavailable,

    #[error("upstream outage")]
    Outage,
}

#[derive(Debug)]
struct SimulatedUpstream {
    failure_rate: f64,
    outage_after: Option<usize>,
    issued: AtomicUsize,
}

impl SimulatedUpstream {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamFault> {
        let n = self.issued.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(fastrand::u64(5..40))).await;

        if self.outage_after.is_some_and(|limit| n >= limit) {
            return Err(UpstreamFault::Outage);
        }
        if fastrand::f64() < self.failure_rate {
            return Err(UpstreamFault::Unavailable);
        }
        Ok(format!("completion for '{prompt}'"))
    }
}

#[derive(Debug, Default)]
struct Tally {
    success: AtomicUsize,
    degraded: AtomicUsize,
    failed: AtomicUsize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!("resilience-engine v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let engine = ResilienceEngine::builder(config)
        .retry_policy(Arc::new(FixedDelay(Duration::from_millis(100))))
        .build();

    let upstream = Arc::new(SimulatedUpstream {
        failure_rate: cli.failure_rate.clamp(0.0, 1.0),
        outage_after: cli.outage_after,
        issued: AtomicUsize::new(0),
    });

    let replay_upstream = upstream.clone();
    engine.register_replay("complete", move |args: Value| {
        let upstream = replay_upstream.clone();
        async move {
            let prompt = args["prompt"].as_str().unwrap_or_default().to_string();
            let text = upstream.complete(&prompt).await?;
            Ok::<_, BoxError>(json!(text))
        }
    });

    let scheduler = engine.start();

    tokio::select! {
        tally = run_workload(&engine, upstream, &cli) => {
            tracing::info!(
                success = tally.success.load(Ordering::Relaxed),
                degraded = tally.degraded.load(Ordering::Relaxed),
                failed = tally.failed.load(Ordering::Relaxed),
                "Workload finished"
            );
            let report = engine.drain_dead_letters().await;
            tracing::info!(replayed = report.replayed, failed = report.failed, "Final dead-letter drain");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    let summary = json!({
        "status": engine.get_system_status(),
        "health": engine.get_health_report(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    scheduler.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_workload(engine: &ResilienceEngine, upstream: Arc<SimulatedUpstream>, cli: &Cli) -> Arc<Tally> {
    let tally = Arc::new(Tally::default());
    let next = Arc::new(AtomicUsize::new(0));
    let total = cli.calls;
    let mut workers = JoinSet::new();

    for _ in 0..cli.concurrency.max(1) {
        let engine = engine.clone();
        let upstream = upstream.clone();
        let tally = tally.clone();
        let next = next.clone();

        workers.spawn(async move {
            loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                if i >= total {
                    break;
                }
                let prompt = PROMPTS[i % PROMPTS.len()];
                let mode = ExecutionMode::ALL[i % ExecutionMode::ALL.len()];
                let priority = if i % 10 == 0 { Priority::High } else { Priority::Normal };

                let call = CallSpec::new("gen-api", "complete")
                    .args(&json!({ "prompt": prompt }))
                    .mode(mode)
                    .priority(priority)
                    .timeout(Duration::from_secs(2))
                    .tokens(prompt.len() as u64);

                let upstream = upstream.clone();
                let outcome: Outcome<String> = engine
                    .execute(call, || {
                        let upstream = upstream.clone();
                        async move { upstream.complete(prompt).await }
                    })
                    .await;

                let counter = match outcome {
                    Outcome::Success(_) => &tally.success,
                    Outcome::Degraded { .. } => &tally.degraded,
                    Outcome::Failed(_) => &tally.failed,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    while workers.join_next().await.is_some() {}
    tally
}
