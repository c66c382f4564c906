//! Periodic background loops bound to the engine's lifetime.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::shutdown::{Shutdown, TaskGroup};

type StopHook = Box<dyn FnOnce() + Send + 'static>;

/// Owns every background loop and stops them together.
///
/// Returned by `ResilienceEngine::start`. Call [`shutdown`](Self::shutdown)
/// to stop; dropping the scheduler aborts the loops without running the stop
/// hooks.
#[derive(Default)]
pub struct BackgroundScheduler {
    shutdown: Shutdown,
    tasks: TaskGroup,
    stop_hooks: Vec<StopHook>,
}

impl fmt::Debug for BackgroundScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundScheduler")
            .field("tasks", &self.tasks.len())
            .field("stop_hooks", &self.stop_hooks.len())
            .finish()
    }
}

impl BackgroundScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `period` until shutdown. The first run is one period
    /// after spawning; a job in progress finishes before the loop exits.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let mut shutdown = self.shutdown.subscribe();

        self.tasks.spawn(name, async move {
            tracing::info!(task = name, interval_ms = period.as_millis() as u64, "Background task starting");

            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        job().await;
                    }
                    _ = shutdown.recv() => {
                        tracing::info!(task = name, "Received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        });
    }

    /// Run `hook` after every loop has stopped.
    pub fn on_stop<F>(&mut self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop_hooks.push(Box::new(hook));
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every loop, wait for all of them, then run the stop hooks.
    pub async fn shutdown(mut self) {
        tracing::info!(tasks = self.tasks.len(), "Stopping background tasks");
        self.shutdown.trigger();
        self.tasks.join_all().await;

        for hook in self.stop_hooks.drain(..) {
            hook();
        }
        tracing::info!("Background tasks stopped");
    }
}
