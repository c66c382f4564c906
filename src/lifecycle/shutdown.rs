//! Shutdown coordination for background work.

use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Named tasks that are always awaited together.
///
/// Dropping the group aborts whatever is still running.
#[derive(Debug, Default)]
pub struct TaskGroup {
    set: JoinSet<&'static str>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.set.spawn(async move {
            task.await;
            name
        });
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Wait for every task to finish. Panics are logged, not propagated.
    pub async fn join_all(&mut self) {
        while let Some(joined) = self.set.join_next().await {
            match joined {
                Ok(name) => tracing::debug!(task = name, "Background task finished"),
                Err(e) if e.is_panic() => tracing::error!(error = %e, "Background task panicked"),
                Err(e) => tracing::warn!(error = %e, "Background task cancelled"),
            }
        }
    }
}
