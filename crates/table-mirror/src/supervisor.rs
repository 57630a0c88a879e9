//! Background task ownership for sync engines.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::engine::SyncEngine;

/// Runs each engine on its own task and stops them together.
///
/// Engines only observe the shutdown signal between cycles, so `shutdown`
/// waits for any in-flight cycle to finish.
pub struct MirrorSupervisor {
    tasks: Vec<(String, JoinHandle<()>)>,
    shutdown: CancellationToken,
}

impl MirrorSupervisor {
    /// Spawn one background task per engine.
    pub fn spawn_all(engines: Vec<Arc<SyncEngine>>) -> Self {
        let shutdown = CancellationToken::new();
        let mut tasks = Vec::with_capacity(engines.len());

        for engine in engines {
            let label = engine.label().to_owned();
            let task_shutdown = shutdown.clone();

            info!(mirror = %label, "spawning_mirror");
            let handle = tokio::spawn(async move { engine.run(task_shutdown).await });
            tasks.push((label, handle));
        }

        Self { tasks, shutdown }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Token that stops every engine when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signal every engine to stop and wait for them to finish.
    pub async fn shutdown(self) {
        info!(mirrors = self.tasks.len(), "stopping_mirrors");
        self.shutdown.cancel();
        self.join().await;
    }

    /// Wait for every engine task to end. Engines only end once the
    /// shutdown token is cancelled.
    pub async fn join(self) {
        for (label, handle) in self.tasks {
            if let Err(err) = handle.await {
                error!(mirror = %label, error = %err, "mirror_task_panicked");
            }
        }
    }
}
