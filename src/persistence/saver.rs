//! Background snapshot task.

use crate::persistence::save;
use crate::storage::StorageEngine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Configuration for the snapshot saver.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// File the snapshot is written to
    pub path: PathBuf,
    /// Interval between saves (default: 30s)
    pub interval: Duration,
}

impl SnapshotConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: Duration::from_secs(30),
        }
    }
}

/// A handle to the running snapshot saver.
///
/// Dropping the handle stops the task. The final save on shutdown is the
/// caller's job, and must come after [`SnapshotSaver::shutdown`] so that two
/// saves never write the same file.
#[derive(Debug)]
pub struct SnapshotSaver {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SnapshotSaver {
    /// Starts the saver as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(engine: Arc<StorageEngine>, config: SnapshotConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            path = %config.path.display(),
            interval_secs = config.interval.as_secs(),
            "Snapshot saver started"
        );
        let task = tokio::spawn(saver_loop(engine, config, shutdown_rx));

        Self {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Stops the task and waits for it, including a save already in flight.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Snapshot saver task failed");
            }
        }
    }

    pub fn stop(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        debug!("Snapshot saver stopped");
    }
}

impl Drop for SnapshotSaver {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn saver_loop(
    engine: Arc<StorageEngine>,
    config: SnapshotConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    return;
                }
            }
        }

        // Capturing takes the store's read lock; writing the file is kept off
        // the async workers.
        let snapshot = engine.snapshot();
        let path = config.path.clone();
        let keys = snapshot.key_count();

        match tokio::task::spawn_blocking(move || save(&path, &snapshot)).await {
            Ok(Ok(())) => info!(path = %config.path.display(), keys, "Snapshot saved"),
            Ok(Err(e)) => error!(path = %config.path.display(), error = %e, "Snapshot save failed"),
            Err(e) => error!(error = %e, "Snapshot task panicked"),
        }
    }
}
