//! Schedules the two ops jobs (§4.6) on their own cadence, independent
//! of the channel-polling scheduler: retention prune hourly, nightly backup
//! once every 24h. Structurally the same tick-loop-against-a-`watch`-stop-
//! signal shape as `tca_scheduler::SchedulerEngine` and
//! `tca_ingest::IngestWorker`, generalized here to two distinct cadences
//! tracked independently rather than one shared fixed tick.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tca_storage::Store;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const TICK_INTERVAL: StdDuration = StdDuration::from_secs(60);
const RETENTION_INTERVAL: chrono::Duration = chrono::Duration::hours(1);
const BACKUP_INTERVAL: chrono::Duration = chrono::Duration::hours(24);
const SHUTDOWN_TIMEOUT: StdDuration = StdDuration::from_secs(60);

pub struct OpsLoopHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl OpsLoopHandle {
    pub async fn stop(self) -> bool {
        let _ = self.stop_tx.send(true);
        let abort_handle = self.task.abort_handle();
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(join_err)) => {
                error!("ops loop task panicked: {join_err}");
                false
            }
            Err(_) => {
                warn!("ops loop shutdown exceeded timeout; cancelling task");
                abort_handle.abort();
                false
            }
        }
    }
}

pub struct OpsLoop {
    store: Arc<Store>,
    backup_dir: PathBuf,
    tick_interval: StdDuration,
}

impl OpsLoop {
    pub fn new(store: Arc<Store>, backup_dir: PathBuf) -> Self {
        Self {
            store,
            backup_dir,
            tick_interval: TICK_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, interval: StdDuration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn spawn(self) -> OpsLoopHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let store = self.store;
        let backup_dir = self.backup_dir;
        let tick_interval = self.tick_interval;

        let task = tokio::spawn(async move {
            info!("ops loop started");
            let mut next_retention = Utc::now();
            let mut next_backup = Utc::now();
            let mut interval = tokio::time::interval(tick_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Utc::now();
                        if now >= next_retention {
                            match tca_ops::retention::run(&store, now).await {
                                Ok(report) => info!(?report, "retention prune complete"),
                                Err(e) => error!("retention prune failed: {e}"),
                            }
                            next_retention = now + RETENTION_INTERVAL;
                        }
                        if now >= next_backup {
                            match tca_ops::backup::run(&store, &backup_dir, now, CancellationToken::new()).await {
                                Ok(outcome) => info!(path = %outcome.path.display(), pruned = outcome.pruned, "backup complete"),
                                Err(e) => error!("backup failed: {e}"),
                            }
                            next_backup = now + BACKUP_INTERVAL;
                        }
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            info!("ops loop shutting down");
                            break;
                        }
                    }
                }
            }
        });

        OpsLoopHandle { stop_tx, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Store {
        let dir = std::env::temp_dir().join(format!("tca-app-ops-loop-store-{}", uuid::Uuid::new_v4()));
        Store::open(dir.to_str().unwrap(), 2).unwrap()
    }

    #[tokio::test]
    async fn first_tick_runs_retention_and_backup() {
        let store = Arc::new(memory_store().await);
        let backup_dir = std::env::temp_dir().join(format!("tca-app-ops-loop-backups-{}", uuid::Uuid::new_v4()));

        let handle = OpsLoop::new(store.clone(), backup_dir.clone())
            .with_tick_interval(StdDuration::from_millis(20))
            .spawn();

        tokio::time::sleep(StdDuration::from_millis(100)).await;
        assert!(handle.stop().await);

        let entries: Vec<_> = std::fs::read_dir(&backup_dir).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(entries.len(), 1);

        store.close().await;
        let _ = std::fs::remove_dir_all(&backup_dir);
    }
}
