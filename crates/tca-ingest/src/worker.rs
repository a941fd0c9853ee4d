//! The FIFO poll-job consumer. Structurally the same tick-loop-against-a-
//! `watch`-stop-signal shape as `tca_scheduler::SchedulerEngine` — the
//! scheduler writes `poll_jobs` rows, this drains them in arrival order.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tca_dedupe::DedupeEngine;
use tca_storage::repo::poll_job;
use tca_storage::Store;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::pipeline;
use crate::registry::ClientRegistry;

const DEFAULT_TICK_INTERVAL: StdDuration = StdDuration::from_secs(1);
const DEFAULT_BATCH_SIZE: u32 = 20;
const DEFAULT_SHUTDOWN_TIMEOUT: StdDuration = StdDuration::from_secs(30);

pub struct WorkerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    shutdown_timeout: StdDuration,
}

impl WorkerHandle {
    /// Sets the stop signal and awaits the loop task, bounded by
    /// `shutdown_timeout`. In-flight jobs are allowed to finish; no new
    /// batch is started once the signal is observed.
    pub async fn stop(self) -> bool {
        let _ = self.stop_tx.send(true);
        let abort_handle = self.task.abort_handle();
        match tokio::time::timeout(self.shutdown_timeout, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(join_err)) => {
                error!("ingest worker task panicked: {join_err}");
                false
            }
            Err(_) => {
                warn!("ingest worker shutdown exceeded timeout; cancelling task");
                abort_handle.abort();
                false
            }
        }
    }
}

/// Drains pending poll jobs against the configured client registry and
/// dedupe engine. Holds no upstream connections of its own.
pub struct IngestWorker {
    store: Arc<Store>,
    registry: Arc<ClientRegistry>,
    dedupe: Arc<DedupeEngine>,
    tick_interval: StdDuration,
    batch_size: u32,
    shutdown_timeout: StdDuration,
}

impl IngestWorker {
    pub fn new(store: Arc<Store>, registry: Arc<ClientRegistry>, dedupe: Arc<DedupeEngine>) -> Self {
        Self {
            store,
            registry,
            dedupe,
            tick_interval: DEFAULT_TICK_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_tick_interval(mut self, interval: StdDuration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: StdDuration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn spawn(self) -> WorkerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let shutdown_timeout = self.shutdown_timeout;
        let tick_interval = self.tick_interval;
        let batch_size = self.batch_size;
        let store = self.store;
        let registry = self.registry;
        let dedupe = self.dedupe;

        let task = tokio::spawn(async move {
            info!("ingest worker started");
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = run_batch(&store, &registry, &dedupe, batch_size).await {
                            error!("ingest worker batch error: {e}");
                        }
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            info!("ingest worker shutting down");
                            break;
                        }
                    }
                }
            }
        });

        WorkerHandle {
            stop_tx,
            task,
            shutdown_timeout,
        }
    }
}

async fn run_batch(store: &Store, registry: &ClientRegistry, dedupe: &Arc<DedupeEngine>, batch_size: u32) -> tca_storage::Result<()> {
    let jobs = {
        let conn = store.read()?;
        poll_job::list_pending(&conn, batch_size)?
    };
    for job in jobs {
        if let Err(e) = pipeline::process_job(store, registry, dedupe, job).await {
            error!("poll job failed: {e}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tca_core::types::CorrelationId;
    use tca_storage::repo::{account, channel};
    use tca_telegram::client::{FetchPage, UpstreamMessage};
    use tca_telegram::mock::MockUpstreamClient;
    use tca_telegram::UpstreamClient;

    #[tokio::test]
    async fn drains_pending_jobs_within_one_tick() {
        let dir = std::env::temp_dir().join(format!("tca-ingest-worker-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(Store::open(dir.to_str().unwrap(), 2).unwrap());
        let now = Utc::now();

        let account_id = store.writer.submit(move |tx| account::create(tx, 1, b"hash", None, 1, now)).await.unwrap();
        let channel_id = store
            .writer
            .submit(move |tx| channel::create(tx, account_id, None, "100", "chan", None, now))
            .await
            .unwrap();
        let correlation_id = CorrelationId::new();
        store.writer.submit(move |tx| tca_storage::repo::poll_job::enqueue(tx, channel_id, &correlation_id, now)).await.unwrap();

        let mut client = MockUpstreamClient::new().queue_page(FetchPage {
            messages: vec![UpstreamMessage {
                upstream_message_id: "m1".into(),
                payload_json: r#"{"title":"Hello"}"#.into(),
                published_at: Some(now),
            }],
            last_message_id: Some(1),
            next_offset_id: None,
            has_more: false,
        });
        client.connect().await.unwrap();
        let registry = Arc::new(ClientRegistry::new());
        registry.insert(account_id, Box::new(client));

        let dedupe = Arc::new(tca_dedupe::DedupeEngine::new(0.92));
        run_batch(&store, &registry, &dedupe, 20).await.unwrap();

        let conn = store.read().unwrap();
        let pending = tca_storage::repo::poll_job::list_pending(&conn, 10).unwrap();
        assert!(pending.is_empty());
        drop(conn);
        store.close().await;
    }

    #[tokio::test]
    async fn spawned_worker_stops_within_timeout() {
        let dir = std::env::temp_dir().join(format!("tca-ingest-worker-stop-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(Store::open(dir.to_str().unwrap(), 2).unwrap());
        let registry = Arc::new(ClientRegistry::new());
        let dedupe = Arc::new(tca_dedupe::DedupeEngine::new(0.92));

        let worker = IngestWorker::new(store.clone(), registry, dedupe)
            .with_tick_interval(StdDuration::from_millis(20))
            .with_shutdown_timeout(StdDuration::from_secs(5));
        let handle = worker.spawn();
        assert!(handle.stop().await);
        store.close().await;
    }
}
