use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tca_core::types::CorrelationId;
use tca_storage::repo::{channel, channel_state, poll_job};
use tca_storage::{resolver, Store};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::jitter::{JitterSource, RandJitter};
use crate::schedule::is_due;
use crate::{Result, SchedulerError};

/// How long `shutdown` gives an in-flight tick to finish before it gives up
/// and cancels the task outright (§4.4: "a hung tick must not exceed a
/// configured shutdown-timeout").
const DEFAULT_SHUTDOWN_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Handle retained by the caller to stop the scheduler and wait for it to
/// finish: set the signal, then join the task under a bounded timeout.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    shutdown_timeout: StdDuration,
}

impl SchedulerHandle {
    /// Sets the stop signal and awaits the loop task, bounded by
    /// `shutdown_timeout`. A timed-out task is left to finish in the
    /// background; teardown proceeds regardless (§4.4/§4.7).
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(true);
        let abort_handle = self.task.abort_handle();
        match tokio::time::timeout(self.shutdown_timeout, self.task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(join_err)) => {
                error!("scheduler task panicked: {join_err}");
                Err(SchedulerError::ShutdownTimeout)
            }
            Err(_) => {
                warn!("scheduler shutdown exceeded timeout; cancelling task");
                abort_handle.abort();
                Err(SchedulerError::ShutdownTimeout)
            }
        }
    }
}

/// Periodically selects eligible channels and enqueues poll jobs (§4.4).
/// Holds no upstream client or dedupe state — consuming poll jobs
/// is `tca-ingest`'s job, not the scheduler's.
pub struct SchedulerEngine {
    store: Arc<Store>,
    tick_interval: StdDuration,
    shutdown_timeout: StdDuration,
    jitter: Box<dyn JitterSource>,
}

impl SchedulerEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            tick_interval: StdDuration::from_secs(1),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            jitter: Box::new(RandJitter::from_entropy()),
        }
    }

    pub fn with_tick_interval(mut self, interval: StdDuration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: StdDuration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_jitter_source(mut self, jitter: Box<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Spawns the tick loop and returns a handle to stop it. The loop never
    /// runs until this is called explicitly by startup (§4.4: "the
    /// scheduler must never run if the preceding startup steps... have not
    /// completed").
    pub fn spawn(mut self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let shutdown_timeout = self.shutdown_timeout;
        let tick_interval = self.tick_interval;

        let task = tokio::spawn(async move {
            info!("scheduler engine started");
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.tick().await {
                            error!("scheduler tick error: {e}");
                        }
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            info!("scheduler engine shutting down");
                            break;
                        }
                    }
                }
            }
        });

        SchedulerHandle {
            stop_tx,
            task,
            shutdown_timeout,
        }
    }

    /// One scheduling pass: list schedulable channels, load their polling
    /// state, and enqueue a poll job for every channel that is due (§4.4).
    async fn tick(&mut self) -> Result<()> {
        let now = Utc::now();

        let (channels, poll_interval_seconds, jitter_ratio) = {
            let conn = self.store.read()?;
            let channels = channel::list_schedulable(&conn)?;
            let poll_interval_seconds = resolver::resolve_poll_interval_seconds(&conn)?;
            let jitter_ratio = resolver::resolve_jitter_ratio(&conn)?;
            (channels, poll_interval_seconds, jitter_ratio)
        };

        if channels.is_empty() {
            return Ok(());
        }

        let channel_ids: Vec<_> = channels.iter().map(|c| c.id).collect();
        let states = {
            let conn = self.store.read()?;
            channel_state::list_for_channels(&conn, &channel_ids)?
        };

        let mut due_channel_ids = Vec::new();
        for &channel_id in &channel_ids {
            let state = states.iter().find(|s| s.channel_id == channel_id);
            let jitter_seconds = self.jitter.next_jitter_seconds(poll_interval_seconds, jitter_ratio);
            if is_due(state, poll_interval_seconds, jitter_seconds, now) {
                due_channel_ids.push(channel_id);
            }
        }

        if due_channel_ids.is_empty() {
            return Ok(());
        }

        debug!(count = due_channel_ids.len(), "channels due for polling");

        for channel_id in due_channel_ids {
            let correlation_id = CorrelationId::new();
            let result = self
                .store
                .writer
                .submit(move |tx| poll_job::enqueue(tx, channel_id, &correlation_id, now))
                .await;
            if let Err(e) = result {
                error!(%channel_id, "failed to enqueue poll job: {e}");
            }
        }

        Ok(())
    }
}
