//! Graceful shutdown sequence (§4.6): stop scheduler, drain the writer
//! queue, disconnect upstream clients, then tear down auth. A fixed,
//! ordered sequence of independent steps, each reported rather than
//! allowed to abort the rest.

use std::sync::Arc;

use tca_ingest::WorkerHandle;
use tca_scheduler::SchedulerHandle;
use tca_telegram::UpstreamClient;
use tracing::info;

use crate::app::AppState;
use crate::ops_loop::OpsLoopHandle;

/// Runs the shutdown sequence and returns a human-readable report: collect
/// one line per step, never let one step's failure skip the rest.
pub async fn execute_shutdown(
    state: &Arc<AppState>,
    scheduler: SchedulerHandle,
    worker: WorkerHandle,
    ops: OpsLoopHandle,
) -> String {
    let mut lines = Vec::new();

    match scheduler.stop().await {
        Ok(()) => lines.push("- scheduler stopped".to_string()),
        Err(e) => lines.push(format!("- scheduler stop exceeded timeout: {e}")),
    }

    if worker.stop().await {
        lines.push("- ingest worker stopped".to_string());
    } else {
        lines.push("- ingest worker stop exceeded timeout".to_string());
    }

    if ops.stop().await {
        lines.push("- ops loop stopped".to_string());
    } else {
        lines.push("- ops loop stop exceeded timeout".to_string());
    }

    state.store.close().await;
    lines.push("- writer queue drained".to_string());

    let accounts = {
        match state.store.read() {
            Ok(conn) => tca_storage::repo::account::list(&conn).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    };
    let mut disconnected = 0usize;
    for account in accounts {
        if let Some(client) = state.registry.remove(account.id) {
            let mut guard = client.lock().await;
            if guard.disconnect().await.is_ok() {
                disconnected += 1;
            }
        }
    }
    lines.push(format!("- {disconnected} upstream client(s) disconnected"));

    state.auth.lock();
    lines.push("- auth gate locked".to_string());

    let report = format!("shutdown complete:\n{}", lines.join("\n"));
    info!("{report}");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppState;
    use tca_core::config::{StoreConfig, TcaConfig, UnlockMode};
    use tca_storage::repo::account;
    use tca_telegram::mock::MockUpstreamClient;

    async fn bootstrapped(dir: &std::path::Path) -> Arc<AppState> {
        let config = TcaConfig {
            store: StoreConfig {
                path: dir.join("tca.db").to_string_lossy().into_owned(),
                backup_dir: dir.join("backups").to_string_lossy().into_owned(),
                read_pool_size: 2,
            },
            bind: "127.0.0.1:8733".to_string(),
            mode: UnlockMode::Interactive,
            secret_file: None,
            log_level: Default::default(),
        };
        AppState::bootstrap(config).await.unwrap()
    }

    #[tokio::test]
    async fn shutdown_disconnects_registered_clients_and_locks_auth() {
        let dir = std::env::temp_dir().join(format!("tca-app-shutdown-{}", uuid::Uuid::new_v4()));
        let state = bootstrapped(&dir).await;

        let now = chrono::Utc::now();
        let account_id = state
            .store
            .writer
            .submit(move |tx| account::create(tx, 1, b"hash", None, 1, now))
            .await
            .unwrap();

        let mut client = MockUpstreamClient::new();
        client.connect().await.unwrap();
        state.registry.insert(account_id, Box::new(client));
        state.auth.unlock(tca_auth::Kek::from_bytes([7u8; 32]));

        let (scheduler, worker, ops) = crate::app::spawn_background_work(&state);
        let report = execute_shutdown(&state, scheduler, worker, ops).await;

        assert!(report.contains("1 upstream client(s) disconnected"));
        assert!(!state.auth.is_unlocked());
        assert!(state.registry.get(account_id).is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
