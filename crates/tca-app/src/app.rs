//! Central lifecycle container (§4.8): one struct holding the resolved
//! config and every live subsystem handle, constructed once at startup
//! and threaded by `Arc` to every collaborator.

use std::sync::Arc;

use chrono::Utc;
use tca_auth::{AuthGate, Kek};
use tca_core::config::TcaConfig;
use tca_dedupe::DedupeEngine;
use tca_ingest::{ClientRegistry, IngestWorker, WorkerHandle};
use tca_scheduler::{SchedulerEngine, SchedulerHandle};
use tca_storage::Store;
use tracing::info;

use crate::ops_loop::{OpsLoop, OpsLoopHandle};

/// Holds the resolved static config and every live subsystem handle,
/// constructed once at startup and threaded by `Arc` to every collaborator.
pub struct AppState {
    pub config: TcaConfig,
    pub store: Arc<Store>,
    pub auth: Arc<AuthGate>,
    pub registry: Arc<ClientRegistry>,
    pub dedupe: Arc<DedupeEngine>,
}

impl AppState {
    /// Runs every startup step that must complete before the scheduler,
    /// ingest worker, or ops loop are allowed to run (§4.4: "the
    /// scheduler must never run if the preceding startup steps... have not
    /// completed"): migrations (via `Store::open`), settings seed, auth
    /// unlock, bootstrap token.
    pub async fn bootstrap(config: TcaConfig) -> anyhow::Result<Arc<Self>> {
        if let Some(parent) = std::path::Path::new(&config.store.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&config.store.backup_dir)?;

        let store = Store::open(&config.store.path, config.store.read_pool_size)?;
        let now = Utc::now();
        let seeded = store.writer.submit(move |tx| tca_storage::resolver::seed_defaults(tx, now)).await?;
        info!(seeded, "settings defaults seeded");

        let auth = tca_auth::startup_unlock(config.mode, config.secret_file.as_deref())?;

        let bootstrap_path = bootstrap_token_path(&config);
        let bootstrap_path_for_writer = bootstrap_path.clone();
        let generated = store
            .writer
            .submit(move |tx| {
                tca_auth::bootstrap::ensure_bootstrap_token(tx, &bootstrap_path_for_writer, Utc::now()).map_err(|e| match e {
                    tca_auth::AuthError::Storage(se) => se,
                    other => tca_storage::StorageError::Internal(other.to_string()),
                })
            })
            .await?;
        if generated {
            info!(path = %bootstrap_path, "bootstrap bearer token generated");
        }

        let title_similarity_threshold = {
            let conn = store.read()?;
            tca_storage::resolver::resolve_title_similarity_threshold(&conn)?
        };

        Ok(Arc::new(Self {
            config,
            store: Arc::new(store),
            auth: Arc::new(auth),
            registry: Arc::new(ClientRegistry::new()),
            dedupe: Arc::new(DedupeEngine::new(title_similarity_threshold)),
        }))
    }

    /// Unlocks the gate explicitly, for interactive mode's passphrase flow.
    /// Out of scope here is *how* the passphrase reaches this call (that is
    /// the HTTP collaborator's job); this just exposes the mechanism.
    pub fn unlock(&self, kek: Kek) {
        self.auth.unlock(kek);
    }
}

/// Written alongside the store file so both startup artifacts land under
/// the same configured directory rather than a hardcoded home-dir path.
fn bootstrap_token_path(config: &TcaConfig) -> String {
    let dir = std::path::Path::new(&config.store.path)
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."));
    dir.join("bootstrap_token").to_string_lossy().into_owned()
}

/// Spawns the scheduler, ingest worker, and ops loop. Returns the three
/// handles the caller needs to run the graceful-shutdown sequence.
pub fn spawn_background_work(state: &Arc<AppState>) -> (SchedulerHandle, WorkerHandle, OpsLoopHandle) {
    let scheduler = SchedulerEngine::new(state.store.clone()).spawn();
    let worker = IngestWorker::new(state.store.clone(), state.registry.clone(), state.dedupe.clone()).spawn();
    let ops = OpsLoop::new(state.store.clone(), state.config.store.backup_dir.clone().into()).spawn();
    (scheduler, worker, ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tca_core::config::UnlockMode;

    fn test_config(dir: &std::path::Path) -> TcaConfig {
        TcaConfig {
            store: tca_core::config::StoreConfig {
                path: dir.join("tca.db").to_string_lossy().into_owned(),
                backup_dir: dir.join("backups").to_string_lossy().into_owned(),
                read_pool_size: 2,
            },
            bind: "127.0.0.1:8733".to_string(),
            mode: UnlockMode::Interactive,
            secret_file: None,
            log_level: Default::default(),
        }
    }

    #[tokio::test]
    async fn bootstrap_seeds_settings_and_writes_token_once() {
        let dir = std::env::temp_dir().join(format!("tca-app-bootstrap-{}", uuid::Uuid::new_v4()));
        let config = test_config(&dir);
        let token_path = bootstrap_token_path(&config);

        let state = AppState::bootstrap(config).await.unwrap();
        assert!(std::path::Path::new(&token_path).exists());
        assert!(!state.auth.is_unlocked());

        let second_config = test_config(&dir);
        let state2 = AppState::bootstrap(second_config).await.unwrap();
        let contents_after_second_boot = std::fs::read_to_string(&token_path).unwrap();

        state.store.close().await;
        state2.store.close().await;
        let _ = std::fs::remove_dir_all(&dir);
        assert!(!contents_after_second_boot.is_empty());
    }

    #[tokio::test]
    async fn background_work_spawns_and_stops_cleanly() {
        let dir = std::env::temp_dir().join(format!("tca-app-spawn-{}", uuid::Uuid::new_v4()));
        let config = test_config(&dir);
        let state = AppState::bootstrap(config).await.unwrap();

        let (scheduler, worker, ops) = spawn_background_work(&state);
        assert!(scheduler.stop().await.is_ok());
        assert!(worker.stop().await);
        assert!(ops.stop().await);

        state.store.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
