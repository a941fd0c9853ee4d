//! Nightly backup (§4.6): copy the live store via SQLite's
//! online-backup API, verify the copy, atomically rename it into the
//! backup directory, then enforce the retain-count window.
//!
//! Idempotent per calendar day — the destination filename is derived from
//! `now`'s date, so a retry on the same day just overwrites the previous
//! attempt's temp file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::backup::Backup;
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tca_storage::model::Severity;
use tca_storage::repo::notification;
use tca_storage::{resolver, Store};

use crate::error::{OpsError, Result};

const BACKUP_STEP_PAGES: i32 = 100;

#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub path: PathBuf,
    pub pruned: u64,
}

/// Runs the full backup job. `cancel` is checked around the one long-running
/// step (the online-backup copy); a cancellation there returns
/// `OpsError::Cancelled` directly, never remapped to `BackupFailed`.
pub async fn run(
    store: &Store,
    backup_dir: &Path,
    now: DateTime<Utc>,
    cancel: CancellationToken,
) -> Result<BackupOutcome> {
    std::fs::create_dir_all(backup_dir).map_err(|e| OpsError::BackupFailed {
        reason: format!("create backup dir: {e}"),
    })?;

    let retain_count = {
        let conn = store.read()?;
        resolver::resolve_backup_retain_count(&conn)?
    };

    let final_name = format!("tca-{}.db", now.format("%Y%m%d"));
    let final_path = backup_dir.join(&final_name);
    let tmp_path = backup_dir.join(format!("{final_name}.tmp"));

    let source = store.read()?;
    let copy_path = tmp_path.clone();
    let copy_task = tokio::task::spawn_blocking(move || copy_and_verify(&source, &copy_path));

    let copy_result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(OpsError::Cancelled);
        }
        joined = copy_task => joined.map_err(|_| OpsError::BackupFailed {
            reason: "backup copy task panicked".to_string(),
        })?,
    };

    if let Err(reason) = copy_result {
        let _ = std::fs::remove_file(&tmp_path);
        record_failure(store, &final_path, &reason, now).await;
        return Err(OpsError::BackupFailed { reason });
    }

    if let Err(reason) = std::fs::rename(&tmp_path, &final_path).map_err(|e| format!("rename into place: {e}")) {
        record_failure(store, &final_path, &reason, now).await;
        return Err(OpsError::BackupFailed { reason });
    }

    let pruned = prune_old_backups(backup_dir, retain_count)?;

    info!(path = %final_path.display(), pruned, "backup complete");
    Ok(BackupOutcome { path: final_path, pruned })
}

fn copy_and_verify(source: &Connection, tmp_path: &Path) -> std::result::Result<(), String> {
    let mut dest = Connection::open(tmp_path).map_err(|e| format!("open destination: {e}"))?;
    {
        let backup = Backup::new(source, &mut dest).map_err(|e| format!("start backup: {e}"))?;
        backup
            .run_to_completion(BACKUP_STEP_PAGES, std::time::Duration::from_millis(5), None)
            .map_err(|e| format!("backup copy: {e}"))?;
    }
    let check: String = dest
        .query_row("PRAGMA integrity_check", [], |r| r.get(0))
        .map_err(|e| format!("integrity check: {e}"))?;
    drop(dest);
    if check != "ok" {
        return Err(format!("integrity check reported: {check}"));
    }
    Ok(())
}

/// Deletes the oldest `tca-*.db` files in `backup_dir` beyond `retain_count`,
/// ordered by filename (which sorts chronologically given the YYYYMMDD stem).
fn prune_old_backups(backup_dir: &Path, retain_count: u32) -> Result<u64> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(backup_dir)
        .map_err(|e| OpsError::BackupFailed {
            reason: format!("list backup dir: {e}"),
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("tca-") && n.ends_with(".db"))
        })
        .collect();
    entries.sort();

    let excess = entries.len().saturating_sub(retain_count as usize);
    let mut pruned = 0u64;
    for path in entries.into_iter().take(excess) {
        if std::fs::remove_file(&path).is_ok() {
            pruned += 1;
        } else {
            warn!(path = %path.display(), "failed to prune old backup");
        }
    }
    Ok(pruned)
}

async fn record_failure(store: &Store, backup_path: &Path, reason: &str, now: DateTime<Utc>) {
    let payload = serde_json::json!({
        "backup_path": backup_path.display().to_string(),
        "error_type": "backup_failed",
        "error_message": reason,
        "failed_at": now.to_rfc3339(),
    })
    .to_string();
    let reason = reason.to_string();
    let result = store
        .writer
        .submit(move |tx| {
            notification::create(
                tx,
                "backup_failed",
                Severity::High,
                &format!("nightly backup failed: {reason}"),
                Some(&payload),
                now,
            )
        })
        .await;
    if let Err(e) = result {
        warn!(error = %e, "failed to record backup-failure notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tca_core::config::SettingValue;

    async fn memory_store() -> Store {
        let dir = std::env::temp_dir().join(format!("tca-ops-backup-store-{}", uuid::Uuid::new_v4()));
        Store::open(dir.to_str().unwrap(), 2).unwrap()
    }

    #[tokio::test]
    async fn backup_creates_dated_file_and_passes_integrity_check() {
        let store = memory_store().await;
        let backup_dir = std::env::temp_dir().join(format!("tca-ops-backup-dest-{}", uuid::Uuid::new_v4()));
        let now = Utc::now();

        let outcome = run(&store, &backup_dir, now, CancellationToken::new()).await.unwrap();
        assert!(outcome.path.exists());
        assert_eq!(outcome.path.file_name().unwrap().to_str().unwrap(), format!("tca-{}.db", now.format("%Y%m%d")));

        store.close().await;
        let _ = std::fs::remove_dir_all(&backup_dir);
    }

    #[tokio::test]
    async fn retain_count_prunes_oldest_first() {
        let store = memory_store().await;
        let backup_dir = std::env::temp_dir().join(format!("tca-ops-backup-retain-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&backup_dir).unwrap();

        store
            .writer
            .submit(move |tx| {
                tca_storage::repo::setting::set(tx, "backup.retain_count", &SettingValue::Int(1), Utc::now())
            })
            .await
            .unwrap();

        for day_offset in [2, 1] {
            let day = Utc::now() - chrono::Duration::days(day_offset);
            run(&store, &backup_dir, day, CancellationToken::new()).await.unwrap();
        }

        let remaining: Vec<_> = std::fs::read_dir(&backup_dir).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(remaining.len(), 1);

        store.close().await;
        let _ = std::fs::remove_dir_all(&backup_dir);
    }

    #[tokio::test]
    async fn cancellation_propagates_unchanged() {
        let store = memory_store().await;
        let backup_dir = std::env::temp_dir().join(format!("tca-ops-backup-cancel-{}", uuid::Uuid::new_v4()));
        let token = CancellationToken::new();
        token.cancel();

        let result = run(&store, &backup_dir, Utc::now(), token).await;
        assert!(matches!(result, Err(OpsError::Cancelled)));

        store.close().await;
        let _ = std::fs::remove_dir_all(&backup_dir);
    }
}
