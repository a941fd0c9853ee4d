//! Retention prune (§4.6): six ordered steps inside one write
//! transaction, run on a schedule separate from the channel-polling
//! scheduler (daily, typically).

use chrono::{DateTime, Duration, Utc};
use tca_dedupe::engine::recompute_representative;
use tca_storage::repo::{cluster, ingest_error, item, raw_message};
use tca_storage::{resolver, Store};
use tracing::info;

use crate::error::Result;

const BATCH_SIZE: u32 = 500;

#[derive(Debug, Default, Clone, Copy)]
pub struct RetentionReport {
    pub raw_messages_deleted: u64,
    pub items_deleted: u64,
    pub clusters_deleted: u64,
    pub orphaned_decisions_deleted: u64,
    pub ingest_errors_deleted: u64,
}

/// Runs the full six-step prune inside a single writer-queue submission.
pub async fn run(store: &Store, now: DateTime<Utc>) -> Result<RetentionReport> {
    let (raw_messages_days, items_days, ingest_errors_days) = {
        let conn = store.read()?;
        (
            resolver::resolve_retention_days(
                &conn,
                "retention.raw_messages_days",
                resolver::RETENTION_RAW_MESSAGES_DAYS,
                false,
            )?,
            resolver::resolve_retention_days(&conn, "retention.items_days", resolver::RETENTION_ITEMS_DAYS, true)?,
            resolver::resolve_retention_days(
                &conn,
                "retention.ingest_errors_days",
                resolver::RETENTION_INGEST_ERRORS_DAYS,
                false,
            )?,
        )
    };

    let report = store
        .writer
        .submit(move |tx| {
            let mut report = RetentionReport::default();

            // Step 1: raw messages, batched oldest-id-first.
            let raw_cutoff = now - Duration::days(raw_messages_days);
            loop {
                let deleted = raw_message::delete_older_than_batch(tx, raw_cutoff, BATCH_SIZE)?;
                report.raw_messages_deleted += deleted.len() as u64;
                if deleted.len() < BATCH_SIZE as usize {
                    break;
                }
            }

            // Step 2: items, batched, accumulating affected cluster ids.
            // `items_days == 0` means retain forever (bypass entirely).
            let mut affected_clusters = std::collections::HashSet::new();
            if items_days > 0 {
                let items_cutoff = now - Duration::days(items_days);
                loop {
                    let (deleted, clusters) = item::delete_older_than_batch(tx, items_cutoff, BATCH_SIZE)?;
                    report.items_deleted += deleted.len() as u64;
                    affected_clusters.extend(clusters);
                    if deleted.len() < BATCH_SIZE as usize {
                        break;
                    }
                }
            }

            // Step 3: recompute representatives for affected clusters.
            for cluster_id in &affected_clusters {
                recompute_representative(tx, tca_core::types::ClusterId(*cluster_id), now)?;
            }

            // Step 4: delete clusters from the affected set with no members left.
            // recompute_representative already deletes empty clusters, but the
            // affected set may include clusters whose emptiness it didn't see
            // (e.g. a cluster with no members at the time of recompute but not
            // caught by that path) — delete_if_empty is idempotent against that.
            let cluster_ids: Vec<_> = affected_clusters.iter().map(|id| tca_core::types::ClusterId(*id)).collect();
            let deleted_clusters = cluster::delete_if_empty(tx, &cluster_ids)?;
            report.clusters_deleted += deleted_clusters.len() as u64;

            // Step 5: orphaned membership/decision rows. Membership rows cascade
            // via foreign keys on item/cluster deletion; only decisions need an
            // explicit sweep.
            report.orphaned_decisions_deleted = cluster::delete_orphaned_decisions(tx)?;

            // Step 6: ingest errors.
            let ingest_errors_cutoff = now - Duration::days(ingest_errors_days);
            report.ingest_errors_deleted = ingest_error::delete_older_than(tx, ingest_errors_cutoff)?;

            Ok(report)
        })
        .await?;

    info!(
        raw_messages_deleted = report.raw_messages_deleted,
        items_deleted = report.items_deleted,
        clusters_deleted = report.clusters_deleted,
        orphaned_decisions_deleted = report.orphaned_decisions_deleted,
        ingest_errors_deleted = report.ingest_errors_deleted,
        "retention prune complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Store {
        let dir = std::env::temp_dir().join(format!("tca-ops-retention-{}", uuid::Uuid::new_v4()));
        Store::open(dir.to_str().unwrap(), 2).unwrap()
    }

    #[tokio::test]
    async fn empty_store_prunes_to_zero() {
        let store = memory_store().await;
        let report = run(&store, Utc::now()).await.unwrap();
        assert_eq!(report.raw_messages_deleted, 0);
        assert_eq!(report.items_deleted, 0);
        store.close().await;
    }

    #[tokio::test]
    async fn items_retention_zero_retains_forever() {
        let store = memory_store().await;
        let now = Utc::now();
        store
            .writer
            .submit(move |tx| {
                tca_storage::repo::setting::set(
                    tx,
                    "retention.items_days",
                    &tca_core::config::SettingValue::Int(0),
                    now,
                )
            })
            .await
            .unwrap();

        let account_id = store
            .writer
            .submit(move |tx| tca_storage::repo::account::create(tx, 1, b"hash", None, 1, now))
            .await
            .unwrap();
        let channel_id = store
            .writer
            .submit(move |tx| tca_storage::repo::channel::create(tx, account_id, None, "100", "chan", None, now))
            .await
            .unwrap();
        let ancient = now - Duration::days(10_000);
        store
            .writer
            .submit(move |tx| {
                tca_storage::repo::item::upsert(
                    tx,
                    tca_storage::repo::item::NewItem {
                        channel_id,
                        upstream_message_id: "1",
                        raw_message_id: None,
                        published_at: None,
                        title: Some("ancient item"),
                        body: None,
                        canonical_url: None,
                        canonical_url_hash: None,
                        content_hash: None,
                    },
                    ancient,
                )
            })
            .await
            .unwrap();

        let report = run(&store, now).await.unwrap();
        assert_eq!(report.items_deleted, 0);
        store.close().await;
    }
}
