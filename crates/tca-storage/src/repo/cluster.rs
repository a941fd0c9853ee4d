use rusqlite::{params, Connection, OptionalExtension, Row};
use tca_core::types::{ClusterId, ItemId};

use crate::error::{Result, StorageError};
use crate::model::Cluster;
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Cluster> {
    Ok(Cluster {
        id: ClusterId(row.get("id")?),
        cluster_key: row.get("cluster_key")?,
        representative_item_id: row.get::<_, Option<i64>>("representative_item_id")?.map(ItemId),
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
        updated_at: timefmt::decode(&row.get::<_, String>("updated_at")?)?,
    })
}

pub fn get(conn: &Connection, id: ClusterId) -> Result<Cluster> {
    conn.query_row("SELECT * FROM clusters WHERE id = ?1", params![id.0], from_row)
        .optional()?
        .ok_or(StorageError::NotFound {
            entity: "cluster",
            id: id.to_string(),
        })
}

pub fn get_many(conn: &Connection, ids: &[ClusterId]) -> Result<Vec<Cluster>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("SELECT * FROM clusters WHERE id IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter().map(|i| i.0)), from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Looks up the cluster(s) a set of items currently belong to, for merge
/// detection in the dedupe engine.
pub fn clusters_for_items(conn: &Connection, item_ids: &[ItemId]) -> Result<Vec<ClusterId>> {
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = item_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT DISTINCT cluster_id FROM members WHERE item_id IN ({placeholders}) ORDER BY cluster_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(item_ids.iter().map(|i| i.0)), |r| {
        r.get::<_, i64>(0)
    })?;
    Ok(rows
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(ClusterId)
        .collect())
}

pub fn create(
    tx: &rusqlite::Transaction<'_>,
    cluster_key: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<ClusterId> {
    tx.execute(
        "INSERT INTO clusters (cluster_key, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![cluster_key, timefmt::encode(now)],
    )
    .map_err(|e| StorageError::from_unique_violation(e, "cluster", cluster_key))?;
    Ok(ClusterId(tx.last_insert_rowid()))
}

pub fn set_representative(
    tx: &rusqlite::Transaction<'_>,
    cluster_id: ClusterId,
    representative_item_id: Option<ItemId>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "UPDATE clusters SET representative_item_id = ?2, updated_at = ?3 WHERE id = ?1",
        params![cluster_id.0, representative_item_id.map(|i| i.0), timefmt::encode(now)],
    )?;
    Ok(())
}

pub fn delete(tx: &rusqlite::Transaction<'_>, cluster_id: ClusterId) -> Result<()> {
    tx.execute("DELETE FROM clusters WHERE id = ?1", params![cluster_id.0])?;
    Ok(())
}

/// Deletes clusters from `candidate_ids` that now have zero members. Used by
/// both dedupe merges and the retention prune job.
pub fn delete_if_empty(tx: &rusqlite::Transaction<'_>, candidate_ids: &[ClusterId]) -> Result<Vec<ClusterId>> {
    let mut deleted = Vec::new();
    for id in candidate_ids {
        let member_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM members WHERE cluster_id = ?1",
            params![id.0],
            |r| r.get(0),
        )?;
        if member_count == 0 {
            tx.execute("DELETE FROM clusters WHERE id = ?1", params![id.0])?;
            deleted.push(*id);
        }
    }
    Ok(deleted)
}

/// Deletes decision rows whose `item_id` no longer resolves (orphaned by a
/// retention prune). Membership rows are cleaned up via `ON DELETE CASCADE`
/// on the `items`/`clusters` foreign keys, so only decisions need an
/// explicit sweep (their foreign keys are not cascading, since the trace
/// must be able to outlive the item it was recorded against in principle —
/// but the prune job's contract requires removing truly orphaned rows).
pub fn delete_orphaned_decisions(tx: &rusqlite::Transaction<'_>) -> Result<u64> {
    let n = tx.execute(
        "DELETE FROM decisions WHERE item_id NOT IN (SELECT id FROM items)",
        [],
    )?;
    Ok(n as u64)
}
