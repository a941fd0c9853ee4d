use rusqlite::{params, OptionalExtension};
use tca_core::types::{ClusterId, ItemId};

use crate::error::Result;
use crate::timefmt;

/// Idempotent membership insertion — repeated assignment does not duplicate
/// rows (§4.5 step 4).
pub fn add(
    tx: &rusqlite::Transaction<'_>,
    cluster_id: ClusterId,
    item_id: ItemId,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT OR IGNORE INTO members (cluster_id, item_id, created_at) VALUES (?1, ?2, ?3)",
        params![cluster_id.0, item_id.0, timefmt::encode(now)],
    )?;
    Ok(())
}

pub fn list_items(tx: &rusqlite::Transaction<'_>, cluster_id: ClusterId) -> Result<Vec<ItemId>> {
    let mut stmt = tx.prepare("SELECT item_id FROM members WHERE cluster_id = ?1 ORDER BY item_id ASC")?;
    let rows = stmt.query_map(params![cluster_id.0], |r| r.get::<_, i64>(0))?;
    Ok(rows
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(ItemId)
        .collect())
}

/// Moves every membership row from `source` to `target`, used by cluster
/// merges. Idempotent with respect to the `(cluster_id, item_id)` primary
/// key — an item already in `target` is left alone.
pub fn move_all(tx: &rusqlite::Transaction<'_>, source: ClusterId, target: ClusterId) -> Result<()> {
    tx.execute(
        "INSERT OR IGNORE INTO members (cluster_id, item_id, created_at)
         SELECT ?2, item_id, created_at FROM members WHERE cluster_id = ?1",
        params![source.0, target.0],
    )?;
    tx.execute("DELETE FROM members WHERE cluster_id = ?1", params![source.0])?;
    Ok(())
}

pub fn cluster_for_item(conn: &rusqlite::Connection, item_id: ItemId) -> Result<Option<ClusterId>> {
    Ok(conn
        .query_row(
            "SELECT cluster_id FROM members WHERE item_id = ?1",
            params![item_id.0],
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(crate::error::StorageError::from)?
        .map(ClusterId))
}
