use rusqlite::{params, Connection, OptionalExtension, Row};
use tca_core::types::{ChannelId, RawMessageId};

use crate::error::{Result, StorageError};
use crate::model::RawMessage;
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<RawMessage> {
    Ok(RawMessage {
        id: RawMessageId(row.get("id")?),
        channel_id: ChannelId(row.get("channel_id")?),
        upstream_message_id: row.get("upstream_message_id")?,
        payload_json: row.get("payload_json")?,
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
    })
}

pub fn get(conn: &Connection, id: RawMessageId) -> Result<RawMessage> {
    conn.query_row("SELECT * FROM raw_messages WHERE id = ?1", params![id.0], from_row)
        .optional()?
        .ok_or(StorageError::NotFound {
            entity: "raw_message",
            id: id.to_string(),
        })
}

/// Upserts the raw payload by `(channel_id, upstream_message_id)`, the key
/// the normalize step re-derives items from.
pub fn upsert(
    tx: &rusqlite::Transaction<'_>,
    channel_id: ChannelId,
    upstream_message_id: &str,
    payload_json: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<RawMessageId> {
    tx.execute(
        "INSERT INTO raw_messages (channel_id, upstream_message_id, payload_json, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(channel_id, upstream_message_id) DO UPDATE SET
            payload_json = excluded.payload_json",
        params![channel_id.0, upstream_message_id, payload_json, timefmt::encode(now)],
    )?;
    let id: i64 = tx.query_row(
        "SELECT id FROM raw_messages WHERE channel_id = ?1 AND upstream_message_id = ?2",
        params![channel_id.0, upstream_message_id],
        |r| r.get(0),
    )?;
    Ok(RawMessageId(id))
}

/// Deletes raw-message rows older than `cutoff`, oldest id first, capped at
/// `batch_size`. Returns the ids actually deleted so callers can keep
/// batching until a call returns fewer than `batch_size` rows.
pub fn delete_older_than_batch(
    tx: &rusqlite::Transaction<'_>,
    cutoff: chrono::DateTime<chrono::Utc>,
    batch_size: u32,
) -> Result<Vec<RawMessageId>> {
    let mut stmt = tx.prepare(
        "SELECT id FROM raw_messages WHERE created_at < ?1 ORDER BY id ASC LIMIT ?2",
    )?;
    let ids: Vec<i64> = stmt
        .query_map(params![timefmt::encode(cutoff), batch_size], |r| r.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    tx.execute(
        &format!("DELETE FROM raw_messages WHERE id IN ({placeholders})"),
        rusqlite::params_from_iter(ids.iter()),
    )?;
    Ok(ids.into_iter().map(RawMessageId).collect())
}
