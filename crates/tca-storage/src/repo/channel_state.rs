use rusqlite::{params, Connection, OptionalExtension, Row};
use tca_core::types::ChannelId;

use crate::cursor;
use crate::error::{Result, StorageError};
use crate::model::{ChannelState, Cursor};
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<(ChannelId, String, Option<String>, Option<String>, String)> {
    Ok((
        ChannelId(row.get("channel_id")?),
        row.get("cursor_json")?,
        row.get("paused_until")?,
        row.get("last_success_at")?,
        row.get("updated_at")?,
    ))
}

fn assemble(
    channel_id: ChannelId,
    cursor_json: String,
    paused_until: Option<String>,
    last_success_at: Option<String>,
    updated_at: String,
) -> Result<ChannelState> {
    Ok(ChannelState {
        channel_id,
        cursor: cursor::decode(channel_id, &cursor_json)?,
        paused_until: timefmt::decode_opt(paused_until)?,
        last_success_at: timefmt::decode_opt(last_success_at)?,
        updated_at: timefmt::decode(&updated_at)?,
    })
}

pub fn get(conn: &Connection, channel_id: ChannelId) -> Result<ChannelState> {
    let row = conn
        .query_row(
            "SELECT * FROM channel_state WHERE channel_id = ?1",
            params![channel_id.0],
            from_row,
        )
        .optional()?
        .ok_or(StorageError::NotFound {
            entity: "channel_state",
            id: channel_id.to_string(),
        })?;
    assemble(row.0, row.1, row.2, row.3, row.4)
}

/// Loads state for a batch of channels, skipping channels with no row yet
/// (treated by the scheduler as immediately eligible with no history).
pub fn list_for_channels(conn: &Connection, channel_ids: &[ChannelId]) -> Result<Vec<ChannelState>> {
    let mut out = Vec::with_capacity(channel_ids.len());
    let mut stmt = conn.prepare("SELECT * FROM channel_state WHERE channel_id = ?1")?;
    for id in channel_ids {
        if let Some(row) = stmt.query_row(params![id.0], from_row).optional()? {
            out.push(assemble(row.0, row.1, row.2, row.3, row.4)?);
        }
    }
    Ok(out)
}

pub fn ensure_row(tx: &rusqlite::Transaction<'_>, channel_id: ChannelId, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
    tx.execute(
        "INSERT OR IGNORE INTO channel_state (channel_id, cursor_json, updated_at) VALUES (?1, '{}', ?2)",
        params![channel_id.0, timefmt::encode(now)],
    )?;
    Ok(())
}

pub fn advance_cursor(
    tx: &rusqlite::Transaction<'_>,
    channel_id: ChannelId,
    new_cursor: &Cursor,
    last_success_at: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO channel_state (channel_id, cursor_json, last_success_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(channel_id) DO UPDATE SET
            cursor_json = excluded.cursor_json,
            last_success_at = excluded.last_success_at,
            updated_at = excluded.updated_at",
        params![channel_id.0, cursor::encode(new_cursor), timefmt::encode(last_success_at)],
    )?;
    Ok(())
}

/// Pauses a channel until `paused_until` (used by flood-wait handling).
pub fn set_paused_until(
    tx: &rusqlite::Transaction<'_>,
    channel_id: ChannelId,
    paused_until: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO channel_state (channel_id, cursor_json, paused_until, updated_at)
         VALUES (?1, '{}', ?2, ?3)
         ON CONFLICT(channel_id) DO UPDATE SET
            paused_until = excluded.paused_until,
            updated_at = excluded.updated_at",
        params![channel_id.0, timefmt::encode(paused_until), timefmt::encode(now)],
    )?;
    Ok(())
}
