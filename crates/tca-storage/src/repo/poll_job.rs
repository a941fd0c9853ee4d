use rusqlite::{params, Connection, Row};
use tca_core::types::{ChannelId, CorrelationId, PollJobId};

use crate::error::Result;
use crate::model::PollJob;
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<PollJob> {
    Ok(PollJob {
        id: PollJobId(row.get("id")?),
        channel_id: ChannelId(row.get("channel_id")?),
        correlation_id: row.get("correlation_id")?,
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
    })
}

/// Lists the oldest pending poll jobs, ascending by id — this is what
/// preserves per-channel FIFO ordering relative to scheduler enqueue order
/// (§5), since jobs are never reordered after insertion.
pub fn list_pending(conn: &Connection, limit: u32) -> Result<Vec<PollJob>> {
    let mut stmt = conn.prepare("SELECT * FROM poll_jobs ORDER BY id ASC LIMIT ?1")?;
    let rows = stmt.query_map(params![limit], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn enqueue(
    tx: &rusqlite::Transaction<'_>,
    channel_id: ChannelId,
    correlation_id: &CorrelationId,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<PollJobId> {
    tx.execute(
        "INSERT INTO poll_jobs (channel_id, correlation_id, created_at) VALUES (?1, ?2, ?3)",
        params![channel_id.0, correlation_id.as_str(), timefmt::encode(now)],
    )?;
    Ok(PollJobId(tx.last_insert_rowid()))
}

pub fn delete(tx: &rusqlite::Transaction<'_>, id: PollJobId) -> Result<()> {
    tx.execute("DELETE FROM poll_jobs WHERE id = ?1", params![id.0])?;
    Ok(())
}
