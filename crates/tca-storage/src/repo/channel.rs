use rusqlite::{params, Connection, OptionalExtension, Row};
use tca_core::types::{AccountId, ChannelId, GroupId};

use crate::error::{Result, StorageError};
use crate::model::Channel;
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: ChannelId(row.get("id")?),
        account_id: AccountId(row.get("account_id")?),
        group_id: row.get::<_, Option<i64>>("group_id")?.map(GroupId),
        upstream_channel_id: row.get("upstream_channel_id")?,
        name: row.get("name")?,
        username: row.get("username")?,
        is_enabled: row.get::<_, i64>("is_enabled")? != 0,
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
        updated_at: timefmt::decode(&row.get::<_, String>("updated_at")?)?,
    })
}

pub fn get(conn: &Connection, id: ChannelId) -> Result<Channel> {
    conn.query_row("SELECT * FROM channels WHERE id = ?1", params![id.0], from_row)
        .optional()?
        .ok_or(StorageError::NotFound {
            entity: "channel",
            id: id.to_string(),
        })
}

pub fn list(conn: &Connection) -> Result<Vec<Channel>> {
    let mut stmt = conn.prepare("SELECT * FROM channels ORDER BY id ASC")?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Channels eligible for scheduling per §4.4 step 1: enabled and owned
/// by an account that is not paused.
pub fn list_schedulable(conn: &Connection) -> Result<Vec<Channel>> {
    let mut stmt = conn.prepare(
        "SELECT c.* FROM channels c
         JOIN accounts a ON a.id = c.account_id
         WHERE c.is_enabled = 1 AND a.paused_at IS NULL
         ORDER BY c.id ASC",
    )?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn create(
    tx: &rusqlite::Transaction<'_>,
    account_id: AccountId,
    group_id: Option<GroupId>,
    upstream_channel_id: &str,
    name: &str,
    username: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<ChannelId> {
    tx.execute(
        "INSERT INTO channels (account_id, group_id, upstream_channel_id, name, username, is_enabled, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        params![account_id.0, group_id.map(|g| g.0), upstream_channel_id, name, username, timefmt::encode(now)],
    )
    .map_err(|e| StorageError::from_unique_violation(e, "channel", upstream_channel_id))?;
    Ok(ChannelId(tx.last_insert_rowid()))
}

/// Assigns a channel to a group. A channel belongs to at most one group, so
/// this is a plain update — the uniqueness this enforces is per-channel,
/// not cross-channel, and is surfaced as `ChannelAlreadyInGroup` only when
/// the caller explicitly asks not to overwrite (see `reassign: false`).
pub fn assign_group(
    tx: &rusqlite::Transaction<'_>,
    channel_id: ChannelId,
    group_id: GroupId,
    reassign: bool,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    if !reassign {
        let existing: Option<i64> = tx.query_row(
            "SELECT group_id FROM channels WHERE id = ?1",
            params![channel_id.0],
            |r| r.get(0),
        )?;
        if existing.is_some() {
            return Err(StorageError::ChannelAlreadyInGroup {
                channel_id: channel_id.0,
            });
        }
    }
    tx.execute(
        "UPDATE channels SET group_id = ?2, updated_at = ?3 WHERE id = ?1",
        params![channel_id.0, group_id.0, timefmt::encode(now)],
    )?;
    Ok(())
}

pub fn set_enabled(
    tx: &rusqlite::Transaction<'_>,
    channel_id: ChannelId,
    is_enabled: bool,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "UPDATE channels SET is_enabled = ?2, updated_at = ?3 WHERE id = ?1",
        params![channel_id.0, is_enabled as i64, timefmt::encode(now)],
    )?;
    Ok(())
}
