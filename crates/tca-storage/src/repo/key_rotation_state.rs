use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::model::KeyRotationState;
use crate::timefmt;

pub fn get(conn: &rusqlite::Connection) -> Result<Option<KeyRotationState>> {
    Ok(conn
        .query_row("SELECT * FROM key_rotation_state WHERE id = 1", [], |row| {
            Ok(KeyRotationState {
                target_key_version: row.get("target_key_version")?,
                last_rotated_account_id: row.get("last_rotated_account_id")?,
                started_at: timefmt::decode(&row.get::<_, String>("started_at")?)?,
                updated_at: timefmt::decode(&row.get::<_, String>("updated_at")?)?,
                completed_at: timefmt::decode_opt(row.get("completed_at")?)?,
            })
        })
        .optional()?)
}

/// Starts (or resumes, idempotently) a rotation run targeting
/// `target_key_version`. Crash-safe resume reads `last_rotated_account_id`
/// back out and continues from `+1`.
pub fn start(
    tx: &rusqlite::Transaction<'_>,
    target_key_version: i64,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO key_rotation_state (id, target_key_version, last_rotated_account_id, started_at, updated_at)
         VALUES (1, ?1, 0, ?2, ?2)
         ON CONFLICT(id) DO UPDATE SET
            target_key_version = excluded.target_key_version,
            updated_at = excluded.updated_at
         WHERE key_rotation_state.completed_at IS NOT NULL",
        params![target_key_version, timefmt::encode(now)],
    )?;
    Ok(())
}

pub fn advance(tx: &rusqlite::Transaction<'_>, last_rotated_account_id: i64, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
    tx.execute(
        "UPDATE key_rotation_state SET last_rotated_account_id = ?1, updated_at = ?2 WHERE id = 1",
        params![last_rotated_account_id, timefmt::encode(now)],
    )?;
    Ok(())
}

pub fn complete(tx: &rusqlite::Transaction<'_>, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
    tx.execute(
        "UPDATE key_rotation_state SET completed_at = ?1, updated_at = ?1 WHERE id = 1",
        params![timefmt::encode(now)],
    )?;
    Ok(())
}
