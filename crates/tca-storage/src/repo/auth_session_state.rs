use rusqlite::{params, OptionalExtension, Row};

use crate::error::{Result, StorageError};
use crate::model::{AuthSessionState, AuthSessionStatus};
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<AuthSessionState> {
    Ok(AuthSessionState {
        session_id: row.get("session_id")?,
        phone_number: row.get("phone_number")?,
        status: AuthSessionStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(AuthSessionStatus::Failed),
        expires_at: timefmt::decode(&row.get::<_, String>("expires_at")?)?,
        upstream_session: row.get("upstream_session")?,
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
        updated_at: timefmt::decode(&row.get::<_, String>("updated_at")?)?,
    })
}

/// Looks up a session by id. Expired rows must not be returned (§3
/// invariant) even though they may still be physically present until the
/// next sweep.
pub fn get(conn: &rusqlite::Connection, session_id: &str, now: chrono::DateTime<chrono::Utc>) -> Result<AuthSessionState> {
    let row = conn
        .query_row(
            "SELECT * FROM auth_session_state WHERE session_id = ?1",
            params![session_id],
            from_row,
        )
        .optional()?
        .ok_or(StorageError::NotFound {
            entity: "auth_session_state",
            id: session_id.to_string(),
        })?;
    if row.expires_at <= now {
        return Err(StorageError::NotFound {
            entity: "auth_session_state",
            id: session_id.to_string(),
        });
    }
    Ok(row)
}

pub fn upsert(
    tx: &rusqlite::Transaction<'_>,
    session_id: &str,
    phone_number: &str,
    status: AuthSessionStatus,
    expires_at: chrono::DateTime<chrono::Utc>,
    upstream_session: Option<&[u8]>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO auth_session_state (session_id, phone_number, status, expires_at, upstream_session, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(session_id) DO UPDATE SET
            status = excluded.status,
            expires_at = excluded.expires_at,
            upstream_session = COALESCE(excluded.upstream_session, auth_session_state.upstream_session),
            updated_at = excluded.updated_at",
        params![session_id, phone_number, status.as_str(), timefmt::encode(expires_at), upstream_session, timefmt::encode(now)],
    )?;
    Ok(())
}

pub fn delete_expired(tx: &rusqlite::Transaction<'_>, now: chrono::DateTime<chrono::Utc>) -> Result<u64> {
    let n = tx.execute(
        "DELETE FROM auth_session_state WHERE expires_at <= ?1",
        params![timefmt::encode(now)],
    )?;
    Ok(n as u64)
}
