use rusqlite::{params, Connection, OptionalExtension, Row};
use tca_core::types::{AccountId, AccountPauseId};

use crate::error::Result;
use crate::model::AccountPause;
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<AccountPause> {
    Ok(AccountPause {
        id: AccountPauseId(row.get("id")?),
        account_id: AccountId(row.get("account_id")?),
        paused_at: timefmt::decode_opt(row.get("paused_at")?)?,
        pause_reason: row.get("pause_reason")?,
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
        updated_at: timefmt::decode(&row.get::<_, String>("updated_at")?)?,
    })
}

pub fn get(conn: &Connection, account_id: AccountId) -> Result<Option<AccountPause>> {
    Ok(conn
        .query_row(
            "SELECT * FROM account_pauses WHERE account_id = ?1",
            params![account_id.0],
            from_row,
        )
        .optional()?)
}

/// Records an account pause row (history of pauses) alongside the
/// denormalized `accounts.paused_at`/`pause_reason` columns the scheduler
/// reads directly. Called together with [`super::account::set_pause`].
pub fn record(
    tx: &rusqlite::Transaction<'_>,
    account_id: AccountId,
    paused_at: chrono::DateTime<chrono::Utc>,
    pause_reason: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO account_pauses (account_id, paused_at, pause_reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(account_id) DO UPDATE SET
            paused_at = excluded.paused_at,
            pause_reason = excluded.pause_reason,
            updated_at = excluded.updated_at",
        params![account_id.0, timefmt::encode(paused_at), pause_reason, timefmt::encode(now)],
    )?;
    Ok(())
}

/// Explicit resume required to clear a pause (§3 invariant).
pub fn clear(tx: &rusqlite::Transaction<'_>, account_id: AccountId, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
    tx.execute(
        "UPDATE account_pauses SET paused_at = NULL, pause_reason = NULL, updated_at = ?2 WHERE account_id = ?1",
        params![account_id.0, timefmt::encode(now)],
    )?;
    Ok(())
}
