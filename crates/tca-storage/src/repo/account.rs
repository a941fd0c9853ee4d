use rusqlite::{params, Connection, OptionalExtension, Row};
use tca_core::types::AccountId;

use crate::error::{Result, StorageError};
use crate::model::Account;
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: AccountId(row.get("id")?),
        api_id: row.get("api_id")?,
        api_hash: row.get("api_hash")?,
        session: row.get("session")?,
        key_version: row.get("key_version")?,
        paused_at: timefmt::decode_opt(row.get("paused_at")?)?,
        pause_reason: row.get("pause_reason")?,
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
        updated_at: timefmt::decode(&row.get::<_, String>("updated_at")?)?,
    })
}

pub fn get(conn: &Connection, id: AccountId) -> Result<Account> {
    conn.query_row("SELECT * FROM accounts WHERE id = ?1", params![id.0], from_row)
        .optional()?
        .ok_or(StorageError::NotFound {
            entity: "account",
            id: id.to_string(),
        })
}

pub fn list(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare("SELECT * FROM accounts ORDER BY id ASC")?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Inserts an account with envelope-encrypted `api_hash`/`session` bytes
/// already produced by the caller (see `tca-auth`'s envelope module).
pub fn create(
    tx: &rusqlite::Transaction<'_>,
    api_id: i64,
    api_hash: &[u8],
    session: Option<&[u8]>,
    key_version: i64,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<AccountId> {
    tx.execute(
        "INSERT INTO accounts (api_id, api_hash, session, key_version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![api_id, api_hash, session, key_version, timefmt::encode(now)],
    )?;
    Ok(AccountId(tx.last_insert_rowid()))
}

pub fn set_pause(
    tx: &rusqlite::Transaction<'_>,
    id: AccountId,
    paused_at: Option<chrono::DateTime<chrono::Utc>>,
    pause_reason: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    let n = tx.execute(
        "UPDATE accounts SET paused_at = ?2, pause_reason = ?3, updated_at = ?4 WHERE id = ?1",
        params![
            id.0,
            timefmt::encode_opt(paused_at),
            pause_reason,
            timefmt::encode(now)
        ],
    )?;
    if n == 0 {
        return Err(StorageError::NotFound {
            entity: "account",
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn update_session(
    tx: &rusqlite::Transaction<'_>,
    id: AccountId,
    session: Option<&[u8]>,
    key_version: i64,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "UPDATE accounts SET session = ?2, key_version = ?3, updated_at = ?4 WHERE id = ?1",
        params![id.0, session, key_version, timefmt::encode(now)],
    )?;
    Ok(())
}
