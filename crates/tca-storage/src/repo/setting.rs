use rusqlite::{params, Connection, OptionalExtension};
use tca_core::config::SettingValue;

use crate::error::{Result, StorageError};
use crate::timefmt;

pub fn get(conn: &Connection, key: &str) -> Result<Option<SettingValue>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?1", params![key], |r| r.get(0))
        .optional()?;
    match raw {
        Some(json) => Ok(Some(SettingValue::from_json_str(&json).map_err(|e| {
            StorageError::SettingDecode {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?)),
        None => Ok(None),
    }
}

pub fn list_all(conn: &Connection) -> Result<Vec<(String, SettingValue)>> {
    let mut stmt = conn.prepare("SELECT key, value_json FROM settings ORDER BY key ASC")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        let (key, json) = row?;
        let value = SettingValue::from_json_str(&json).map_err(|e| StorageError::SettingDecode {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        out.push((key, value));
    }
    Ok(out)
}

/// Inserts a setting row, failing with `AlreadyExists` if the key is
/// already present (§4.2: "duplicate-key on settings key → already
/// exists domain error").
pub fn create(
    tx: &rusqlite::Transaction<'_>,
    key: &str,
    value: &SettingValue,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
        params![key, value.to_json_string(), timefmt::encode(now)],
    )
    .map_err(|e| StorageError::from_unique_violation(e, "setting", key))?;
    Ok(())
}

/// Inserts the key only if absent — used by the startup seed so explicit
/// user edits are never overwritten and a single missing key can be
/// backfilled without touching others.
pub fn seed_if_absent(
    tx: &rusqlite::Transaction<'_>,
    key: &str,
    value: &SettingValue,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<bool> {
    let n = tx.execute(
        "INSERT OR IGNORE INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
        params![key, value.to_json_string(), timefmt::encode(now)],
    )?;
    Ok(n == 1)
}

pub fn set(
    tx: &rusqlite::Transaction<'_>,
    key: &str,
    value: &SettingValue,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
        params![key, value.to_json_string(), timefmt::encode(now)],
    )?;
    Ok(())
}
