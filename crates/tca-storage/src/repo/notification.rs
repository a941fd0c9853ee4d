use rusqlite::{params, Connection, OptionalExtension, Row};
use tca_core::types::NotificationId;

use crate::error::{Result, StorageError};
use crate::model::{Notification, Severity};
use crate::timefmt;

fn severity_from_str(s: &str) -> Severity {
    match s {
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: NotificationId(row.get("id")?),
        notification_type: row.get("type")?,
        severity: severity_from_str(&row.get::<_, String>("severity")?),
        message: row.get("message")?,
        payload_json: row.get("payload_json")?,
        is_acknowledged: row.get::<_, i64>("is_acknowledged")? != 0,
        acknowledged_at: timefmt::decode_opt(row.get("acknowledged_at")?)?,
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
    })
}

pub fn list(conn: &Connection, include_acknowledged: bool) -> Result<Vec<Notification>> {
    let sql = if include_acknowledged {
        "SELECT * FROM notifications ORDER BY id ASC"
    } else {
        "SELECT * FROM notifications WHERE is_acknowledged = 0 ORDER BY id ASC"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn create(
    tx: &rusqlite::Transaction<'_>,
    notification_type: &str,
    severity: Severity,
    message: &str,
    payload_json: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<NotificationId> {
    tx.execute(
        "INSERT INTO notifications (type, severity, message, payload_json, is_acknowledged, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![notification_type, severity.as_str(), message, payload_json, timefmt::encode(now)],
    )?;
    Ok(NotificationId(tx.last_insert_rowid()))
}

/// Idempotent acknowledge: repeated calls return the same `acknowledged_at`
/// (§8 round-trip property) instead of bumping the timestamp.
pub fn acknowledge(
    tx: &rusqlite::Transaction<'_>,
    id: NotificationId,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<chrono::DateTime<chrono::Utc>> {
    let existing: Option<String> = tx
        .query_row(
            "SELECT acknowledged_at FROM notifications WHERE id = ?1 AND is_acknowledged = 1",
            params![id.0],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(ts) = existing {
        return Ok(timefmt::decode(&ts)?);
    }

    let n = tx.execute(
        "UPDATE notifications SET is_acknowledged = 1, acknowledged_at = ?2 WHERE id = ?1",
        params![id.0, timefmt::encode(now)],
    )?;
    if n == 0 {
        return Err(StorageError::NotFound {
            entity: "notification",
            id: id.to_string(),
        });
    }
    Ok(now)
}
