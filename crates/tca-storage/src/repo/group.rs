use rusqlite::{params, Connection, OptionalExtension, Row};
use tca_core::types::GroupId;

use crate::error::{Result, StorageError};
use crate::model::Group;
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: GroupId(row.get("id")?),
        name: row.get("name")?,
        description: row.get("description")?,
        dedupe_horizon_minutes_override: row.get("dedupe_horizon_minutes_override")?,
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
        updated_at: timefmt::decode(&row.get::<_, String>("updated_at")?)?,
    })
}

pub fn get(conn: &Connection, id: GroupId) -> Result<Group> {
    conn.query_row("SELECT * FROM groups WHERE id = ?1", params![id.0], from_row)
        .optional()?
        .ok_or(StorageError::NotFound {
            entity: "group",
            id: id.to_string(),
        })
}

pub fn list(conn: &Connection) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare("SELECT * FROM groups ORDER BY id ASC")?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn create(
    tx: &rusqlite::Transaction<'_>,
    name: &str,
    description: Option<&str>,
    dedupe_horizon_minutes_override: Option<i64>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<GroupId> {
    tx.execute(
        "INSERT INTO groups (name, description, dedupe_horizon_minutes_override, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![name, description, dedupe_horizon_minutes_override, timefmt::encode(now)],
    )?;
    Ok(GroupId(tx.last_insert_rowid()))
}
