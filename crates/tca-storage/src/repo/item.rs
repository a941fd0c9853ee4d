use rusqlite::{params, Connection, OptionalExtension, Row};
use tca_core::types::{ChannelId, ItemId, RawMessageId};

use crate::error::{Result, StorageError};
use crate::model::{DedupeState, Item};
use crate::timefmt;

fn from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: ItemId(row.get("id")?),
        channel_id: ChannelId(row.get("channel_id")?),
        upstream_message_id: row.get("upstream_message_id")?,
        raw_message_id: row.get::<_, Option<i64>>("raw_message_id")?.map(RawMessageId),
        published_at: timefmt::decode_opt(row.get("published_at")?)?,
        title: row.get("title")?,
        body: row.get("body")?,
        canonical_url: row.get("canonical_url")?,
        canonical_url_hash: row.get("canonical_url_hash")?,
        content_hash: row.get("content_hash")?,
        dedupe_state: DedupeState::from_str(&row.get::<_, String>("dedupe_state")?),
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
    })
}

pub fn get(conn: &Connection, id: ItemId) -> Result<Item> {
    conn.query_row("SELECT * FROM items WHERE id = ?1", params![id.0], from_row)
        .optional()?
        .ok_or(StorageError::NotFound {
            entity: "item",
            id: id.to_string(),
        })
}

pub fn get_many(conn: &Connection, ids: &[ItemId]) -> Result<Vec<Item>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("SELECT * FROM items WHERE id IN ({placeholders}) ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(ids.iter().map(|i| i.0)),
        from_row,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[allow(clippy::too_many_arguments)]
pub struct NewItem<'a> {
    pub channel_id: ChannelId,
    pub upstream_message_id: &'a str,
    pub raw_message_id: Option<RawMessageId>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub title: Option<&'a str>,
    pub body: Option<&'a str>,
    pub canonical_url: Option<&'a str>,
    pub canonical_url_hash: Option<&'a str>,
    pub content_hash: Option<&'a str>,
}

/// Upserts an item by `(channel_id, upstream_message_id)`. On update, the
/// raw-message link is preserved unless the caller supplies a new one — see
/// §4.5 ("the normalize step preserves raw-message linkage on update").
pub fn upsert(
    tx: &rusqlite::Transaction<'_>,
    new: NewItem<'_>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<ItemId> {
    tx.execute(
        "INSERT INTO items (channel_id, upstream_message_id, raw_message_id, published_at, title, body,
                             canonical_url, canonical_url_hash, content_hash, dedupe_state, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10)
         ON CONFLICT(channel_id, upstream_message_id) DO UPDATE SET
            raw_message_id = COALESCE(excluded.raw_message_id, items.raw_message_id),
            published_at = excluded.published_at,
            title = excluded.title,
            body = excluded.body,
            canonical_url = excluded.canonical_url,
            canonical_url_hash = excluded.canonical_url_hash,
            content_hash = excluded.content_hash",
        params![
            new.channel_id.0,
            new.upstream_message_id,
            new.raw_message_id.map(|r| r.0),
            timefmt::encode_opt(new.published_at),
            new.title,
            new.body,
            new.canonical_url,
            new.canonical_url_hash,
            new.content_hash,
            timefmt::encode(now),
        ],
    )?;
    let id: i64 = tx.query_row(
        "SELECT id FROM items WHERE channel_id = ?1 AND upstream_message_id = ?2",
        params![new.channel_id.0, new.upstream_message_id],
        |r| r.get(0),
    )?;
    Ok(ItemId(id))
}

pub fn set_dedupe_state(tx: &rusqlite::Transaction<'_>, id: ItemId, state: DedupeState) -> Result<()> {
    tx.execute(
        "UPDATE items SET dedupe_state = ?2 WHERE id = ?1",
        params![id.0, state.as_str()],
    )?;
    Ok(())
}

/// Candidate reduction per §4.5 step 1: items within `horizon` sharing a
/// blocking key with the new item (identical `canonical_url_hash`, the same
/// URL domain, or an overlapping rare title token), capped at `limit` and
/// ordered by ascending item id.
pub fn find_blocking_candidates(
    conn: &Connection,
    channel_scope: Option<ChannelId>,
    horizon_start: chrono::DateTime<chrono::Utc>,
    canonical_url_hash: Option<&str>,
    url_domain: Option<&str>,
    rare_tokens: &[String],
    exclude_item_id: ItemId,
    limit: u32,
) -> Result<Vec<Item>> {
    let mut candidates: Vec<Item> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    let mut push_rows = |mut rows: Vec<Item>| {
        for item in rows.drain(..) {
            if item.id != exclude_item_id && seen.insert(item.id) {
                candidates.push(item);
            }
        }
    };

    if let Some(hash) = canonical_url_hash {
        let sql = "SELECT * FROM items WHERE canonical_url_hash = ?1 AND created_at >= ?2 ORDER BY id ASC LIMIT ?3";
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(
            params![hash, timefmt::encode(horizon_start), limit],
            from_row,
        )?;
        push_rows(rows.collect::<rusqlite::Result<Vec<_>>>()?);
    }

    if let Some(domain) = url_domain {
        let pattern = format!("%{}%", domain.replace('%', ""));
        let sql = "SELECT * FROM items WHERE canonical_url LIKE ?1 AND created_at >= ?2 ORDER BY id ASC LIMIT ?3";
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(
            params![pattern, timefmt::encode(horizon_start), limit],
            from_row,
        )?;
        push_rows(rows.collect::<rusqlite::Result<Vec<_>>>()?);
    }

    for token in rare_tokens {
        if candidates.len() >= limit as usize {
            break;
        }
        let pattern = format!("%{}%", token.replace('%', ""));
        let sql = "SELECT * FROM items WHERE title LIKE ?1 AND created_at >= ?2 ORDER BY id ASC LIMIT ?3";
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(
            params![pattern, timefmt::encode(horizon_start), limit],
            from_row,
        )?;
        push_rows(rows.collect::<rusqlite::Result<Vec<_>>>()?);
    }

    let _ = channel_scope; // candidates are cross-channel by design; reserved for future per-channel scoping
    candidates.sort_by_key(|i| i.id);
    candidates.truncate(limit as usize);
    Ok(candidates)
}

/// Deletes item rows older than `cutoff`, batched like raw messages, but
/// also returns the set of cluster ids the deleted items belonged to so the
/// caller can recompute/prune those clusters next.
pub fn delete_older_than_batch(
    tx: &rusqlite::Transaction<'_>,
    cutoff: chrono::DateTime<chrono::Utc>,
    batch_size: u32,
) -> Result<(Vec<ItemId>, std::collections::HashSet<i64>)> {
    let mut stmt = tx.prepare("SELECT id FROM items WHERE created_at < ?1 ORDER BY id ASC LIMIT ?2")?;
    let ids: Vec<i64> = stmt
        .query_map(params![timefmt::encode(cutoff), batch_size], |r| r.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    if ids.is_empty() {
        return Ok((Vec::new(), std::collections::HashSet::new()));
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");

    let mut affected = std::collections::HashSet::new();
    {
        let sql = format!("SELECT DISTINCT cluster_id FROM members WHERE item_id IN ({placeholders})");
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |r| r.get::<_, i64>(0))?;
        for r in rows {
            affected.insert(r?);
        }
    }

    tx.execute(
        &format!("DELETE FROM items WHERE id IN ({placeholders})"),
        rusqlite::params_from_iter(ids.iter()),
    )?;

    Ok((ids.into_iter().map(ItemId).collect(), affected))
}
