use rusqlite::params;
use tca_core::types::{AccountId, ChannelId, IngestErrorId};

use crate::error::Result;
use crate::model::IngestStage;
use crate::timefmt;

pub fn record(
    tx: &rusqlite::Transaction<'_>,
    channel_id: Option<ChannelId>,
    stage: IngestStage,
    error_code: &str,
    error_message: &str,
    payload_ref: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<IngestErrorId> {
    tx.execute(
        "INSERT INTO ingest_errors (channel_id, stage, error_code, error_message, payload_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            channel_id.map(|c| c.0),
            stage.as_str(),
            error_code,
            error_message,
            payload_ref,
            timefmt::encode(now)
        ],
    )?;
    Ok(IngestErrorId(tx.last_insert_rowid()))
}

/// Counts ingest-error rows with `error_code` recorded against any channel
/// owned by `account_id` since `since` — the rolling-window breach counter
/// behind the account-risk escalation rule (§7: "repeated risk events
/// on the same account within a rolling 3600s window escalate").
pub fn count_recent_for_account(
    conn: &rusqlite::Connection,
    account_id: AccountId,
    error_code: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ingest_errors e
         JOIN channels c ON c.id = e.channel_id
         WHERE c.account_id = ?1 AND e.error_code = ?2 AND e.created_at >= ?3",
        params![account_id.0, error_code, timefmt::encode(since)],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Deletes ingest-error rows older than `retention.ingest_errors_days`
/// (retention prune step 6, runs unbatched — the table is small in
/// practice and the step is last in the ordered sequence).
pub fn delete_older_than(tx: &rusqlite::Transaction<'_>, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64> {
    let n = tx.execute(
        "DELETE FROM ingest_errors WHERE created_at < ?1",
        params![timefmt::encode(cutoff)],
    )?;
    Ok(n as u64)
}
