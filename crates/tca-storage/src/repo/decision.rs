use rusqlite::{params, Connection, Row};
use tca_core::types::{ClusterId, DecisionId, ItemId};

use crate::error::Result;
use crate::model::{Decision, DecisionOutcome};
use crate::timefmt;

fn outcome_from_str(s: &str) -> DecisionOutcome {
    match s {
        "DISTINCT" => DecisionOutcome::Distinct,
        "DUPLICATE" => DecisionOutcome::Duplicate,
        _ => DecisionOutcome::Abstain,
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Decision> {
    Ok(Decision {
        id: DecisionId(row.get("id")?),
        item_id: ItemId(row.get("item_id")?),
        cluster_id: row.get::<_, Option<i64>>("cluster_id")?.map(ClusterId),
        candidate_item_id: row.get::<_, Option<i64>>("candidate_item_id")?.map(ItemId),
        strategy_name: row.get("strategy_name")?,
        outcome: outcome_from_str(&row.get::<_, String>("outcome")?),
        reason_code: row.get("reason_code")?,
        score: row.get("score")?,
        metadata_json: row.get("metadata_json")?,
        created_at: timefmt::decode(&row.get::<_, String>("created_at")?)?,
    })
}

pub fn list_for_item(conn: &Connection, item_id: ItemId) -> Result<Vec<Decision>> {
    let mut stmt = conn.prepare("SELECT * FROM decisions WHERE item_id = ?1 ORDER BY id ASC")?;
    let rows = stmt.query_map(params![item_id.0], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

#[derive(Debug, Clone)]
pub struct NewDecision<'a> {
    pub item_id: ItemId,
    pub cluster_id: Option<ClusterId>,
    pub candidate_item_id: Option<ItemId>,
    pub strategy_name: &'a str,
    pub outcome: DecisionOutcome,
    pub reason_code: Option<&'a str>,
    pub score: Option<f64>,
    pub metadata_json: &'a str,
}

/// Appends one decision row. The trace is immutable — there is no update or
/// delete path for individual rows outside the retention prune's orphan
/// sweep (`tca_storage::repo::cluster::delete_orphaned_decisions`).
pub fn record(
    tx: &rusqlite::Transaction<'_>,
    new: NewDecision<'_>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<DecisionId> {
    tx.execute(
        "INSERT INTO decisions (item_id, cluster_id, candidate_item_id, strategy_name, outcome, reason_code, score, metadata_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            new.item_id.0,
            new.cluster_id.map(|c| c.0),
            new.candidate_item_id.map(|i| i.0),
            new.strategy_name,
            new.outcome.as_str(),
            new.reason_code,
            new.score,
            new.metadata_json,
            timefmt::encode(now),
        ],
    )?;
    Ok(DecisionId(tx.last_insert_rowid()))
}
