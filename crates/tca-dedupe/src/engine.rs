use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use tca_core::types::{ClusterId, ItemId};
use tca_storage::model::{Decision, DecisionOutcome, DedupeState, Item};
use tca_storage::repo::decision::NewDecision;
use tca_storage::repo::{cluster, decision, item, member};

use crate::blocking;
use crate::contract::{self, StrategyOutcome};
use crate::error::Result;
use crate::representative;
use crate::strategies::{self, Strategy};

/// Hard cap on candidates considered per item (§4.5 step 1).
pub const DEFAULT_CANDIDATE_CAP: u32 = 50;

/// What happened to one item after a `process_item` call, for callers that
/// want to log or assert on the outcome without re-querying the store.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// No candidate produced a `Duplicate` verdict; the item now owns a new
    /// singleton cluster.
    Distinct { cluster_id: ClusterId },
    /// At least one candidate matched; the item joined (or caused the
    /// creation of) `cluster_id`. `merged_from` lists any source clusters
    /// absorbed into it.
    Duplicate {
        cluster_id: ClusterId,
        merged_from: Vec<ClusterId>,
    },
}

/// Owns the configured strategy chain and the candidate cap, and runs the
/// full per-item dedupe pass described in §4.5: candidate reduction,
/// strategy chain, cluster assignment, representative recomputation, and
/// decision-trace recording. Every write happens through the transaction
/// the caller passes in — this type does not touch the writer queue
/// itself, so `tca-ingest` controls the transaction boundary per item.
pub struct DedupeEngine {
    chain: Vec<Box<dyn Strategy + Send + Sync>>,
    candidate_cap: u32,
}

impl DedupeEngine {
    pub fn new(title_similarity_threshold: f64) -> Self {
        Self {
            chain: strategies::default_chain(title_similarity_threshold),
            candidate_cap: DEFAULT_CANDIDATE_CAP,
        }
    }

    pub fn with_candidate_cap(mut self, cap: u32) -> Self {
        self.candidate_cap = cap;
        self
    }

    /// Runs the full dedupe pass for `item_id`, which must already exist
    /// (normalize upserts before dedupe runs). On success the item's
    /// `dedupe_state` is `clustered`. On a contract violation, the error
    /// propagates without mutating the item's state, leaving it `pending`
    /// for the ingest-error capture path to record and move on.
    pub fn process_item(
        &self,
        tx: &rusqlite::Transaction<'_>,
        item_id: ItemId,
        horizon_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Disposition> {
        let new_item = item::get(tx, item_id)?;
        let horizon_start = now - Duration::minutes(horizon_minutes.max(0));

        let url_domain = new_item.canonical_url.as_deref().and_then(blocking::url_domain);
        let rare_tokens: Vec<String> = new_item
            .title
            .as_deref()
            .map(blocking::rare_tokens)
            .unwrap_or_default()
            .into_iter()
            .collect();

        let candidates = item::find_blocking_candidates(
            tx,
            None,
            horizon_start,
            new_item.canonical_url_hash.as_deref(),
            url_domain.as_deref(),
            &rare_tokens,
            item_id,
            self.candidate_cap,
        )?;

        let mut any_non_abstain = false;
        let mut matched_clusters: BTreeSet<ClusterId> = BTreeSet::new();
        let mut matched_clusterless: Vec<ItemId> = Vec::new();

        for candidate in &candidates {
            let mut terminal: Option<StrategyOutcome> = None;
            for strategy in &self.chain {
                let outcome = strategy.evaluate(&new_item, candidate);
                contract::validate(strategy.name(), &outcome)?;
                record_decision(tx, item_id, candidate, strategy.name(), &outcome, now)?;
                if !outcome.is_abstain() {
                    any_non_abstain = true;
                    terminal = Some(outcome);
                    break;
                }
            }

            if let Some(StrategyOutcome::Duplicate { .. }) = terminal {
                match member::cluster_for_item(tx, candidate.id)? {
                    Some(cluster_id) => {
                        matched_clusters.insert(cluster_id);
                    }
                    None => matched_clusterless.push(candidate.id),
                }
            }
        }

        if matched_clusters.is_empty() && matched_clusterless.is_empty() {
            if !any_non_abstain {
                decision::record(
                    tx,
                    NewDecision {
                        item_id,
                        cluster_id: None,
                        candidate_item_id: None,
                        strategy_name: "chain",
                        outcome: DecisionOutcome::Distinct,
                        reason_code: Some("no_strategy_match"),
                        score: None,
                        metadata_json: "{}",
                    },
                    now,
                )?;
            }
            let cluster_id = cluster::create(tx, &cluster_key(item_id), now)?;
            member::add(tx, cluster_id, item_id, now)?;
            recompute_representative(tx, cluster_id, now)?;
            item::set_dedupe_state(tx, item_id, DedupeState::Clustered)?;
            return Ok(Disposition::Distinct { cluster_id });
        }

        let mut merged_from = Vec::new();
        let target_cluster = if matched_clusters.is_empty() {
            cluster::create(tx, &cluster_key(item_id), now)?
        } else {
            let mut iter = matched_clusters.iter();
            let target = *iter.next().unwrap();
            let sources: Vec<ClusterId> = iter.copied().collect();
            if !sources.is_empty() {
                for source in &sources {
                    member::move_all(tx, *source, target)?;
                }
                cluster::delete_if_empty(tx, &sources)?;
                let metadata = serde_json::json!({
                    "source_cluster_ids": sources.iter().map(|c| c.0).collect::<Vec<_>>(),
                    "target_cluster_id": target.0,
                });
                decision::record(
                    tx,
                    NewDecision {
                        item_id,
                        cluster_id: Some(target),
                        candidate_item_id: None,
                        strategy_name: "cluster_merge",
                        outcome: DecisionOutcome::Duplicate,
                        reason_code: Some("cluster_merge"),
                        score: None,
                        metadata_json: &metadata.to_string(),
                    },
                    now,
                )?;
                merged_from = sources;
            }
            target
        };

        for candidate_id in &matched_clusterless {
            member::add(tx, target_cluster, *candidate_id, now)?;
        }
        member::add(tx, target_cluster, item_id, now)?;
        recompute_representative(tx, target_cluster, now)?;
        item::set_dedupe_state(tx, item_id, DedupeState::Clustered)?;

        Ok(Disposition::Duplicate {
            cluster_id: target_cluster,
            merged_from,
        })
    }
}

fn cluster_key(seed_item: ItemId) -> String {
    format!("item:{}", seed_item.0)
}

fn record_decision(
    tx: &rusqlite::Transaction<'_>,
    item_id: ItemId,
    candidate: &Item,
    strategy_name: &'static str,
    outcome: &StrategyOutcome,
    now: DateTime<Utc>,
) -> Result<()> {
    let cluster_id = member::cluster_for_item(tx, candidate.id)?;
    let (decision_outcome, reason_code, score, metadata_json) = match outcome {
        StrategyOutcome::Abstain { reason } => (DecisionOutcome::Abstain, *reason, None, "{}".to_string()),
        StrategyOutcome::Distinct { reason } => (DecisionOutcome::Distinct, *reason, None, "{}".to_string()),
        StrategyOutcome::Duplicate { score, reason, metadata, .. } => (
            DecisionOutcome::Duplicate,
            *reason,
            Some(*score),
            serde_json::to_string(metadata)?,
        ),
    };
    decision::record(
        tx,
        NewDecision {
            item_id,
            cluster_id,
            candidate_item_id: Some(candidate.id),
            strategy_name,
            outcome: decision_outcome,
            reason_code: Some(reason_code),
            score,
            metadata_json: &metadata_json,
        },
        now,
    )?;
    Ok(())
}

/// Recomputes and persists a cluster's representative from its current
/// membership (§4.5 step 5); deletes the cluster outright if it has
/// no members left. Shared with `tca-ops`'s retention prune, which calls
/// this after deleting items out from under a cluster.
///
/// Returns `tca_storage::Result` rather than this crate's `Result`: the
/// body only ever touches the repo layer, never a strategy chain, so it
/// can never produce a dedupe-specific contract violation. That makes it
/// callable directly from a `WriterQueue::submit` closure (whose return
/// type is fixed to `tca_storage::Result`) without a conversion step.
pub fn recompute_representative(
    tx: &rusqlite::Transaction<'_>,
    cluster_id: ClusterId,
    now: DateTime<Utc>,
) -> tca_storage::Result<()> {
    let item_ids = member::list_items(tx, cluster_id)?;
    if item_ids.is_empty() {
        cluster::delete(tx, cluster_id)?;
        return Ok(());
    }
    let members = item::get_many(tx, &item_ids)?;
    let representative = representative::choose(&members).map(|i| i.id);
    cluster::set_representative(tx, cluster_id, representative, now)?;
    Ok(())
}

#[allow(dead_code)]
fn decision_trace(tx: &rusqlite::Transaction<'_>, item_id: ItemId) -> Result<Vec<Decision>> {
    Ok(decision::list_for_item(tx, item_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tca_core::types::ChannelId;
    use tca_storage::repo::item::NewItem;
    use tca_storage::schema;

    fn memory_conn() -> rusqlite::Connection {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        schema::apply_connection_pragmas(&conn).unwrap();
        schema::migrate(&mut conn).unwrap();
        conn
    }

    fn insert_channel(tx: &rusqlite::Transaction<'_>, now: DateTime<Utc>) -> ChannelId {
        tx.execute(
            "INSERT INTO accounts (id, api_id, api_hash, key_version, created_at, updated_at) VALUES (1, 1, X'00', 1, ?1, ?1)",
            rusqlite::params![now.to_rfc3339()],
        )
        .unwrap();
        tx.execute(
            "INSERT INTO channels (id, account_id, upstream_channel_id, name, is_enabled, created_at, updated_at)
             VALUES (1, 1, 'c1', 'Channel', 1, ?1, ?1)",
            rusqlite::params![now.to_rfc3339()],
        )
        .unwrap();
        ChannelId(1)
    }

    #[test]
    fn two_items_with_same_canonical_url_hash_join_one_cluster() {
        let mut conn = memory_conn();
        let now = Utc::now();
        let engine = DedupeEngine::new(0.92);

        let tx = conn.transaction().unwrap();
        let channel_id = insert_channel(&tx, now);
        let first = item::upsert(
            &tx,
            NewItem {
                channel_id,
                upstream_message_id: "1",
                raw_message_id: None,
                published_at: Some(now),
                title: Some("Breaking news about the budget bill"),
                body: None,
                canonical_url: Some("https://example.com/a"),
                canonical_url_hash: Some("H1"),
                content_hash: None,
            },
            now,
        )
        .unwrap();
        let second = item::upsert(
            &tx,
            NewItem {
                channel_id,
                upstream_message_id: "2",
                raw_message_id: None,
                published_at: Some(now),
                title: None,
                body: None,
                canonical_url: Some("https://example.com/a"),
                canonical_url_hash: Some("H1"),
                content_hash: None,
            },
            now,
        )
        .unwrap();

        let d1 = engine.process_item(&tx, first, 10_080, now).unwrap();
        let d2 = engine.process_item(&tx, second, 10_080, now).unwrap();
        tx.commit().unwrap();

        let cluster_a = match d1 {
            Disposition::Distinct { cluster_id } => cluster_id,
            _ => panic!("first item should be distinct"),
        };
        let cluster_b = match d2 {
            Disposition::Duplicate { cluster_id, .. } => cluster_id,
            _ => panic!("second item should match via exact_url"),
        };
        assert_eq!(cluster_a, cluster_b);

        let read_tx = conn.transaction().unwrap();
        let decisions = decision::list_for_item(&read_tx, second).unwrap();
        assert!(decisions.iter().any(|d| d.strategy_name == "exact_url" && d.outcome == DecisionOutcome::Duplicate));
        read_tx.commit().unwrap();
    }

    #[test]
    fn no_candidates_records_no_strategy_match() {
        let mut conn = memory_conn();
        let now = Utc::now();
        let engine = DedupeEngine::new(0.92);

        let tx = conn.transaction().unwrap();
        let channel_id = insert_channel(&tx, now);
        let only = item::upsert(
            &tx,
            NewItem {
                channel_id,
                upstream_message_id: "1",
                raw_message_id: None,
                published_at: Some(now),
                title: Some("A totally unique headline nobody else has"),
                body: None,
                canonical_url: None,
                canonical_url_hash: None,
                content_hash: None,
            },
            now,
        )
        .unwrap();
        let disposition = engine.process_item(&tx, only, 10_080, now).unwrap();
        assert!(matches!(disposition, Disposition::Distinct { .. }));
        let decisions = decision::list_for_item(&tx, only).unwrap();
        assert!(decisions.iter().any(|d| d.reason_code.as_deref() == Some("no_strategy_match")));
        tx.commit().unwrap();
    }
}
