use std::collections::BTreeMap;

use tca_storage::model::Item;

use crate::contract::StrategyOutcome;

use super::Strategy;

/// Compares `canonical_url_hash` directly. Equal hashes mean the same URL
/// after normalization — the strongest, cheapest signal available, so it
/// runs first in the default chain.
pub struct ExactUrl;

impl Strategy for ExactUrl {
    fn name(&self) -> &'static str {
        "exact_url"
    }

    fn evaluate(&self, new_item: &Item, candidate: &Item) -> StrategyOutcome {
        match (&new_item.canonical_url_hash, &candidate.canonical_url_hash) {
            (Some(a), Some(b)) if a == b => StrategyOutcome::Duplicate {
                candidate_item_id: candidate.id,
                score: 1.0,
                reason: "exact_url_match",
                metadata: BTreeMap::new(),
            },
            (Some(_), Some(_)) => StrategyOutcome::Distinct {
                reason: "url_mismatch",
            },
            _ => StrategyOutcome::Abstain {
                reason: "missing_canonical_url",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tca_core::types::{ChannelId, ItemId};
    use tca_storage::model::DedupeState;

    fn item(id: i64, hash: Option<&str>) -> Item {
        Item {
            id: ItemId(id),
            channel_id: ChannelId(1),
            upstream_message_id: id.to_string(),
            raw_message_id: None,
            published_at: None,
            title: None,
            body: None,
            canonical_url: None,
            canonical_url_hash: hash.map(|s| s.to_string()),
            content_hash: None,
            dedupe_state: DedupeState::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn matching_hashes_are_duplicate() {
        let outcome = ExactUrl.evaluate(&item(2, Some("h1")), &item(1, Some("h1")));
        assert!(matches!(outcome, StrategyOutcome::Duplicate { .. }));
    }

    #[test]
    fn differing_hashes_are_distinct() {
        let outcome = ExactUrl.evaluate(&item(2, Some("h1")), &item(1, Some("h2")));
        assert!(matches!(outcome, StrategyOutcome::Distinct { .. }));
    }

    #[test]
    fn missing_hash_abstains() {
        let outcome = ExactUrl.evaluate(&item(2, None), &item(1, Some("h2")));
        assert!(outcome.is_abstain());
    }
}
