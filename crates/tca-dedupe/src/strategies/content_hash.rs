use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tca_storage::model::Item;

use crate::contract::StrategyOutcome;

use super::Strategy;

/// Strips tracking query params (`utm_*`, `fbclid`, `gclid`, `ref`) and
/// lowercases a URL for hashing purposes. Does not attempt full RFC 3986
/// normalization — only the subset that matters for duplicate detection
/// (scheme/host case, trailing slash, tracking noise).
fn canonicalize_url(url: &str) -> String {
    let lower = url.trim().to_lowercase();
    let (base, query) = match lower.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (lower.as_str(), None),
    };
    let base = base.trim_end_matches('/');
    let Some(query) = query else {
        return base.to_string();
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or("");
            !(key.starts_with("utm_") || matches!(key, "fbclid" | "gclid" | "ref"))
        })
        .collect();
    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}

/// Folds whitespace/case out of free text before hashing, approximating
/// Unicode case folding with `to_lowercase` (full NFKC folding needs a
/// dedicated crate this workspace doesn't otherwise pull in).
fn normalize_text(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes and hashes a raw URL the same way [`canonicalize_url`] does
/// internally, so the normalize stage can populate `items.canonical_url_hash`
/// with a value `exact_url` will later compare against.
pub fn canonical_url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize_url(url).as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes the same normalized-content hash the `content_hash` strategy
/// compares, so the ingest/normalize stage can populate `items.content_hash`
/// with a value this strategy will later agree with.
pub fn compute(title: Option<&str>, body: Option<&str>, canonical_url: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(title.unwrap_or("")).as_bytes());
    hasher.update(b"\0");
    hasher.update(normalize_text(body.unwrap_or("")).as_bytes());
    hasher.update(b"\0");
    if let Some(url) = canonical_url {
        hasher.update(canonicalize_url(url).as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Hashes normalized title+body (and canonical URL, if present) and
/// compares. `ABSTAIN`s unless both items have at least one of title/body
/// populated — an item with neither carries no usable signal here.
pub struct ContentHash;

impl Strategy for ContentHash {
    fn name(&self) -> &'static str {
        "content_hash"
    }

    fn evaluate(&self, new_item: &Item, candidate: &Item) -> StrategyOutcome {
        let new_has_text = new_item.title.is_some() || new_item.body.is_some();
        let candidate_has_text = candidate.title.is_some() || candidate.body.is_some();
        if !new_has_text || !candidate_has_text {
            return StrategyOutcome::Abstain {
                reason: "missing_text",
            };
        }

        let new_hash = compute(
            new_item.title.as_deref(),
            new_item.body.as_deref(),
            new_item.canonical_url.as_deref(),
        );
        let candidate_hash = compute(
            candidate.title.as_deref(),
            candidate.body.as_deref(),
            candidate.canonical_url.as_deref(),
        );

        if new_hash == candidate_hash {
            let mut metadata = BTreeMap::new();
            metadata.insert("content_hash".to_string(), serde_json::Value::String(new_hash));
            StrategyOutcome::Duplicate {
                candidate_item_id: candidate.id,
                score: 1.0,
                reason: "content_hash_match",
                metadata,
            }
        } else {
            // Both sides had usable text and still disagree: a positive
            // enough signal to assert distinctness outright rather than
            // abstain (abstaining is reserved for the "not enough text to
            // compare" case above).
            StrategyOutcome::Distinct {
                reason: "content_hash_mismatch",
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

    fn item(id: i64, title: Option<&str>, body: Option<&str>) -> Item {
        Item {
            id: ItemId(id),
            channel_id: ChannelId(1),
            upstream_message_id: id.to_string(),
            raw_message_id: None,
            published_at: None,
            title: title.map(|s| s.to_string()),
            body: body.map(|s| s.to_string()),
            canonical_url: None,
            canonical_url_hash: None,
            content_hash: None,
            dedupe_state: DedupeState::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn identical_text_after_folding_is_duplicate() {
        let a = item(1, Some("Breaking  News"), None);
        let b = item(2, Some("breaking news"), None);
        assert!(matches!(ContentHash.evaluate(&b, &a), StrategyOutcome::Duplicate { .. }));
    }

    #[test]
    fn differing_text_is_distinct_not_abstain() {
        let a = item(1, Some("Apples"), None);
        let b = item(2, Some("Oranges"), None);
        let outcome = ContentHash.evaluate(&b, &a);
        assert!(outcome.is_distinct());
        assert_eq!(outcome.reason(), "content_hash_mismatch");
    }

    #[test]
    fn missing_text_on_either_side_abstains() {
        let a = item(1, None, None);
        let b = item(2, Some("Something"), None);
        assert!(ContentHash.evaluate(&b, &a).is_abstain());
    }

    #[test]
    fn tracking_params_do_not_affect_url_component() {
        let hash_clean = compute(Some("t"), None, Some("https://example.com/a"));
        let hash_tracked = compute(Some("t"), None, Some("https://example.com/a?utm_source=x"));
        assert_eq!(hash_clean, hash_tracked);
    }
}

#[cfg(test)]
mod canonical_hash_tests {
    use super::*;

    #[test]
    fn tracking_params_do_not_affect_canonical_hash() {
        let a = canonical_url_hash("https://example.com/a");
        let b = canonical_url_hash("https://EXAMPLE.com/a/?utm_source=newsletter");
        assert_eq!(a, b);
    }
}
