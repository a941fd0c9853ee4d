//! Cluster representative selection (§4.5 step 5), shared by the
//! dedupe engine (after every membership change) and `tca-ops`'s retention
//! prune (after items are deleted out from under a cluster).

use tca_storage::model::Item;

/// Picks the representative out of `members` by strict priority, no ties
/// broken outside this order:
///
/// 1. prefer a non-empty `canonical_url`
/// 2. maximize `len(title) + len(body)`
/// 3. prefer a non-null `published_at` (nulls last), then the earliest
/// 4. smallest item id
///
/// Returns `None` for an empty slice — callers interpret that as "the
/// cluster has no members and should be deleted", not as an error.
pub fn choose(members: &[Item]) -> Option<Item> {
    members
        .iter()
        .min_by(|a, b| {
            let has_url_a = !a.has_canonical_url();
            let has_url_b = !b.has_canonical_url();
            has_url_a
                .cmp(&has_url_b)
                .then_with(|| b.text_len().cmp(&a.text_len()))
                .then_with(|| match (a.published_at, b.published_at) {
                    (Some(pa), Some(pb)) => pa.cmp(&pb),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.id.cmp(&b.id))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tca_core::types::{ChannelId, ItemId};
    use tca_storage::model::DedupeState;

    fn item(id: i64) -> Item {
        Item {
            id: ItemId(id),
            channel_id: ChannelId(1),
            upstream_message_id: id.to_string(),
            raw_message_id: None,
            published_at: None,
            title: None,
            body: None,
            canonical_url: None,
            canonical_url_hash: None,
            content_hash: None,
            dedupe_state: DedupeState::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_members_yields_none() {
        assert!(choose(&[]).is_none());
    }

    #[test]
    fn prefers_non_empty_canonical_url_first() {
        let mut with_url = item(1);
        with_url.canonical_url = Some("https://example.com/a".to_string());
        with_url.title = Some("short".to_string());
        let mut without_url = item(2);
        without_url.title = Some("a much much longer title with lots of text".to_string());
        let chosen = choose(&[without_url, with_url.clone()]).unwrap();
        assert_eq!(chosen.id, with_url.id);
    }

    #[test]
    fn among_equal_url_presence_maximizes_text_length() {
        let mut short = item(1);
        short.title = Some("short".to_string());
        let mut long = item(2);
        long.title = Some("a substantially longer title here".to_string());
        let chosen = choose(&[short, long.clone()]).unwrap();
        assert_eq!(chosen.id, long.id);
    }

    #[test]
    fn then_prefers_earliest_non_null_published_at() {
        let now = Utc::now();
        let mut a = item(1);
        a.published_at = Some(now);
        let mut b = item(2);
        b.published_at = Some(now - Duration::hours(1));
        let mut c = item(3);
        c.published_at = None;
        let chosen = choose(&[a, b.clone(), c]).unwrap();
        assert_eq!(chosen.id, b.id);
    }

    #[test]
    fn finally_breaks_ties_on_smallest_id() {
        let a = item(5);
        let b = item(2);
        let chosen = choose(&[a, b.clone()]).unwrap();
        assert_eq!(chosen.id, b.id);
    }
}
