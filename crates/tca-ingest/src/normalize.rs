//! Raw-message → item normalization (§4.5 step (c)).
//!
//! The upstream payload shape itself is an external collaborator's
//! contract (§9 open question: "the cursor JSON schema... must be
//! documented when implementing the ingest-fetch collaborator"). What this
//! module assumes of `payload_json` is the minimal, upstream-agnostic
//! shape: an optional `title` string, an optional `text` or `body` string,
//! and an optional `url` or `link` string. Any other keys are ignored, and
//! a payload missing all three normalizes to an item with no text and no
//! URL rather than failing — dedupe simply has nothing to key on for it.

use serde_json::Value;

use tca_dedupe::strategies::content_hash;

#[derive(Debug, Clone, Default)]
pub struct NormalizedFields {
    pub title: Option<String>,
    pub body: Option<String>,
    pub canonical_url: Option<String>,
    pub canonical_url_hash: Option<String>,
    pub content_hash: Option<String>,
}

/// Extracts title/body/url from a raw payload and derives the hashes the
/// dedupe strategy chain compares against. Malformed (non-object, or not
/// valid JSON at all) payloads normalize to an all-`None` result rather
/// than erroring — there is nothing recoverable to retry, and the item
/// still gets an `items` row so cursor advancement stays accurate.
pub fn normalize(payload_json: &str) -> NormalizedFields {
    let Ok(value) = serde_json::from_str::<Value>(payload_json) else {
        return NormalizedFields::default();
    };
    let Some(obj) = value.as_object() else {
        return NormalizedFields::default();
    };

    let title = string_field(obj, &["title"]);
    let body = string_field(obj, &["text", "body"]);
    let canonical_url = string_field(obj, &["url", "link"]);

    let canonical_url_hash = canonical_url.as_deref().map(content_hash::canonical_url_hash);
    let content_hash = if title.is_some() || body.is_some() {
        Some(content_hash::compute(
            title.as_deref(),
            body.as_deref(),
            canonical_url.as_deref(),
        ))
    } else {
        None
    };

    NormalizedFields {
        title,
        body,
        canonical_url,
        canonical_url_hash,
        content_hash,
    }
}

fn string_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(s)) = obj.get(*key) {
            if !s.trim().is_empty() {
                return Some(s.clone());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_body_and_url() {
        let fields = normalize(r#"{"title":"Headline","text":"Body copy","url":"https://example.com/a"}"#);
        assert_eq!(fields.title.as_deref(), Some("Headline"));
        assert_eq!(fields.body.as_deref(), Some("Body copy"));
        assert_eq!(fields.canonical_url.as_deref(), Some("https://example.com/a"));
        assert!(fields.canonical_url_hash.is_some());
        assert!(fields.content_hash.is_some());
    }

    #[test]
    fn accepts_body_alias_and_link_alias() {
        let fields = normalize(r#"{"body":"Alt body","link":"https://example.com/b"}"#);
        assert_eq!(fields.body.as_deref(), Some("Alt body"));
        assert_eq!(fields.canonical_url.as_deref(), Some("https://example.com/b"));
    }

    #[test]
    fn malformed_json_normalizes_to_empty_fields_instead_of_erroring() {
        let fields = normalize("not json");
        assert!(fields.title.is_none());
        assert!(fields.canonical_url_hash.is_none());
    }

    #[test]
    fn blank_strings_are_treated_as_absent() {
        let fields = normalize(r#"{"title":"   ","url":""}"#);
        assert!(fields.title.is_none());
        assert!(fields.canonical_url.is_none());
    }
}
