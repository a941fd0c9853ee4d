use std::collections::HashSet;

/// A small, fixed allowlist of very common English words/short function
/// words that never count as "rare" on their own, regardless of a title's
/// actual corpus frequency. This crate has no access to a global token
/// frequency table (single-node, no corpus stats service), so rarity is
/// approximated deterministically: lowercase, fold, strip punctuation,
/// drop stopwords and anything shorter than 4 characters, and treat
/// whatever remains as rare. See the Open Questions resolution in
/// SPEC_FULL.md.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "are", "was", "were", "have", "has",
    "had", "will", "would", "could", "should", "about", "into", "over", "after", "before",
    "their", "them", "they", "your", "you", "our", "its", "it's", "a", "an", "to", "of", "in",
    "on", "at", "is", "be", "as", "by", "or",
];

/// Extracts the set of "rare" tokens from a title, used as one of the
/// blocking keys during candidate reduction (§4.5 step 1).
pub fn rare_tokens(title: &str) -> HashSet<String> {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .filter(|tok| tok.len() >= 4 && !stopwords.contains(tok))
        .map(|tok| tok.to_string())
        .collect()
}

/// Extracts the registrable domain (host, minus a leading `www.`) from a
/// URL for the URL-domain blocking key. Returns `None` for unparseable
/// input rather than guessing.
pub fn url_domain(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    let host = host.split('@').next_back().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some(host.strip_prefix("www.").unwrap_or(host).to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords_and_short_tokens() {
        let tokens = rare_tokens("The Quick Fox and a Cat");
        assert!(tokens.contains("quick"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("and"));
        assert!(!tokens.contains("cat")); // len 3, below the floor
    }

    #[test]
    fn domain_strips_scheme_and_www() {
        assert_eq!(url_domain("https://www.example.com/a/b?c=1"), Some("example.com".to_string()));
        assert_eq!(url_domain("http://example.com"), Some("example.com".to_string()));
        assert_eq!(url_domain(""), None);
    }
}
