pub mod content_hash;
pub mod exact_url;
pub mod title_similarity;

use tca_storage::model::Item;

use crate::contract::StrategyOutcome;

/// One dedupe strategy: compares the new item against a single candidate
/// and returns its verdict. The engine calls each strategy in chain order
/// against every candidate and keeps the first non-abstain result overall
/// (§4.5 step 2).
pub trait Strategy {
    fn name(&self) -> &'static str;
    fn evaluate(&self, new_item: &Item, candidate: &Item) -> StrategyOutcome;
}

/// The default built-in chain, in evaluation order: `exact_url`, `content_hash`,
/// `title_similarity`.
pub fn default_chain(title_similarity_threshold: f64) -> Vec<Box<dyn Strategy + Send + Sync>> {
    vec![
        Box::new(exact_url::ExactUrl),
        Box::new(content_hash::ContentHash),
        Box::new(title_similarity::TitleSimilarity {
            threshold: title_similarity_threshold,
        }),
    ]
}
