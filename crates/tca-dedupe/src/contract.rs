use std::collections::BTreeMap;

use tca_core::types::ItemId;

use crate::error::{DedupeError, Result};

/// One strategy's verdict on a candidate pair. The first non-[`Abstain`]
/// outcome in the chain wins (§4.5 step 2); everything after that is
/// skipped.
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    Abstain { reason: &'static str },
    Distinct { reason: &'static str },
    Duplicate {
        candidate_item_id: ItemId,
        score: f64,
        reason: &'static str,
        metadata: BTreeMap<String, serde_json::Value>,
    },
}

impl StrategyOutcome {
    pub fn is_abstain(&self) -> bool {
        matches!(self, StrategyOutcome::Abstain { .. })
    }

    pub fn is_distinct(&self) -> bool {
        matches!(self, StrategyOutcome::Distinct { .. })
    }

    pub fn reason(&self) -> &'static str {
        match self {
            StrategyOutcome::Abstain { reason } => reason,
            StrategyOutcome::Distinct { reason } => reason,
            StrategyOutcome::Duplicate { reason, .. } => reason,
        }
    }
}

/// Validates a [`StrategyOutcome`] before it is recorded, enforcing the
/// checks the type system can't: a `Duplicate` score must be finite (no
/// NaN/±Inf — a strategy that divides by a zero-length token set is the
/// usual source) and every metadata value must itself be finite if it's a
/// JSON number.
pub fn validate(strategy_name: &str, outcome: &StrategyOutcome) -> Result<()> {
    if let StrategyOutcome::Duplicate { score, metadata, .. } = outcome {
        if !score.is_finite() {
            return Err(DedupeError::NonFiniteScore {
                strategy: strategy_name.to_string(),
            });
        }
        for (key, value) in metadata {
            if let Some(n) = value.as_f64() {
                if !n.is_finite() {
                    return Err(DedupeError::InvalidMetadata {
                        strategy: strategy_name.to_string(),
                        key: key.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_finite_duplicate_score() {
        let outcome = StrategyOutcome::Duplicate {
            candidate_item_id: ItemId(1),
            score: f64::NAN,
            reason: "exact_url_match",
            metadata: BTreeMap::new(),
        };
        assert!(validate("exact_url", &outcome).is_err());
    }

    #[test]
    fn accepts_finite_score() {
        let outcome = StrategyOutcome::Duplicate {
            candidate_item_id: ItemId(1),
            score: 0.97,
            reason: "exact_url_match",
            metadata: BTreeMap::new(),
        };
        assert!(validate("exact_url", &outcome).is_ok());
    }
}
