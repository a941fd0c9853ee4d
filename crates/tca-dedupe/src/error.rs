use tca_core::error::ErrorKind;
use thiserror::Error;

/// Strategy contract violations. A strategy is a native Rust function
/// returning a typed [`crate::contract::StrategyOutcome`], so most of the
/// "is this a mapping", "are the keys strings" checks that a dynamically
/// typed strategy chain would need collapse into the type system; the
/// checks that remain meaningful here are the ones a type system alone
/// can't rule out: finiteness and sign of a score, and whether a
/// free-form metadata map stayed JSON-safe.
#[derive(Debug, Error)]
pub enum DedupeError {
    #[error("strategy `{strategy}` returned a non-finite score (NaN or infinite)")]
    NonFiniteScore { strategy: String },

    #[error("strategy `{strategy}` metadata value for key `{key}` is not representable as JSON")]
    InvalidMetadata { strategy: String, key: String },

    #[error(transparent)]
    Storage(#[from] tca_storage::StorageError),
}

impl DedupeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DedupeError::NonFiniteScore { .. } => ErrorKind::ContractViolation,
            DedupeError::InvalidMetadata { .. } => ErrorKind::ContractViolation,
            DedupeError::Storage(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DedupeError>;
