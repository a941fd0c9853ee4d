use tca_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpsError {
    #[error(transparent)]
    Storage(#[from] tca_storage::StorageError),

    #[error(transparent)]
    Core(#[from] tca_core::error::CoreError),

    #[error(transparent)]
    Dedupe(#[from] tca_dedupe::DedupeError),

    #[error("backup failed: {reason}")]
    BackupFailed { reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl OpsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OpsError::Storage(e) => e.kind(),
            OpsError::Core(e) => e.kind(),
            OpsError::Dedupe(e) => e.kind(),
            OpsError::BackupFailed { .. } => ErrorKind::Fatal,
            OpsError::Cancelled => ErrorKind::Transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, OpsError>;
