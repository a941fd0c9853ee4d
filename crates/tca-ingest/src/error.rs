use tca_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Storage(#[from] tca_storage::StorageError),

    #[error(transparent)]
    Core(#[from] tca_core::error::CoreError),

    #[error(transparent)]
    Dedupe(#[from] tca_dedupe::DedupeError),

    #[error(transparent)]
    Upstream(#[from] tca_telegram::UpstreamError),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Storage(e) => e.kind(),
            IngestError::Core(e) => e.kind(),
            IngestError::Dedupe(e) => e.kind(),
            IngestError::Upstream(_) => ErrorKind::Transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
