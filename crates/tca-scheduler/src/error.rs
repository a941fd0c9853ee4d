use tca_core::error::ErrorKind;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Storage(#[from] tca_storage::StorageError),

    #[error(transparent)]
    Core(#[from] tca_core::error::CoreError),

    /// A tick took longer than the configured shutdown timeout to drain.
    #[error("scheduler tick did not complete within the shutdown timeout")]
    ShutdownTimeout,
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Storage(e) => e.kind(),
            SchedulerError::Core(e) => e.kind(),
            SchedulerError::ShutdownTimeout => ErrorKind::Transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
