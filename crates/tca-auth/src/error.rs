use tca_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Storage(#[from] tca_storage::StorageError),

    #[error(transparent)]
    Core(#[from] tca_core::error::CoreError),

    #[error("secret file {path} does not exist")]
    MissingSecretFile { path: String },

    #[error("secret file {path} is empty")]
    EmptySecretFile { path: String },

    #[error("failed to read secret file {path}: {source}")]
    SecretFileIo { path: String, source: std::io::Error },

    #[error("sensitive operation attempted while the process is locked")]
    Locked,

    #[error("ciphertext failed authentication under the current key")]
    DecryptionFailed,

    #[error("envelope ciphertext is malformed: {reason}")]
    MalformedCiphertext { reason: &'static str },

    #[error("bootstrap token file write failed: {0}")]
    BootstrapTokenWrite(std::io::Error),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Storage(e) => e.kind(),
            AuthError::Core(e) => e.kind(),
            AuthError::MissingSecretFile { .. } | AuthError::EmptySecretFile { .. } => ErrorKind::Fatal,
            AuthError::SecretFileIo { .. } => ErrorKind::Fatal,
            AuthError::Locked => ErrorKind::Conflict,
            AuthError::DecryptionFailed => ErrorKind::ContractViolation,
            AuthError::MalformedCiphertext { .. } => ErrorKind::ContractViolation,
            AuthError::BootstrapTokenWrite(_) => ErrorKind::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
