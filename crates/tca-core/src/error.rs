use thiserror::Error;

/// Broad error-kind taxonomy shared by every crate in the workspace.
///
/// Collaborators outside the workspace (the HTTP surface, the CLI) match on
/// `kind()`, never on the concrete error variant, so new variants can be
/// added to any crate's error enum without breaking callers across a crate
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Transient,
    Fatal,
    ContractViolation,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("setting `{key}` has the wrong type: expected {expected}, found {found}")]
    SettingType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("setting `{key}` is missing and has no seeded default")]
    SettingMissing { key: String },

    #[error("value is not finite (NaN or infinite)")]
    NonFiniteFloat,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Config(_) => ErrorKind::Fatal,
            CoreError::SettingType { .. } => ErrorKind::Validation,
            CoreError::SettingMissing { .. } => ErrorKind::Validation,
            CoreError::NonFiniteFloat => ErrorKind::Validation,
            CoreError::Io(_) => ErrorKind::Transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
