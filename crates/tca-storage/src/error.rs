use tca_core::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{entity} with key `{key}` already exists")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("channel {channel_id} is already assigned to a group")]
    ChannelAlreadyInGroup { channel_id: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("setting `{key}` decode error: {reason}")]
    SettingDecode { key: String, reason: String },

    #[error("cursor JSON for channel {channel_id} is invalid: {reason}")]
    InvalidCursor { channel_id: i64, reason: String },

    #[error("writer queue is closed")]
    WriterClosed,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] tca_core::error::CoreError),

    /// Catch-all for a caller-supplied closure failing in a way this crate
    /// has no typed variant for (e.g. a dedupe contract violation raised
    /// while processing an item inside a writer-queue transaction). Kept
    /// deliberately generic rather than teaching `tca-storage` about every
    /// downstream crate's error type.
    #[error("{0}")]
    Internal(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::AlreadyExists { .. } => ErrorKind::Conflict,
            StorageError::ChannelAlreadyInGroup { .. } => ErrorKind::Conflict,
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::SettingDecode { .. } => ErrorKind::Validation,
            StorageError::InvalidCursor { .. } => ErrorKind::Validation,
            StorageError::WriterClosed => ErrorKind::Fatal,
            StorageError::Sqlite(_) => ErrorKind::Transient,
            StorageError::Pool(_) => ErrorKind::Transient,
            StorageError::Json(_) => ErrorKind::Validation,
            StorageError::Core(e) => e.kind(),
            StorageError::Internal(_) => ErrorKind::Fatal,
        }
    }

    /// Remaps a raw SQLite constraint violation to a domain error when the
    /// violated constraint is known; other errors pass through unchanged.
    pub fn from_unique_violation(err: rusqlite::Error, entity: &'static str, key: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::AlreadyExists {
                    entity,
                    key: key.to_string(),
                }
            }
            _ => StorageError::Sqlite(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
