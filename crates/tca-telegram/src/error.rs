use thiserror::Error;

/// Errors raised by an [`crate::client::UpstreamClient`] implementation.
///
/// Callers in `tca-ingest` match on these variants directly — never on the
/// concrete upstream library's own error type — so the core ingest pipeline
/// stays decoupled from whichever MTProto client backs a given deployment,
/// recognized by kind rather than by library type.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("flood wait: retry after {seconds}s")]
    FloodWait { seconds: u64 },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("phone number is banned")]
    PhoneBanned,

    #[error("login code is invalid or expired")]
    CodeInvalid,

    #[error("two-factor password is required")]
    PasswordNeeded,

    #[error("two-factor password is invalid")]
    PasswordInvalid,

    #[error("session has expired or was replayed elsewhere")]
    SessionExpired,

    #[error("not connected")]
    NotConnected,

    #[error("upstream transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, UpstreamError>;
