use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// One message read back from an upstream channel, already shaped into
/// what `tca-ingest` persists as a raw message and later normalizes.
#[derive(Debug, Clone)]
pub struct UpstreamMessage {
    pub upstream_message_id: String,
    pub payload_json: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// One page of [`UpstreamMessage`]s plus the cursor fields the caller
/// should persist to resume from exactly this point next poll.
#[derive(Debug, Clone, Default)]
pub struct FetchPage {
    pub messages: Vec<UpstreamMessage>,
    pub last_message_id: Option<u64>,
    pub next_offset_id: Option<u64>,
    pub has_more: bool,
}

/// Minimal contract an upstream Telegram client backend must satisfy.
/// The core ingest/scheduler/auth subsystems depend only on this trait —
/// never on a concrete MTProto library — so a deployment can swap backends
/// without touching the storage or dedupe layers.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Backend name for logging (e.g. the concrete library in use).
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Starts interactive login: requests a login code be sent to `phone`.
    async fn send_code_request(&mut self, phone: &str) -> Result<()>;

    /// Completes interactive login. `password` is required when the
    /// account has two-factor authentication enabled
    /// ([`crate::error::UpstreamError::PasswordNeeded`]).
    async fn sign_in(&mut self, phone: &str, code: &str, password: Option<&str>) -> Result<()>;

    /// Fetches up to `max_messages` new messages from `upstream_channel_id`
    /// past `after_message_id`/`offset_id` (both `None` on a channel's
    /// first poll).
    async fn fetch_messages(
        &mut self,
        upstream_channel_id: &str,
        after_message_id: Option<u64>,
        offset_id: Option<u64>,
        max_messages: u32,
    ) -> Result<FetchPage>;
}
