use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tca_core::types::{
    AccountId, AccountPauseId, ChannelId, ClusterId, DecisionId, GroupId, IngestErrorId, ItemId,
    NotificationId, PollJobId, RawMessageId,
};

#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub api_id: i64,
    pub api_hash: Vec<u8>,
    pub session: Option<Vec<u8>>,
    pub key_version: i64,
    pub paused_at: Option<DateTime<Utc>>,
    pub pause_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub dedupe_horizon_minutes_override: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub account_id: AccountId,
    pub group_id: Option<GroupId>,
    pub upstream_channel_id: String,
    pub name: String,
    pub username: Option<String>,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-channel progress marker in the upstream stream.
///
/// Validated against this exact shape on every read — see
/// [`crate::cursor::Cursor`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub last_message_id: Option<u64>,
    pub next_offset_id: Option<u64>,
    pub last_polled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ChannelState {
    pub channel_id: ChannelId,
    pub cursor: Cursor,
    pub paused_until: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AccountPause {
    pub id: AccountPauseId,
    pub account_id: AccountId,
    pub paused_at: Option<DateTime<Utc>>,
    pub pause_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: RawMessageId,
    pub channel_id: ChannelId,
    pub upstream_message_id: String,
    pub payload_json: String,
    pub created_at: DateTime<Utc>,
}

/// Dedupe lifecycle state of an [`Item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeState {
    Pending,
    Clustered,
    Failed,
}

impl DedupeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupeState::Pending => "pending",
            DedupeState::Clustered => "clustered",
            DedupeState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "clustered" => DedupeState::Clustered,
            "failed" => DedupeState::Failed,
            _ => DedupeState::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub channel_id: ChannelId,
    pub upstream_message_id: String,
    pub raw_message_id: Option<RawMessageId>,
    pub published_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub canonical_url: Option<String>,
    pub canonical_url_hash: Option<String>,
    pub content_hash: Option<String>,
    pub dedupe_state: DedupeState,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn text_len(&self) -> usize {
        self.title.as_deref().unwrap_or("").len() + self.body.as_deref().unwrap_or("").len()
    }

    pub fn has_canonical_url(&self) -> bool {
        self.canonical_url.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: ClusterId,
    pub cluster_key: String,
    pub representative_item_id: Option<ItemId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Abstain,
    Distinct,
    Duplicate,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Abstain => "ABSTAIN",
            DecisionOutcome::Distinct => "DISTINCT",
            DecisionOutcome::Duplicate => "DUPLICATE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub id: DecisionId,
    pub item_id: ItemId,
    pub cluster_id: Option<ClusterId>,
    pub candidate_item_id: Option<ItemId>,
    pub strategy_name: String,
    pub outcome: DecisionOutcome,
    pub reason_code: Option<String>,
    pub score: Option<f64>,
    pub metadata_json: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub notification_type: String,
    pub severity: Severity,
    pub message: String,
    pub payload_json: Option<String>,
    pub is_acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Fetch,
    Normalize,
    Dedupe,
    Auth,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Fetch => "fetch",
            IngestStage::Normalize => "normalize",
            IngestStage::Dedupe => "dedupe",
            IngestStage::Auth => "auth",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestErrorRow {
    pub id: IngestErrorId,
    pub channel_id: Option<ChannelId>,
    pub stage: IngestStage,
    pub error_code: String,
    pub error_message: String,
    pub payload_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PollJob {
    pub id: PollJobId,
    pub channel_id: ChannelId,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSessionStatus {
    Pending,
    CodeSent,
    AwaitingPassword,
    Authorized,
    Failed,
}

impl AuthSessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthSessionStatus::Pending => "pending",
            AuthSessionStatus::CodeSent => "code_sent",
            AuthSessionStatus::AwaitingPassword => "awaiting_password",
            AuthSessionStatus::Authorized => "authorized",
            AuthSessionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => AuthSessionStatus::Pending,
            "code_sent" => AuthSessionStatus::CodeSent,
            "awaiting_password" => AuthSessionStatus::AwaitingPassword,
            "authorized" => AuthSessionStatus::Authorized,
            "failed" => AuthSessionStatus::Failed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuthSessionState {
    pub session_id: String,
    pub phone_number: String,
    pub status: AuthSessionStatus,
    pub expires_at: DateTime<Utc>,
    pub upstream_session: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct KeyRotationState {
    pub target_key_version: i64,
    pub last_rotated_account_id: i64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
