use chrono::{DateTime, Duration, Utc};
use tca_storage::model::ChannelState;

/// Spec §4.4 steps 3-5: a channel is due when it isn't paused and either
/// has no polling history yet (immediately eligible) or its effective
/// `next_run_at = last_success_at + poll_interval + jitter` has arrived.
///
/// `channel_state` is `None` when the channel has never had a
/// `channel_state` row written (brand new channel) — treated the same as
/// a null `last_success_at`: immediately eligible.
pub fn is_due(
    channel_state: Option<&ChannelState>,
    poll_interval_seconds: i64,
    jitter_seconds: i64,
    now: DateTime<Utc>,
) -> bool {
    let Some(state) = channel_state else {
        return true;
    };
    if let Some(paused_until) = state.paused_until {
        if paused_until > now {
            return false;
        }
    }
    match state.last_success_at {
        None => true,
        Some(last_success_at) => {
            let next_run_at = last_success_at + Duration::seconds(poll_interval_seconds + jitter_seconds);
            next_run_at <= now
        }
    }
}
