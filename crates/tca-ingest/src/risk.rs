//! Flood-wait handling and account-risk escalation (§7).
//!
//! A single flood-wait only pauses the offending channel. Three flood-wait
//! breaches against the same account inside a rolling 3600s window pause
//! the whole account (`reason = "account-risk"`) and raise exactly one
//! high-severity notification — repeated breaches past the third don't
//! raise a second one, since the account is already paused and the
//! scheduler won't poll any of its channels again until an operator
//! explicitly resumes it.

use chrono::{DateTime, Duration, Utc};
use tca_core::types::{AccountId, ChannelId};
use tca_storage::model::Severity;
use tca_storage::repo::{account, account_pause, channel_state, ingest_error, notification};
use tca_storage::Store;
use tracing::warn;

pub const FLOOD_WAIT_ERROR_CODE: &str = "flood_wait";
const RISK_WINDOW_SECONDS: i64 = 3600;
const RISK_BREACH_THRESHOLD: i64 = 3;
/// Flood waits at or above this many seconds are notable enough to page
/// an operator on their own, independent of the account-risk escalation.
const NOTIFY_THRESHOLD_SECONDS: u64 = 300;

/// Applies the flood-wait response for one channel: pauses the channel
/// until `now + seconds`, records the ingest error, and — if this is the
/// account's third breach within the rolling window — escalates to an
/// account-wide pause.
pub async fn handle_flood_wait(
    store: &Store,
    account_id: AccountId,
    channel_id: ChannelId,
    seconds: u64,
    now: DateTime<Utc>,
) -> tca_storage::Result<()> {
    let paused_until = now + Duration::seconds(seconds as i64);

    store
        .writer
        .submit(move |tx| {
            channel_state::set_paused_until(tx, channel_id, paused_until, now)?;
            ingest_error::record(
                tx,
                Some(channel_id),
                tca_storage::model::IngestStage::Fetch,
                FLOOD_WAIT_ERROR_CODE,
                &format!("flood wait: retry after {seconds}s"),
                None,
                now,
            )?;
            if seconds >= NOTIFY_THRESHOLD_SECONDS {
                let payload = serde_json::json!({ "channel_id": channel_id.0, "seconds": seconds }).to_string();
                notification::create(
                    tx,
                    "ingest.flood_wait",
                    Severity::Medium,
                    &format!("channel {} hit a {}s flood wait", channel_id, seconds),
                    Some(&payload),
                    now,
                )?;
            }
            Ok(())
        })
        .await?;

    let since = now - Duration::seconds(RISK_WINDOW_SECONDS);
    let breaches = {
        let conn = store.read()?;
        ingest_error::count_recent_for_account(&conn, account_id, FLOOD_WAIT_ERROR_CODE, since)?
    };

    if breaches == RISK_BREACH_THRESHOLD {
        warn!(%account_id, breaches, "account-risk threshold reached; pausing account");
        store
            .writer
            .submit(move |tx| {
                account::set_pause(tx, account_id, Some(now), Some("account-risk"), now)?;
                account_pause::record(tx, account_id, now, "account-risk", now)?;
                notification::create(
                    tx,
                    "account.risk_paused",
                    Severity::High,
                    &format!("account {} paused after {} flood-wait breaches in the last hour", account_id, breaches),
                    None,
                    now,
                )?;
                Ok(())
            })
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tca_storage::repo::channel;

    async fn memory_store() -> Store {
        let dir = std::env::temp_dir().join(format!("tca-ingest-risk-{}", uuid::Uuid::new_v4()));
        Store::open(dir.to_str().unwrap(), 2).unwrap()
    }

    async fn seed_channel(store: &Store, now: DateTime<Utc>) -> (AccountId, ChannelId) {
        let account_id = store
            .writer
            .submit(move |tx| account::create(tx, 1, b"hash", None, 1, now))
            .await
            .unwrap();
        let channel_id = store
            .writer
            .submit(move |tx| channel::create(tx, account_id, None, "100", "chan", None, now))
            .await
            .unwrap();
        (account_id, channel_id)
    }

    #[tokio::test]
    async fn single_flood_wait_pauses_only_the_channel() {
        let store = memory_store().await;
        let now = Utc::now();
        let (account_id, channel_id) = seed_channel(&store, now).await;

        handle_flood_wait(&store, account_id, channel_id, 600, now).await.unwrap();

        let conn = store.read().unwrap();
        let acc = account::get(&conn, account_id).unwrap();
        assert!(!acc.is_paused());
        store.close().await;
    }

    #[tokio::test]
    async fn third_breach_within_window_pauses_the_account_once() {
        let store = memory_store().await;
        let now = Utc::now();
        let (account_id, channel_id) = seed_channel(&store, now).await;

        for i in 0..3 {
            let at = now + Duration::seconds(i * 10);
            handle_flood_wait(&store, account_id, channel_id, 30, at).await.unwrap();
        }

        let conn = store.read().unwrap();
        let acc = account::get(&conn, account_id).unwrap();
        assert!(acc.is_paused());
        assert_eq!(acc.pause_reason.as_deref(), Some("account-risk"));

        let notifications = notification::list(&conn, true).unwrap();
        let risk_notifications = notifications.iter().filter(|n| n.notification_type == "account.risk_paused").count();
        assert_eq!(risk_notifications, 1);
        store.close().await;
    }

    #[tokio::test]
    async fn low_seconds_flood_wait_does_not_notify() {
        let store = memory_store().await;
        let now = Utc::now();
        let (account_id, channel_id) = seed_channel(&store, now).await;

        handle_flood_wait(&store, account_id, channel_id, 10, now).await.unwrap();

        let conn = store.read().unwrap();
        let notifications = notification::list(&conn, true).unwrap();
        assert!(notifications.iter().all(|n| n.notification_type != "ingest.flood_wait"));
        store.close().await;
    }

    #[tokio::test]
    async fn breaches_outside_window_do_not_count() {
        let store = memory_store().await;
        let now = Utc::now();
        let (account_id, channel_id) = seed_channel(&store, now).await;

        handle_flood_wait(&store, account_id, channel_id, 30, now - Duration::hours(2)).await.unwrap();
        handle_flood_wait(&store, account_id, channel_id, 30, now).await.unwrap();
        handle_flood_wait(&store, account_id, channel_id, 30, now).await.unwrap();

        let conn = store.read().unwrap();
        let acc = account::get(&conn, account_id).unwrap();
        assert!(!acc.is_paused());
        store.close().await;
    }
}
