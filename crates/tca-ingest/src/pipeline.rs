//! Per-poll-job orchestration (§4.5): fetch new upstream messages past
//! the channel's cursor, persist them raw, normalize each into an item, run
//! dedupe, then advance the channel's cursor and `last_success_at`.
//!
//! A failure at the fetch stage aborts the whole job — there is nothing
//! past it to normalize. A failure normalizing or deduping one message is
//! recorded as an `ingest_errors` row and the job moves on to the next
//! message; one bad payload must not stall a channel's cursor forever.

use std::sync::Arc;

use chrono::Utc;
use tca_dedupe::DedupeEngine;
use tca_storage::model::{IngestStage, PollJob};
use tca_storage::repo::{account, channel, channel_state, ingest_error, item, poll_job, raw_message};
use tca_storage::{resolver, Store};
use tca_telegram::UpstreamError;
use tracing::{info, warn};

use crate::normalize;
use crate::registry::ClientRegistry;
use crate::risk;

/// Runs one poll job end to end and always deletes it from the queue when
/// done, whether it succeeded, was skipped, or hit a recoverable error —
/// poll jobs are not retried in place; the scheduler will enqueue a fresh
/// one on the channel's next due tick.
pub async fn process_job(
    store: &Store,
    registry: &ClientRegistry,
    dedupe: &Arc<DedupeEngine>,
    job: PollJob,
) -> tca_storage::Result<()> {
    let outcome = run(store, registry, dedupe, &job).await;
    if let Err(e) = &outcome {
        warn!(job_id = job.id.0, channel_id = job.channel_id.0, "poll job failed: {e}");
    }
    store.writer.submit(move |tx| poll_job::delete(tx, job.id)).await?;
    outcome
}

async fn run(store: &Store, registry: &ClientRegistry, dedupe: &Arc<DedupeEngine>, job: &PollJob) -> tca_storage::Result<()> {
    let channel_id = job.channel_id;

    let channel = {
        let conn = store.read()?;
        match channel::get(&conn, channel_id) {
            Ok(c) => c,
            Err(_) => return Ok(()), // channel was deleted since the job was enqueued
        }
    };
    if !channel.is_enabled {
        return Ok(());
    }

    let account_id = channel.account_id;
    let account = {
        let conn = store.read()?;
        account::get(&conn, account_id)?
    };
    if account.is_paused() {
        return Ok(());
    }

    let Some(client) = registry.get(account_id) else {
        let now = Utc::now();
        store
            .writer
            .submit(move |tx| {
                ingest_error::record(
                    tx,
                    Some(channel_id),
                    IngestStage::Fetch,
                    "no_client",
                    "no connected upstream client for account",
                    None,
                    now,
                )?;
                Ok(())
            })
            .await?;
        return Ok(());
    };

    let (max_pages, max_messages, horizon_minutes) = {
        let conn = store.read()?;
        (
            resolver::resolve_max_pages_per_poll(&conn)?,
            resolver::resolve_max_messages_per_poll(&conn)?,
            resolver::resolve_dedupe_horizon_minutes(&conn, channel.group_id)?,
        )
    };

    store.writer.submit(move |tx| channel_state::ensure_row(tx, channel_id, Utc::now())).await?;
    let mut cursor = {
        let conn = store.read()?;
        channel_state::get(&conn, channel_id)?.cursor
    };

    let mut pages_fetched = 0;
    loop {
        if pages_fetched >= max_pages {
            break;
        }
        let page = {
            let mut guard = client.lock().await;
            guard
                .fetch_messages(
                    &channel.upstream_channel_id,
                    cursor.last_message_id,
                    cursor.next_offset_id,
                    max_messages as u32,
                )
                .await
        };
        pages_fetched += 1;

        let page = match page {
            Ok(page) => page,
            Err(UpstreamError::FloodWait { seconds }) => {
                risk::handle_flood_wait(store, account_id, channel_id, seconds, Utc::now()).await?;
                return Ok(());
            }
            Err(e) => {
                let now = Utc::now();
                let message = e.to_string();
                store
                    .writer
                    .submit(move |tx| {
                        ingest_error::record(tx, Some(channel_id), IngestStage::Fetch, "upstream_error", &message, None, now)?;
                        Ok(())
                    })
                    .await?;
                return Ok(());
            }
        };

        let message_count = page.messages.len();
        for message in page.messages {
            let now = Utc::now();
            let fields = normalize::normalize(&message.payload_json);
            let upstream_message_id = message.upstream_message_id.clone();
            let payload_json = message.payload_json.clone();
            let published_at = message.published_at;
            let engine = dedupe.clone();

            let result = store
                .writer
                .submit(move |tx| {
                    let raw_id = raw_message::upsert(tx, channel_id, &upstream_message_id, &payload_json, now)?;
                    let item_id = item::upsert(
                        tx,
                        item::NewItem {
                            channel_id,
                            upstream_message_id: &upstream_message_id,
                            raw_message_id: Some(raw_id),
                            published_at,
                            title: fields.title.as_deref(),
                            body: fields.body.as_deref(),
                            canonical_url: fields.canonical_url.as_deref(),
                            canonical_url_hash: fields.canonical_url_hash.as_deref(),
                            content_hash: fields.content_hash.as_deref(),
                        },
                        now,
                    )?;
                    engine
                        .process_item(tx, item_id, horizon_minutes, now)
                        .map_err(|e| match e {
                            tca_dedupe::DedupeError::Storage(se) => se,
                            other => tca_storage::StorageError::Internal(other.to_string()),
                        })?;
                    Ok(())
                })
                .await;

            if let Err(e) = result {
                let message_id = message.upstream_message_id;
                let error_message = e.to_string();
                store
                    .writer
                    .submit(move |tx| {
                        ingest_error::record(
                            tx,
                            Some(channel_id),
                            IngestStage::Dedupe,
                            "item_processing_failed",
                            &format!("message {message_id}: {error_message}"),
                            None,
                            Utc::now(),
                        )?;
                        Ok(())
                    })
                    .await?;
            }
        }

        if let Some(last_message_id) = page.last_message_id {
            cursor.last_message_id = Some(last_message_id);
        }
        cursor.next_offset_id = page.next_offset_id;
        cursor.last_polled_at = Some(Utc::now());

        let cursor_snapshot = cursor.clone();
        let now = Utc::now();
        store
            .writer
            .submit(move |tx| channel_state::advance_cursor(tx, channel_id, &cursor_snapshot, now))
            .await?;

        info!(channel_id = channel_id.0, message_count, pages_fetched, "ingest page processed");

        if !page.has_more {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tca_core::types::CorrelationId;
    use tca_storage::repo::channel as channel_repo;
    use tca_telegram::client::{FetchPage, UpstreamMessage};
    use tca_telegram::mock::MockUpstreamClient;
    use tca_telegram::UpstreamClient;

    async fn memory_store() -> Store {
        let dir = std::env::temp_dir().join(format!("tca-ingest-pipeline-{}", uuid::Uuid::new_v4()));
        Store::open(dir.to_str().unwrap(), 2).unwrap()
    }

    async fn seed(store: &Store, now: chrono::DateTime<Utc>) -> (tca_core::types::AccountId, tca_core::types::ChannelId) {
        let account_id = store.writer.submit(move |tx| account::create(tx, 1, b"hash", None, 1, now)).await.unwrap();
        let channel_id = store
            .writer
            .submit(move |tx| channel_repo::create(tx, account_id, None, "100", "chan", None, now))
            .await
            .unwrap();
        (account_id, channel_id)
    }

    #[tokio::test]
    async fn fetched_messages_become_clustered_items_and_advance_the_cursor() {
        let store = memory_store().await;
        let now = Utc::now();
        let (account_id, channel_id) = seed(&store, now).await;

        let mut client = MockUpstreamClient::new().queue_page(FetchPage {
            messages: vec![UpstreamMessage {
                upstream_message_id: "m1".into(),
                payload_json: r#"{"title":"Hello","url":"https://example.com/a"}"#.into(),
                published_at: Some(now),
            }],
            last_message_id: Some(1),
            next_offset_id: None,
            has_more: false,
        });
        client.connect().await.unwrap();
        let registry = ClientRegistry::new();
        registry.insert(account_id, Box::new(client));

        let dedupe = Arc::new(DedupeEngine::new(0.92));
        let job = PollJob {
            id: tca_core::types::PollJobId(1),
            channel_id,
            correlation_id: CorrelationId::new().to_string(),
            created_at: now,
        };

        process_job(&store, &registry, &dedupe, job).await.unwrap();

        let conn = store.read().unwrap();
        let state = channel_state::get(&conn, channel_id).unwrap();
        assert_eq!(state.cursor.last_message_id, Some(1));
        assert!(state.last_success_at.is_some());
        store.close().await;
    }

    #[tokio::test]
    async fn missing_client_records_ingest_error_and_consumes_the_job() {
        let store = memory_store().await;
        let now = Utc::now();
        let (_account_id, channel_id) = seed(&store, now).await;

        let registry = ClientRegistry::new();
        let dedupe = Arc::new(DedupeEngine::new(0.92));
        let job = PollJob {
            id: tca_core::types::PollJobId(1),
            channel_id,
            correlation_id: CorrelationId::new().to_string(),
            created_at: now,
        };

        process_job(&store, &registry, &dedupe, job).await.unwrap();

        let conn = store.read().unwrap();
        let pending = poll_job::list_pending(&conn, 10).unwrap();
        assert!(pending.is_empty());
        store.close().await;
    }
}
