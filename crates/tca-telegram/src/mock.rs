//! A scriptable [`UpstreamClient`] backend for tests — no network calls.
//! Pre-load responses, then assert the caller reacted correctly.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::client::{FetchPage, UpstreamClient};
use crate::error::{Result, UpstreamError};

/// In-memory [`UpstreamClient`] whose behavior is entirely scripted by the
/// test that constructs it.
#[derive(Default)]
pub struct MockUpstreamClient {
    connected: bool,
    sign_in_error: Option<fn() -> UpstreamError>,
    pages: VecDeque<FetchPage>,
}

impl MockUpstreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call to `sign_in` after this returns `Err(error())`.
    pub fn fail_sign_in_with(mut self, error: fn() -> UpstreamError) -> Self {
        self.sign_in_error = Some(error);
        self
    }

    /// Queues pages to be returned by successive `fetch_messages` calls, in
    /// order. Once exhausted, `fetch_messages` returns an empty page.
    pub fn queue_page(mut self, page: FetchPage) -> Self {
        self.pages.push_back(page);
        self
    }
}

#[async_trait]
impl UpstreamClient for MockUpstreamClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send_code_request(&mut self, _phone: &str) -> Result<()> {
        Ok(())
    }

    async fn sign_in(&mut self, _phone: &str, _code: &str, _password: Option<&str>) -> Result<()> {
        if let Some(error) = self.sign_in_error {
            return Err(error());
        }
        Ok(())
    }

    async fn fetch_messages(
        &mut self,
        _upstream_channel_id: &str,
        _after_message_id: Option<u64>,
        _offset_id: Option<u64>,
        _max_messages: u32,
    ) -> Result<FetchPage> {
        if !self.connected {
            return Err(UpstreamError::NotConnected);
        }
        Ok(self.pages.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::UpstreamMessage;

    #[tokio::test]
    async fn fetch_before_connect_fails() {
        let mut client = MockUpstreamClient::new();
        let result = client.fetch_messages("123", None, None, 10).await;
        assert!(matches!(result, Err(UpstreamError::NotConnected)));
    }

    #[tokio::test]
    async fn scripted_sign_in_failure_surfaces_as_password_needed() {
        let mut client = MockUpstreamClient::new().fail_sign_in_with(|| UpstreamError::PasswordNeeded);
        let result = client.sign_in("+15551234567", "000000", None).await;
        assert!(matches!(result, Err(UpstreamError::PasswordNeeded)));
    }

    #[tokio::test]
    async fn queued_pages_are_returned_in_order() {
        let mut client = MockUpstreamClient::new()
            .queue_page(FetchPage {
                messages: vec![UpstreamMessage {
                    upstream_message_id: "1".into(),
                    payload_json: "{}".into(),
                    published_at: None,
                }],
                last_message_id: Some(1),
                next_offset_id: None,
                has_more: false,
            })
            .queue_page(FetchPage::default());
        client.connect().await.unwrap();

        let first = client.fetch_messages("123", None, None, 10).await.unwrap();
        assert_eq!(first.messages.len(), 1);

        let second = client.fetch_messages("123", Some(1), None, 10).await.unwrap();
        assert!(second.messages.is_empty());
    }
}
