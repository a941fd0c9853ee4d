//! Holds the connected upstream client for each account.
//!
//! Mirrors the gateway's own `DashMap`-of-connections shape (its
//! `ws_clients`/`channel_senders` maps): a flat concurrent map keyed by
//! owner id, filled in by startup and drained/cleared on shutdown.
//! `tca-ingest` never constructs a client itself — connecting (and the
//! credential/session decrypt that requires) is the caller's job; this
//! registry just holds whatever is already connected.

use std::sync::Arc;

use dashmap::DashMap;
use tca_core::types::AccountId;
use tca_telegram::UpstreamClient;
use tokio::sync::Mutex;

pub type SharedClient = Arc<Mutex<Box<dyn UpstreamClient>>>;

#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<AccountId, SharedClient>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account_id: AccountId, client: Box<dyn UpstreamClient>) {
        self.clients.insert(account_id, Arc::new(Mutex::new(client)));
    }

    pub fn get(&self, account_id: AccountId) -> Option<SharedClient> {
        self.clients.get(&account_id).map(|entry| entry.clone())
    }

    pub fn remove(&self, account_id: AccountId) -> Option<SharedClient> {
        self.clients.remove(&account_id).map(|(_, client)| client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tca_telegram::mock::MockUpstreamClient;

    #[test]
    fn insert_then_get_returns_the_same_client() {
        let registry = ClientRegistry::new();
        registry.insert(AccountId(1), Box::new(MockUpstreamClient::new()));
        assert!(registry.get(AccountId(1)).is_some());
        assert!(registry.get(AccountId(2)).is_none());
    }

    #[test]
    fn remove_drops_the_entry() {
        let registry = ClientRegistry::new();
        registry.insert(AccountId(1), Box::new(MockUpstreamClient::new()));
        assert!(registry.remove(AccountId(1)).is_some());
        assert!(registry.get(AccountId(1)).is_none());
    }
}
