//! `tca-telegram` — the upstream client contract and the errors the core
//! must recognize by kind.
//!
//! This crate deliberately carries no concrete MTProto dependency: message
//! fetching against the real Telegram network is an external collaborator
//! left unspecified here. What lives here is the trait `tca-ingest`
//! and `tca-auth` program against, plus a scriptable mock for tests.

pub mod client;
pub mod error;
pub mod mock;

pub use client::{FetchPage, UpstreamClient, UpstreamMessage};
pub use error::{Result, UpstreamError};
