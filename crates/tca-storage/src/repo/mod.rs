//! Typed repositories, one module per entity family from the data model.
//!
//! Every write-side function takes `&rusqlite::Transaction` and is meant to
//! be called from inside a closure submitted to the [`crate::writer::WriterQueue`];
//! read-side functions take `&rusqlite::Connection` and are meant to be
//! called against a connection borrowed from the [`crate::pool::ReadPool`].
//! `Transaction` derefs to `Connection`, so read functions also work
//! unchanged inside a writer closure when a write needs to look something
//! up first.

pub mod account;
pub mod account_pause;
pub mod auth_session_state;
pub mod channel;
pub mod channel_state;
pub mod cluster;
pub mod decision;
pub mod group;
pub mod ingest_error;
pub mod item;
pub mod key_rotation_state;
pub mod member;
pub mod notification;
pub mod poll_job;
pub mod raw_message;
pub mod setting;
