//! `tca-scheduler` — the channel-polling scheduler (§4.4).
//!
//! A cooperative `tokio` loop against a `tokio::sync::watch` stop signal.
//! Each tick lists schedulable channels, loads their polling
//! state, applies jitter, and enqueues a `poll_jobs` row for every channel
//! that is due. It never fetches messages or runs dedupe itself — that is
//! `tca-ingest`'s job, consuming the rows this crate writes.

pub mod engine;
pub mod error;
pub mod jitter;
pub mod schedule;

pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use jitter::{JitterSource, RandJitter};
