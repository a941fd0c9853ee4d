//! `tca-ingest` — the fetch→persist→normalize→dedupe pipeline that
//! consumes poll jobs enqueued by `tca-scheduler` (§4.5), plus the
//! flood-wait and account-risk escalation that can arise mid-pipeline
//! (§7).
//!
//! This crate owns no connections itself: `ClientRegistry` is filled in by
//! the caller with whatever upstream clients are already connected, and
//! [`worker::IngestWorker`] just drains `poll_jobs` against it.

pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod risk;
pub mod worker;

pub use error::{IngestError, Result};
pub use registry::ClientRegistry;
pub use worker::{IngestWorker, WorkerHandle};
