//! `tca-ops` — the two ops jobs that keep the store's invariants over time
//! (§4.6): ordered retention prune and nightly backup with integrity
//! check. Neither job runs on its own schedule here — that is `tca-app`'s
//! job, calling `retention::run`/`backup::run` from its own ops loop.

pub mod backup;
pub mod error;
pub mod retention;

pub use error::{OpsError, Result};
