//! `tca-dedupe` — the strategy chain that decides whether a newly
//! normalized item is a duplicate of something already seen, and the
//! cluster-membership/representative bookkeeping that follows from that
//! decision (§4.5).
//!
//! Nothing here talks to the writer queue directly: [`engine::DedupeEngine`]
//! takes a live `&rusqlite::Transaction`, so `tca-ingest` controls exactly
//! which writer-queue submission each item's dedupe pass lands in.

pub mod blocking;
pub mod contract;
pub mod engine;
pub mod error;
pub mod representative;
pub mod strategies;

pub use engine::{DedupeEngine, Disposition};
pub use error::{DedupeError, Result};
