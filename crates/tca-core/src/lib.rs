//! `tca-core` — shared configuration, error taxonomy, and id types used
//! across the aggregator workspace.
//!
//! Nothing in this crate touches storage or the network; it exists so that
//! every other crate can depend on one small, stable foundation instead of
//! redefining settings values, error kinds, or entity ids per subsystem.

pub mod config;
pub mod error;
pub mod types;

pub use config::{SettingValue, TcaConfig, UnlockMode};
pub use error::{CoreError, ErrorKind, Result};
