//! Upnext - watch-progress aggregation and next-episode engine
//!
//! This library crate exposes the engine for the CLI and for integration
//! testing.

pub mod config;
pub mod continue_watching;
pub mod history;
pub mod metadata;
pub mod refresh;
pub mod store;
