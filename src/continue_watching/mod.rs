//! Continue-watching aggregation.
//!
//! [`aggregate`] holds the pure per-title rules; [`engine`] runs a full
//! refresh cycle against the store, metadata and remote history.

pub mod aggregate;
pub mod engine;

pub use aggregate::{group_records, ContentGroup};
pub use engine::{ContinueWatchingEngine, EngineSettings, EngineState, Phase};
