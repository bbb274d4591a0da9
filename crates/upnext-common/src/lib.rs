//! Upnext-Common: Shared types, rules, and errors.
//!
//! This crate provides the vocabulary shared by the upnext store, engine and
//! CLI:
//!
//! - **Identifiers**: [`ContentId`], an opaque, non-empty title id
//! - **Core Types**: progress records, composite keys, continue-watching rows
//! - **Progress Rules**: completion math and the last-write-wins decision
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use upnext_common::{ContentId, ContentType, ProgressKey, ProgressPatch};
//!
//! let key = ProgressKey::new(
//!     ContentType::Series,
//!     ContentId::new("tt0108778").unwrap(),
//!     Some("tt0108778:1:1".into()),
//! );
//! let record = ProgressPatch::playback(750.0, 1500.0).into_record(key, 0);
//! assert_eq!(record.progress_percent(), 50.0);
//! ```

pub mod error;
pub mod ids;
pub mod progress;
pub mod types;

pub use error::{Error, Result};
pub use ids::ContentId;
pub use progress::{decide_write, WriteDecision, DEFAULT_COMPLETION_THRESHOLD};
pub use types::*;
pub use upnext_parser::{format_episode_key, parse_episode_key, EpisodeRef};
