//! Database query modules.
//!
//! - progress: watch progress reads, guarded writes, and removal
//! - tombstones: per-title removal markers

pub mod progress;
pub mod tombstones;
