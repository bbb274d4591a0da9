//! Upnext-DB: SQLite persistence for watch progress
//!
//! This crate stores progress records and title removal tombstones using
//! rusqlite with r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Row mapping
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use upnext_common::{ContentId, ContentType, ProgressKey, ProgressPatch, SetOptions};
//! use upnext_db::pool::{get_conn, init_pool};
//! use upnext_db::queries::progress;
//!
//! let pool = init_pool("/var/lib/upnext/upnext.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let key = ProgressKey::new(ContentType::Movie, ContentId::new("tt1").unwrap(), None);
//! let record = ProgressPatch::playback(50.0, 100.0).into_record(key, 0);
//! progress::write_progress(&conn, &record, SetOptions::default()).unwrap();
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use models::Tombstone;
