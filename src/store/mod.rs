//! Progress store adapters.
//!
//! The engine reads and writes watch progress through the [`ProgressStore`]
//! trait. Two backends are provided:
//!
//! - [`SqliteProgressStore`]: durable storage on top of `upnext-db`
//! - [`MemoryProgressStore`]: an in-process map, used by tests and embedders
//!
//! Both enforce the same write rule (see [`upnext_common::decide_write`]) and
//! announce successful writes on a broadcast channel.

mod memory;
mod sqlite;

pub use memory::MemoryProgressStore;
pub use sqlite::SqliteProgressStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::broadcast;
use upnext_common::{
    ContentId, ContentType, ProgressEvent, ProgressKey, ProgressPatch, ProgressRecord, Result,
    SetOptions,
};

/// All stored records, keyed by their composite key.
///
/// `ProgressKey`'s `Display` renders the persisted `type:id[:episodeKey]` form.
pub type ProgressMap = BTreeMap<ProgressKey, ProgressRecord>;

/// Capacity of the update broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Persisted playback positions.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Snapshot of every record.
    async fn get_all(&self) -> Result<ProgressMap>;

    /// Write `patch` under `key`.
    ///
    /// Returns `false` when the write lost to the stored record, in which
    /// case nothing is emitted.
    async fn set(&self, key: ProgressKey, patch: ProgressPatch, options: SetOptions)
        -> Result<bool>;

    /// Remove one record. Without an episode key only the movie/no-episode
    /// entry is touched.
    async fn remove(&self, key: &ProgressKey) -> Result<bool>;

    /// Remove every record of a title and stamp its removal tombstone.
    async fn remove_all(&self, content_type: ContentType, content_id: &ContentId)
        -> Result<usize>;

    /// When the title was last removed with [`remove_all`](Self::remove_all).
    async fn tombstone(&self, content_type: ContentType, content_id: &ContentId)
        -> Result<Option<i64>>;

    /// Subscribe to write notifications.
    ///
    /// `None` means this store cannot push updates and callers should poll.
    fn subscribe(&self) -> Option<broadcast::Receiver<ProgressEvent>>;
}

/// Optional broadcast sender shared by the store implementations.
#[derive(Debug, Clone)]
pub(crate) struct EventSink(Option<broadcast::Sender<ProgressEvent>>);

impl EventSink {
    pub(crate) fn enabled() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self(Some(tx))
    }

    pub(crate) fn disabled() -> Self {
        Self(None)
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.0 {
            // No receivers is not an error.
            let _ = tx.send(event);
        }
    }

    pub(crate) fn subscribe(&self) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.0.as_ref().map(broadcast::Sender::subscribe)
    }
}
