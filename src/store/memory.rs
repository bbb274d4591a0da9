use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use upnext_common::progress::now_millis;
use upnext_common::{
    decide_write, ContentId, ContentType, ProgressEvent, ProgressKey, ProgressPatch,
    ProgressRecord, Result, SetOptions,
};

use super::{EventSink, ProgressMap, ProgressStore};

/// In-process progress store.
pub struct MemoryProgressStore {
    records: RwLock<ProgressMap>,
    tombstones: RwLock<HashMap<(ContentType, ContentId), i64>>,
    events: EventSink,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::with_sink(EventSink::enabled())
    }

    /// A store that cannot push updates; subscribers must poll.
    pub fn without_events() -> Self {
        Self::with_sink(EventSink::disabled())
    }

    fn with_sink(events: EventSink) -> Self {
        Self {
            records: RwLock::new(ProgressMap::new()),
            tombstones: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Seed records directly, bypassing the write rule and notifications.
    pub fn with_records(self, records: impl IntoIterator<Item = ProgressRecord>) -> Self {
        {
            let mut map = self.records.write();
            for record in records {
                map.insert(record.key(), record);
            }
        }
        self
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for MemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn get_all(&self) -> Result<ProgressMap> {
        Ok(self.records.read().clone())
    }

    async fn set(
        &self,
        key: ProgressKey,
        patch: ProgressPatch,
        options: SetOptions,
    ) -> Result<bool> {
        let record = patch.into_record(key.clone(), now_millis());

        let decision = {
            let mut records = self.records.write();
            let decision = decide_write(records.get(&key), &record, options);
            if decision.is_write() {
                records.insert(key.clone(), record);
            }
            decision
        };

        if !decision.is_write() {
            tracing::debug!(key = %key, ?decision, "Progress write rejected");
            return Ok(false);
        }

        self.events.emit(ProgressEvent::Updated(key));
        Ok(true)
    }

    async fn remove(&self, key: &ProgressKey) -> Result<bool> {
        let removed = self.records.write().remove(key).is_some();
        if removed {
            self.events.emit(ProgressEvent::Removed(key.clone()));
        }
        Ok(removed)
    }

    async fn remove_all(&self, content_type: ContentType, content_id: &ContentId) -> Result<usize> {
        let removed = {
            let mut records = self.records.write();
            let before = records.len();
            records.retain(|k, _| !(k.content_type == content_type && &k.content_id == content_id));
            before - records.len()
        };

        let now = now_millis();
        self.tombstones
            .write()
            .entry((content_type, content_id.clone()))
            .and_modify(|at| *at = (*at).max(now))
            .or_insert(now);

        if removed > 0 {
            self.events.emit(ProgressEvent::ContentRemoved {
                content_type,
                content_id: content_id.clone(),
            });
        }
        Ok(removed)
    }

    async fn tombstone(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> Result<Option<i64>> {
        Ok(self
            .tombstones
            .read()
            .get(&(content_type, content_id.clone()))
            .copied())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.events.subscribe()
    }
}
