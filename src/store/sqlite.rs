use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::broadcast;
use upnext_common::progress::now_millis;
use upnext_common::{
    ContentId, ContentType, Error, ProgressEvent, ProgressKey, ProgressPatch, Result, SetOptions,
};
use upnext_db::pool::{get_conn, DbPool};
use upnext_db::queries::{progress, tombstones};

use super::{EventSink, ProgressMap, ProgressStore};

/// Progress store backed by the SQLite pool.
///
/// Queries are blocking and run on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteProgressStore {
    pool: DbPool,
    events: EventSink,
}

impl SqliteProgressStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            events: EventSink::enabled(),
        }
    }

    /// A store whose database is also written by other processes.
    ///
    /// Those writes cannot be observed, so no subscription is offered and the
    /// scheduler falls back to polling.
    pub fn without_events(pool: DbPool) -> Self {
        Self {
            pool,
            events: EventSink::disabled(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = get_conn(&pool)?;
            f(&*conn)
        })
        .await
        .map_err(|e| Error::internal(format!("spawn_blocking join error: {e}")))?
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn get_all(&self) -> Result<ProgressMap> {
        let records = self.with_conn(progress::list_progress).await?;
        Ok(records.into_iter().map(|r| (r.key(), r)).collect())
    }

    async fn set(
        &self,
        key: ProgressKey,
        patch: ProgressPatch,
        options: SetOptions,
    ) -> Result<bool> {
        let record = patch.into_record(key.clone(), now_millis());
        let decision = self
            .with_conn(move |conn| progress::write_progress(conn, &record, options))
            .await?;

        if !decision.is_write() {
            tracing::debug!(key = %key, ?decision, "Progress write rejected");
            return Ok(false);
        }

        self.events.emit(ProgressEvent::Updated(key));
        Ok(true)
    }

    async fn remove(&self, key: &ProgressKey) -> Result<bool> {
        let target = key.clone();
        let removed = self
            .with_conn(move |conn| progress::delete_progress(conn, &target))
            .await?;

        if removed {
            self.events.emit(ProgressEvent::Removed(key.clone()));
        }
        Ok(removed)
    }

    async fn remove_all(&self, content_type: ContentType, content_id: &ContentId) -> Result<usize> {
        let id = content_id.clone();
        let removed = self
            .with_conn(move |conn| {
                progress::delete_content(conn, content_type, &id, now_millis())
            })
            .await?;

        tracing::debug!(content_id = %content_id, removed, "Removed title progress");
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
        let id = content_id.clone();
        self.with_conn(move |conn| tombstones::get_tombstone(conn, content_type, &id))
            .await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.events.subscribe()
    }
}
