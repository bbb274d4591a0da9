//! Remote history merge.
//!
//! Turns the latest watched episode of each show into a synthetic local
//! progress record and, when the following episode has aired, an up-next
//! candidate row.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use upnext_common::{
    format_episode_key, parse_episode_key, ContentId, ContentType, ContinueWatchingRow,
    EpisodeRef, ProgressKey, ProgressOrigin, ProgressPatch, SetOptions,
};

use crate::continue_watching::aggregate::up_next_row;
use crate::history::client::{HistoryClient, WatchedEpisode};
use crate::metadata::MetadataResolver;
use crate::store::{ProgressMap, ProgressStore};

/// The newest watched episode of one show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestWatch {
    pub content_id: ContentId,
    pub episode: EpisodeRef,
    pub watched_at: i64,
}

/// Reduce history events to the newest watch per show.
///
/// Ordering is by `watched_at`, never by position in the event list; equal
/// timestamps keep the higher episode. Events without a usable show id are
/// dropped. The result is ordered by first appearance.
pub fn latest_per_show(events: impl IntoIterator<Item = WatchedEpisode>) -> Vec<LatestWatch> {
    let mut order: Vec<ContentId> = Vec::new();
    let mut latest: HashMap<ContentId, LatestWatch> = HashMap::new();

    for event in events {
        let Some(content_id) = event.show.content_id() else {
            tracing::debug!(?event.show, "History event without usable show id");
            continue;
        };

        let candidate = LatestWatch {
            content_id: content_id.clone(),
            episode: event.episode,
            watched_at: event.watched_at,
        };

        match latest.get_mut(&content_id) {
            Some(current) => {
                if (candidate.watched_at, candidate.episode) > (current.watched_at, current.episode) {
                    *current = candidate;
                }
            }
            None => {
                order.push(content_id.clone());
                latest.insert(content_id, candidate);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| latest.remove(&id))
        .collect()
}

/// Pulls remote history and merges it into local progress.
pub struct HistoryMerger {
    client: Arc<dyn HistoryClient>,
    store: Arc<dyn ProgressStore>,
    resolver: MetadataResolver,
    page_size: u32,
    completion_threshold: f64,
}

impl HistoryMerger {
    pub fn new(
        client: Arc<dyn HistoryClient>,
        store: Arc<dyn ProgressStore>,
        resolver: MetadataResolver,
        page_size: u32,
        completion_threshold: f64,
    ) -> Self {
        Self {
            client,
            store,
            resolver,
            page_size,
            completion_threshold,
        }
    }

    /// Run one merge and return the up-next candidates it produced.
    ///
    /// All synthetic writes have completed when this returns. Failures are
    /// logged and isolated per show; an unauthenticated client is a no-op.
    pub async fn run(&self, now: DateTime<Utc>) -> Vec<ContinueWatchingRow> {
        if !self.client.is_authenticated() {
            tracing::debug!("Remote history not authenticated, skipping merge");
            return Vec::new();
        }

        let events = match self
            .client
            .get_watched_episodes_history(1, self.page_size)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch remote history");
                return Vec::new();
            }
        };

        let local = match self.store.get_all().await {
            Ok(local) => local,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read progress before history merge");
                return Vec::new();
            }
        };

        let shows = latest_per_show(events);
        tracing::debug!(shows = shows.len(), "Merging remote history");

        let merges: Vec<_> = shows
            .iter()
            .map(|watch| self.merge_show(watch, &local, now))
            .collect();
        join_all(merges).await.into_iter().flatten().collect()
    }

    async fn merge_show(
        &self,
        watch: &LatestWatch,
        local: &ProgressMap,
        now: DateTime<Utc>,
    ) -> Option<ContinueWatchingRow> {
        let id = &watch.content_id;

        match self.store.tombstone(ContentType::Series, id).await {
            Ok(Some(removed_at)) if watch.watched_at <= removed_at => {
                tracing::debug!(content_id = %id, "History predates removal, ignoring");
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(content_id = %id, error = %e, "Failed to read removal tombstone");
                return None;
            }
        }

        self.write_synthetic(watch, local).await;

        let meta = self.resolver.resolve(ContentType::Series, id).await?;
        let next = meta.next_released_episode(watch.episode, now)?;
        Some(up_next_row(id, &meta, next, watch.watched_at))
    }

    /// Persist the watched episode as finished, unless local progress for it
    /// already counts as finished.
    async fn write_synthetic(&self, watch: &LatestWatch, local: &ProgressMap) {
        let existing = local.values().find(|r| {
            r.content_type == ContentType::Series
                && r.content_id == watch.content_id
                && r.episode_key.as_deref().and_then(parse_episode_key) == Some(watch.episode)
        });

        if existing.is_some_and(|r| r.is_finished(self.completion_threshold)) {
            return;
        }

        // Reuse the local key encoding so the episode keeps a single record.
        let episode_key = existing
            .and_then(|r| r.episode_key.clone())
            .unwrap_or_else(|| format_episode_key(watch.content_id.as_str(), watch.episode));
        let key = ProgressKey::new(
            ContentType::Series,
            watch.content_id.clone(),
            Some(episode_key),
        );
        let patch = ProgressPatch {
            current_time: 1.0,
            duration: 1.0,
            last_updated: Some(watch.watched_at),
            origin: ProgressOrigin::RemoteHistory,
        };

        match self.store.set(key, patch, SetOptions::default()).await {
            Ok(true) => tracing::debug!(
                content_id = %watch.content_id,
                episode = %watch.episode,
                "Synced watched episode from history"
            ),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                content_id = %watch.content_id,
                error = %e,
                "Failed to persist synced episode"
            ),
        }
    }
}
