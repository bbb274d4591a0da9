//! Cached, coalescing metadata lookups.
//!
//! [`MetadataResolver`] combines a title's episode list and display details
//! into one [`ResolvedMetadata`]. Results are cached for a TTL, concurrent
//! lookups of the same title share one pair of provider calls, and a
//! semaphore bounds how many titles are fetched at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};
use upnext_common::{ContentId, ContentType, EpisodeRef};

use crate::config::EngineConfig;
use crate::metadata::provider::{BasicContentDetails, MetadataProvider, VideoInfo};

type CacheKey = (ContentType, ContentId);
type Lookup = Shared<BoxFuture<'static, Option<Arc<ResolvedMetadata>>>>;

/// Everything the engine needs to render rows for one title.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetadata {
    /// Sorted by season, then episode. Empty for movies.
    pub episodes: Vec<VideoInfo>,
    pub basic: BasicContentDetails,
}

impl ResolvedMetadata {
    pub fn new(mut episodes: Vec<VideoInfo>, basic: BasicContentDetails) -> Self {
        episodes.sort_by_key(VideoInfo::episode_ref);
        Self { episodes, basic }
    }

    pub fn find_episode(&self, episode: EpisodeRef) -> Option<&VideoInfo> {
        self.episodes
            .binary_search_by_key(&episode, VideoInfo::episode_ref)
            .ok()
            .map(|idx| &self.episodes[idx])
    }

    /// The episode that follows `watched`, if it has aired by `now`.
    ///
    /// Looks for the next episode of the same season first, then for the
    /// first episode of the next regular season. Season 0 holds specials and
    /// is never rolled into.
    pub fn next_released_episode(
        &self,
        watched: EpisodeRef,
        now: DateTime<Utc>,
    ) -> Option<&VideoInfo> {
        let next = match watched.next_in_season().and_then(|n| self.find_episode(n)) {
            Some(video) => video,
            None => self
                .episodes
                .iter()
                .filter(|v| v.season > watched.season && v.season > 0)
                .min_by_key(|v| v.episode_ref())?,
        };

        next.is_released(now).then_some(next)
    }
}

/// Settings for [`MetadataResolver`].
#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    pub ttl: Duration,
    pub request_timeout: Duration,
    pub max_concurrent: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        EngineConfig::default().into()
    }
}

impl From<&EngineConfig> for ResolverSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            ttl: config.metadata_ttl(),
            request_timeout: config.request_timeout(),
            max_concurrent: config.max_concurrent_lookups.max(1),
        }
    }
}

impl From<EngineConfig> for ResolverSettings {
    fn from(config: EngineConfig) -> Self {
        (&config).into()
    }
}

struct CacheEntry {
    value: Arc<ResolvedMetadata>,
    fetched_at: Instant,
}

struct Inner {
    provider: Arc<dyn MetadataProvider>,
    cache: DashMap<CacheKey, CacheEntry>,
    in_flight: Mutex<HashMap<CacheKey, Lookup>>,
    permits: Semaphore,
    settings: ResolverSettings,
}

/// Metadata lookups with a TTL cache and request coalescing.
///
/// Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct MetadataResolver {
    inner: Arc<Inner>,
}

impl MetadataResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>, settings: ResolverSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                cache: DashMap::new(),
                in_flight: Mutex::new(HashMap::new()),
                permits: Semaphore::new(settings.max_concurrent.max(1)),
                settings,
            }),
        }
    }

    /// Resolve metadata for a title.
    ///
    /// Returns `None` when either lookup fails or times out, or the provider
    /// has no display details for the title. Failures are not cached.
    pub async fn resolve(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> Option<Arc<ResolvedMetadata>> {
        let key = (content_type, content_id.clone());

        if let Some(hit) = self.inner.cached(&key) {
            return Some(hit);
        }

        let lookup = {
            let mut in_flight = self.inner.in_flight.lock();
            // A lookup may have finished between the first check and the lock.
            if let Some(hit) = self.inner.cached(&key) {
                return Some(hit);
            }
            in_flight
                .entry(key.clone())
                .or_insert_with(|| {
                    let inner = Arc::clone(&self.inner);
                    async move { inner.lookup(key).await }.boxed().shared()
                })
                .clone()
        };

        lookup.await
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.inner.cache.clear();
    }

    /// Number of cached entries, expired ones included.
    pub fn cached_len(&self) -> usize {
        self.inner.cache.len()
    }
}

impl Inner {
    fn cached(&self, key: &CacheKey) -> Option<Arc<ResolvedMetadata>> {
        let entry = self.cache.get(key)?;
        if entry.fetched_at.elapsed() < self.settings.ttl {
            Some(Arc::clone(&entry.value))
        } else {
            None
        }
    }

    async fn lookup(self: Arc<Self>, key: CacheKey) -> Option<Arc<ResolvedMetadata>> {
        let result = self.fetch(&key).await.map(Arc::new);

        if let Some(value) = &result {
            self.cache.insert(
                key.clone(),
                CacheEntry {
                    value: Arc::clone(value),
                    fetched_at: Instant::now(),
                },
            );
        }
        self.in_flight.lock().remove(&key);

        result
    }

    async fn fetch(&self, (content_type, content_id): &CacheKey) -> Option<ResolvedMetadata> {
        let _permit = self.permits.acquire().await.ok()?;
        let limit = self.settings.request_timeout;

        let (meta, basic) = tokio::join!(
            timeout(limit, self.provider.get_meta_details(*content_type, content_id)),
            timeout(
                limit,
                self.provider
                    .get_basic_content_details(*content_type, content_id)
            ),
        );

        let episodes = match meta {
            Ok(Ok(Some(meta))) => meta.videos,
            Ok(Ok(None)) => Vec::new(),
            Ok(Err(e)) => {
                tracing::warn!(content_id = %content_id, error = %e, "Meta details lookup failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(content_id = %content_id, "Meta details lookup timed out");
                return None;
            }
        };

        let basic = match basic {
            Ok(Ok(Some(basic))) => basic,
            Ok(Ok(None)) => {
                tracing::debug!(content_id = %content_id, "No display details for title");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(content_id = %content_id, error = %e, "Basic details lookup failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(content_id = %content_id, "Basic details lookup timed out");
                return None;
            }
        };

        Some(ResolvedMetadata::new(episodes, basic))
    }
}
