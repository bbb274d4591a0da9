//! Shared test harness for integration tests.
//!
//! Provides stub collaborators with call counters and [`TestHarness`], which
//! wires a counting in-memory progress store, a stub metadata provider and an
//! optional stub history client into a [`ContinueWatchingEngine`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use upnext::continue_watching::{ContinueWatchingEngine, EngineSettings};
use upnext::history::{HistoryClient, ShowIds, WatchedEpisode};
use upnext::metadata::{
    BasicContentDetails, MetaDetails, MetadataProvider, MetadataResolver, ResolverSettings,
    VideoInfo,
};
use upnext::store::{MemoryProgressStore, ProgressMap, ProgressStore};
use upnext_common::{
    ContentId, ContentType, EpisodeRef, Error, ProgressEvent, ProgressKey, ProgressOrigin,
    ProgressPatch, ProgressRecord, Result, SetOptions,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn id(raw: &str) -> ContentId {
    ContentId::new(raw).unwrap()
}

/// A locally written record.
pub fn record(
    content_type: ContentType,
    content_id: &str,
    episode_key: Option<&str>,
    current_time: f64,
    duration: f64,
    last_updated: i64,
) -> ProgressRecord {
    ProgressRecord {
        content_type,
        content_id: id(content_id),
        episode_key: episode_key.map(str::to_string),
        current_time,
        duration,
        last_updated,
        origin: ProgressOrigin::Local,
        synced_at: None,
    }
}

pub fn movie_key(content_id: &str) -> ProgressKey {
    ProgressKey::new(ContentType::Movie, id(content_id), None)
}

pub fn episode_key(content_id: &str, key: &str) -> ProgressKey {
    ProgressKey::new(ContentType::Series, id(content_id), Some(key.to_string()))
}

/// An episode that aired `days` days ago.
pub fn aired(season: u32, episode: u32, days: i64) -> VideoInfo {
    VideoInfo {
        season,
        episode,
        released: Some(Utc::now() - chrono::Duration::days(days)),
        title: None,
    }
}

/// An episode that airs in the future.
pub fn upcoming(season: u32, episode: u32) -> VideoInfo {
    VideoInfo {
        season,
        episode,
        released: Some(Utc::now() + chrono::Duration::days(30)),
        title: None,
    }
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn watched(imdb: &str, season: u32, episode: u32, watched_at: i64) -> WatchedEpisode {
    WatchedEpisode {
        show: ShowIds {
            imdb: Some(imdb.to_string()),
            ..Default::default()
        },
        episode: EpisodeRef::new(season, episode),
        watched_at,
    }
}

// ---------------------------------------------------------------------------
// Progress store
// ---------------------------------------------------------------------------

/// [`MemoryProgressStore`] that counts reads and can be told to fail them.
pub struct CountingStore {
    inner: MemoryProgressStore,
    get_all_calls: AtomicUsize,
    set_calls: AtomicUsize,
    fail_reads: AtomicBool,
}

impl CountingStore {
    pub fn new(inner: MemoryProgressStore) -> Self {
        Self {
            inner,
            get_all_calls: AtomicUsize::new(0),
            set_calls: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn get_all_calls(&self) -> usize {
        self.get_all_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl ProgressStore for CountingStore {
    async fn get_all(&self) -> Result<ProgressMap> {
        self.get_all_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::database("store unavailable"));
        }
        self.inner.get_all().await
    }

    async fn set(&self, key: ProgressKey, patch: ProgressPatch, options: SetOptions) -> Result<bool> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, patch, options).await
    }

    async fn remove(&self, key: &ProgressKey) -> Result<bool> {
        self.inner.remove(key).await
    }

    async fn remove_all(&self, content_type: ContentType, content_id: &ContentId) -> Result<usize> {
        self.inner.remove_all(content_type, content_id).await
    }

    async fn tombstone(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> Result<Option<i64>> {
        self.inner.tombstone(content_type, content_id).await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.inner.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Metadata provider
// ---------------------------------------------------------------------------

struct StubTitle {
    videos: Option<Vec<VideoInfo>>,
    basic: BasicContentDetails,
}

/// Metadata provider serving canned titles.
#[derive(Default)]
pub struct StubProvider {
    titles: Mutex<HashMap<String, StubTitle>>,
    meta_calls: AtomicUsize,
    basic_calls: AtomicUsize,
    delay: Option<Duration>,
    failing: AtomicBool,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn movie(self, content_id: &str, name: &str) -> Self {
        self.insert(content_id, name, None);
        self
    }

    pub fn series(self, content_id: &str, name: &str, videos: Vec<VideoInfo>) -> Self {
        self.insert(content_id, name, Some(videos));
        self
    }

    fn insert(&self, content_id: &str, name: &str, videos: Option<Vec<VideoInfo>>) {
        self.titles.lock().insert(
            content_id.to_string(),
            StubTitle {
                videos,
                basic: BasicContentDetails {
                    name: name.to_string(),
                    poster: Some(format!("https://img.example/{content_id}.jpg")),
                },
            },
        );
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn meta_calls(&self) -> usize {
        self.meta_calls.load(Ordering::SeqCst)
    }

    pub fn basic_calls(&self) -> usize {
        self.basic_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) -> anyhow::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("metadata backend unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn get_meta_details(
        &self,
        _content_type: ContentType,
        content_id: &ContentId,
    ) -> anyhow::Result<Option<MetaDetails>> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        Ok(self
            .titles
            .lock()
            .get(content_id.as_str())
            .and_then(|t| t.videos.clone())
            .map(|videos| MetaDetails { videos }))
    }

    async fn get_basic_content_details(
        &self,
        _content_type: ContentType,
        content_id: &ContentId,
    ) -> anyhow::Result<Option<BasicContentDetails>> {
        self.basic_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        Ok(self
            .titles
            .lock()
            .get(content_id.as_str())
            .map(|t| t.basic.clone()))
    }
}

// ---------------------------------------------------------------------------
// History client
// ---------------------------------------------------------------------------

/// A recorded `delete_playback_for_content` call.
pub type DeletedPlayback = (ContentId, ContentType, Option<EpisodeRef>);

/// Remote history serving canned events.
pub struct StubHistory {
    authenticated: AtomicBool,
    events: Mutex<Vec<WatchedEpisode>>,
    history_calls: AtomicUsize,
    deleted: Mutex<Vec<DeletedPlayback>>,
}

impl StubHistory {
    pub fn new(events: Vec<WatchedEpisode>) -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            events: Mutex::new(events),
            history_calls: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn signed_out() -> Self {
        let history = Self::new(Vec::new());
        history.authenticated.store(false, Ordering::SeqCst);
        history
    }

    pub fn push(&self, event: WatchedEpisode) {
        self.events.lock().push(event);
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<DeletedPlayback> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl HistoryClient for StubHistory {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn get_watched_episodes_history(
        &self,
        _page: u32,
        page_size: u32,
    ) -> anyhow::Result<Vec<WatchedEpisode>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .events
            .lock()
            .iter()
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn delete_playback_for_content(
        &self,
        content_id: &ContentId,
        content_type: ContentType,
        episode: Option<EpisodeRef>,
    ) -> anyhow::Result<()> {
        self.deleted
            .lock()
            .push((content_id.clone(), content_type, episode));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// An engine over stub collaborators, with handles to each of them.
pub struct TestHarness {
    pub store: Arc<CountingStore>,
    pub provider: Arc<StubProvider>,
    pub history: Option<Arc<StubHistory>>,
    pub engine: Arc<ContinueWatchingEngine>,
}

impl TestHarness {
    /// Local-only engine.
    pub fn new(store: MemoryProgressStore, provider: StubProvider) -> Self {
        Self::build(store, provider, None)
    }

    /// Engine with remote history.
    pub fn with_history(
        store: MemoryProgressStore,
        provider: StubProvider,
        history: StubHistory,
    ) -> Self {
        Self::build(store, provider, Some(history))
    }

    fn build(
        store: MemoryProgressStore,
        provider: StubProvider,
        history: Option<StubHistory>,
    ) -> Self {
        let store = Arc::new(CountingStore::new(store));
        let provider = Arc::new(provider);
        let history = history.map(Arc::new);

        let resolver = MetadataResolver::new(
            Arc::clone(&provider) as Arc<dyn MetadataProvider>,
            ResolverSettings::default(),
        );
        let engine = ContinueWatchingEngine::new(
            Arc::clone(&store) as Arc<dyn ProgressStore>,
            resolver,
            history
                .as_ref()
                .map(|h| Arc::clone(h) as Arc<dyn HistoryClient>),
            EngineSettings::default(),
        );

        Self {
            store,
            provider,
            history,
            engine: Arc::new(engine),
        }
    }

    pub fn history(&self) -> &StubHistory {
        self.history.as_deref().expect("harness has no history client")
    }
}
