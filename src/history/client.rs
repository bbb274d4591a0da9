//! Remote watch-history collaborator.

use async_trait::async_trait;
use upnext_common::{ContentId, ContentType, EpisodeRef};

/// External ids of a show as reported by the history service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowIds {
    pub imdb: Option<String>,
    pub tmdb: Option<u64>,
    pub trakt: Option<u64>,
}

impl ShowIds {
    /// Content id used for local progress: the IMDb id, else `tmdb:<id>`.
    pub fn content_id(&self) -> Option<ContentId> {
        if let Some(imdb) = self.imdb.as_deref().filter(|s| !s.trim().is_empty()) {
            return ContentId::new(imdb).ok();
        }
        self.tmdb.and_then(|id| ContentId::new(format!("tmdb:{id}")).ok())
    }

    /// Whether these ids identify `content_id`.
    pub fn matches(&self, content_id: &ContentId) -> bool {
        self.content_id().as_ref() == Some(content_id)
    }
}

/// One "episode watched" event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEpisode {
    pub show: ShowIds,
    pub episode: EpisodeRef,
    /// Epoch milliseconds.
    pub watched_at: i64,
}

/// Remote watch-history service.
#[async_trait]
pub trait HistoryClient: Send + Sync {
    /// Whether a signed-in account is available. When `false` the remote
    /// merge is skipped.
    fn is_authenticated(&self) -> bool;

    /// Most recent episode-watched events, newest first. Pages start at 1.
    async fn get_watched_episodes_history(
        &self,
        page: u32,
        page_size: u32,
    ) -> anyhow::Result<Vec<WatchedEpisode>>;

    /// Delete the remote resume point of a title, or of one episode.
    async fn delete_playback_for_content(
        &self,
        content_id: &ContentId,
        content_type: ContentType,
        episode: Option<EpisodeRef>,
    ) -> anyhow::Result<()>;
}
