//! Trait definition and types for metadata providers.
//!
//! A provider answers two questions about a title: which episodes exist and
//! when they air ([`MetaDetails`]), and how to display it
//! ([`BasicContentDetails`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use upnext_common::{ContentId, ContentType, EpisodeRef};

/// One entry of a title's episode list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub season: u32,
    pub episode: u32,
    /// Air date. Unknown dates count as not yet released.
    pub released: Option<DateTime<Utc>>,
    pub title: Option<String>,
}

impl VideoInfo {
    pub fn episode_ref(&self) -> EpisodeRef {
        EpisodeRef::new(self.season, self.episode)
    }

    /// Whether the episode aired at or before `now`.
    pub fn is_released(&self, now: DateTime<Utc>) -> bool {
        self.released.is_some_and(|released| released <= now)
    }
}

/// Episode list of a title. Empty for movies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaDetails {
    pub videos: Vec<VideoInfo>,
}

/// Display information for a title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicContentDetails {
    pub name: String,
    pub poster: Option<String>,
}

/// Async trait that metadata backends implement.
///
/// `Ok(None)` means the backend does not know the title; errors are
/// transport or decoding failures.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short, lowercase identifier (e.g. `"cinemeta"`).
    fn name(&self) -> &'static str;

    async fn get_meta_details(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> anyhow::Result<Option<MetaDetails>>;

    async fn get_basic_content_details(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> anyhow::Result<Option<BasicContentDetails>>;
}
