//! Cinemeta metadata provider.
//!
//! Implements [`MetadataProvider`] against any Stremio-style metadata addon
//! that serves `<base>/meta/<type>/<id>.json`.
//!
//! Features:
//! - Token-bucket rate limiting via [`governor`].
//! - Retry on HTTP 429 honouring `Retry-After` (max 2 retries).
//! - 404 and `{"meta": null}` map to "unknown title".

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};
use upnext_common::{ContentId, ContentType};

use crate::metadata::provider::{BasicContentDetails, MetaDetails, MetadataProvider, VideoInfo};

const MAX_RETRIES: u32 = 2;

// ---------------------------------------------------------------------------
// Addon response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MetaResponse {
    #[serde(default)]
    meta: Option<AddonMeta>,
}

#[derive(Debug, Deserialize)]
struct AddonMeta {
    name: Option<String>,
    poster: Option<String>,
    #[serde(default)]
    videos: Vec<AddonVideo>,
}

#[derive(Debug, Deserialize)]
struct AddonVideo {
    season: Option<u32>,
    episode: Option<u32>,
    number: Option<u32>,
    released: Option<String>,
    name: Option<String>,
    title: Option<String>,
}

fn parse_released(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl AddonVideo {
    fn into_video(self) -> Option<VideoInfo> {
        Some(VideoInfo {
            season: self.season?,
            episode: self.episode.or(self.number)?,
            released: self.released.as_deref().and_then(parse_released),
            title: self
                .name
                .or(self.title)
                .filter(|n| !n.trim().is_empty()),
        })
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Stremio-addon metadata provider.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use upnext::metadata::providers::CinemetaProvider;
///
/// let provider =
///     CinemetaProvider::new("https://v3-cinemeta.strem.io", 10, Duration::from_secs(5)).unwrap();
/// ```
pub struct CinemetaProvider {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl CinemetaProvider {
    pub fn new(
        base_url: impl Into<String>,
        requests_per_second: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        let per_second = NonZeroU32::new(requests_per_second)
            .context("requests_per_second must be greater than zero")?;
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    fn meta_url(&self, content_type: ContentType, content_id: &ContentId) -> String {
        format!(
            "{}/meta/{}/{}.json",
            self.base_url,
            content_type.as_str(),
            content_id
        )
    }

    /// GET `url` with rate limiting and 429 retry. `None` on 404.
    async fn get(&self, url: &str) -> anyhow::Result<Option<reqwest::Response>> {
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("metadata request failed: {url}"))?;

            match resp.status() {
                StatusCode::NOT_FOUND => return Ok(None),
                StatusCode::TOO_MANY_REQUESTS if retries < MAX_RETRIES => {
                    retries += 1;
                    let wait = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(1);
                    warn!(retry = retries, wait_secs = wait, "Metadata addon returned 429, backing off");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                _ => {
                    let resp = resp
                        .error_for_status()
                        .with_context(|| format!("metadata request returned error: {url}"))?;
                    return Ok(Some(resp));
                }
            }
        }
    }

    async fn fetch_meta(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> anyhow::Result<Option<AddonMeta>> {
        let url = self.meta_url(content_type, content_id);
        let Some(resp) = self.get(&url).await? else {
            debug!(content_id = %content_id, "Metadata addon does not know title");
            return Ok(None);
        };

        let body: MetaResponse = resp
            .json()
            .await
            .with_context(|| format!("failed to decode metadata response: {url}"))?;
        Ok(body.meta)
    }
}

#[async_trait]
impl MetadataProvider for CinemetaProvider {
    fn name(&self) -> &'static str {
        "cinemeta"
    }

    async fn get_meta_details(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> anyhow::Result<Option<MetaDetails>> {
        let meta = self.fetch_meta(content_type, content_id).await?;
        Ok(meta.map(|meta| {
            let mut videos: Vec<VideoInfo> = meta
                .videos
                .into_iter()
                .filter_map(AddonVideo::into_video)
                .collect();
            videos.sort_by_key(VideoInfo::episode_ref);
            MetaDetails { videos }
        }))
    }

    async fn get_basic_content_details(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> anyhow::Result<Option<BasicContentDetails>> {
        let meta = self.fetch_meta(content_type, content_id).await?;
        Ok(meta.and_then(|meta| {
            let name = meta.name.filter(|n| !n.trim().is_empty())?;
            Some(BasicContentDetails {
                name,
                poster: meta.poster,
            })
        }))
    }
}
