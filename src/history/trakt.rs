//! Trakt watch-history client.
//!
//! Talks to the Trakt v2 API with an application client id and a user's
//! OAuth bearer token.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use upnext_common::{ContentId, ContentType, EpisodeRef};

use crate::config::TraktConfig;
use crate::history::client::{HistoryClient, ShowIds, WatchedEpisode};

const API_VERSION: &str = "2";

// ---------------------------------------------------------------------------
// Trakt API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct TraktIds {
    trakt: Option<u64>,
    imdb: Option<String>,
    tmdb: Option<u64>,
}

impl From<TraktIds> for ShowIds {
    fn from(ids: TraktIds) -> Self {
        Self {
            imdb: ids.imdb,
            tmdb: ids.tmdb,
            trakt: ids.trakt,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TraktMedia {
    #[serde(default)]
    ids: TraktIds,
}

#[derive(Debug, Deserialize)]
struct TraktEpisode {
    season: u32,
    number: u32,
}

#[derive(Debug, Deserialize)]
struct HistoryItem {
    watched_at: String,
    episode: Option<TraktEpisode>,
    show: Option<TraktMedia>,
}

#[derive(Debug, Deserialize)]
struct PlaybackItem {
    id: u64,
    episode: Option<TraktEpisode>,
    show: Option<TraktMedia>,
    movie: Option<TraktMedia>,
}

impl HistoryItem {
    fn into_event(self) -> Option<WatchedEpisode> {
        let watched_at = DateTime::parse_from_rfc3339(&self.watched_at)
            .ok()?
            .timestamp_millis();
        let episode = self.episode?;
        Some(WatchedEpisode {
            show: self.show?.ids.into(),
            episode: EpisodeRef::new(episode.season, episode.number),
            watched_at,
        })
    }
}

impl PlaybackItem {
    fn matches(
        &self,
        content_id: &ContentId,
        content_type: ContentType,
        episode: Option<EpisodeRef>,
    ) -> bool {
        let media = match content_type {
            ContentType::Movie => self.movie.as_ref(),
            ContentType::Series => self.show.as_ref(),
        };
        let Some(media) = media else {
            return false;
        };

        let ids = ShowIds {
            imdb: media.ids.imdb.clone(),
            tmdb: media.ids.tmdb,
            trakt: media.ids.trakt,
        };
        if !ids.matches(content_id) {
            return false;
        }

        match (episode, &self.episode) {
            (Some(wanted), Some(ep)) => wanted == EpisodeRef::new(ep.season, ep.number),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Trakt API client.
pub struct TraktClient {
    client: Client,
    base_url: String,
    client_id: String,
    access_token: Option<String>,
}

impl TraktClient {
    pub fn new(config: &TraktConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        let client_id = config
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .context("Trakt client_id is not configured")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id,
            access_token: config.access_token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header("Content-Type", "application/json")
            .header("trakt-api-version", API_VERSION)
            .header("trakt-api-key", &self.client_id);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .request(reqwest::Method::GET, path)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", path))?
            .error_for_status()
            .with_context(|| format!("Trakt returned error for {}", path))?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to decode Trakt response for {}", path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, path)
            .send()
            .await
            .with_context(|| format!("Failed to DELETE {}", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to DELETE {}: {} {}", path, status, error);
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryClient for TraktClient {
    fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    async fn get_watched_episodes_history(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<WatchedEpisode>> {
        let items: Vec<HistoryItem> = self
            .get_json(
                "/sync/history/episodes",
                &[("page", page.to_string()), ("limit", page_size.to_string())],
            )
            .await?;

        let total = items.len();
        let events: Vec<_> = items.into_iter().filter_map(HistoryItem::into_event).collect();
        if events.len() < total {
            tracing::debug!(skipped = total - events.len(), "Skipped malformed history events");
        }
        Ok(events)
    }

    async fn delete_playback_for_content(
        &self,
        content_id: &ContentId,
        content_type: ContentType,
        episode: Option<EpisodeRef>,
    ) -> Result<()> {
        let path = match content_type {
            ContentType::Movie => "/sync/playback/movies",
            ContentType::Series => "/sync/playback/episodes",
        };
        let items: Vec<PlaybackItem> = self.get_json(path, &[]).await?;

        for item in items
            .iter()
            .filter(|item| item.matches(content_id, content_type, episode))
        {
            self.delete(&format!("/sync/playback/{}", item.id)).await?;
            tracing::debug!(content_id = %content_id, playback_id = item.id, "Deleted remote playback");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TraktClient {
        let config = TraktConfig {
            enabled: true,
            client_id: Some("client".into()),
            access_token: Some("token".into()),
            base_url: server.uri(),
        };
        TraktClient::new(&config, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn requires_client_id() {
        let config = TraktConfig::default();
        assert!(TraktClient::new(&config, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn unauthenticated_without_token() {
        let config = TraktConfig {
            client_id: Some("client".into()),
            ..Default::default()
        };
        let client = TraktClient::new(&config, Duration::from_secs(1)).unwrap();
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn fetches_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sync/history/episodes"))
            .and(query_param("page", "1"))
            .and(query_param("limit", "200"))
            .and(header("trakt-api-version", "2"))
            .and(header("trakt-api-key", "client"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": 1,
                    "watched_at": "1970-01-01T00:00:00.500Z",
                    "action": "watch",
                    "type": "episode",
                    "episode": { "season": 2, "number": 3, "title": "Three" },
                    "show": { "title": "Show", "ids": { "trakt": 9, "imdb": "tt3", "tmdb": 33 } }
                },
                {
                    "id": 2,
                    "watched_at": "garbage",
                    "type": "episode",
                    "episode": { "season": 1, "number": 1 },
                    "show": { "ids": { "imdb": "tt4" } }
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let events = client(&server)
            .get_watched_episodes_history(1, 200)
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].episode, EpisodeRef::new(2, 3));
        assert_eq!(events[0].watched_at, 500);
        assert_eq!(events[0].show.content_id().unwrap().as_str(), "tt3");
    }

    #[tokio::test]
    async fn deletes_matching_playback_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sync/playback/episodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": 11, "type": "episode", "progress": 40.0,
                    "episode": { "season": 1, "number": 2 },
                    "show": { "ids": { "imdb": "tt2" } }
                },
                {
                    "id": 12, "type": "episode", "progress": 10.0,
                    "episode": { "season": 1, "number": 3 },
                    "show": { "ids": { "imdb": "tt2" } }
                },
                {
                    "id": 13, "type": "episode", "progress": 10.0,
                    "episode": { "season": 1, "number": 2 },
                    "show": { "ids": { "imdb": "tt99" } }
                }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/sync/playback/11"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .delete_playback_for_content(
                &ContentId::new("tt2").unwrap(),
                ContentType::Series,
                Some(EpisodeRef::new(1, 2)),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn history_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(client(&server)
            .get_watched_episodes_history(1, 10)
            .await
            .is_err());
    }
}
