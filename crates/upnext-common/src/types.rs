//! Core type definitions for watch progress and continue-watching rows.
//!
//! Enums serialize in lowercase so persisted keys and JSON output stay
//! compatible with the `type:contentId[:episodeKey]` layout used by
//! already-stored progress.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::ContentId;
use crate::progress;

/// Kind of title a progress record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// A single movie.
    Movie,
    /// An episodic series.
    Series,
}

impl ContentType {
    /// Lowercase wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "series" | "show" | "tv" => Ok(Self::Series),
            other => Err(Error::invalid_input(format!("unknown content type: {other}"))),
        }
    }
}

/// Where a progress record came from.
///
/// Records synthesized from remote history are tagged so a later sync never
/// mistakes them for local playback and re-uploads or overwrites them in a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressOrigin {
    /// Written by local playback.
    #[default]
    Local,
    /// Synthesized from a remote watch-history event.
    RemoteHistory,
}

impl ProgressOrigin {
    /// Storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::RemoteHistory => "remote_history",
        }
    }
}

impl fmt::Display for ProgressOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressOrigin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Self::Local),
            "remote_history" => Ok(Self::RemoteHistory),
            other => Err(Error::invalid_input(format!("unknown progress origin: {other}"))),
        }
    }
}

/// Composite identity of a progress record: `(type, contentId, episodeKey?)`.
///
/// The store holds at most one record per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgressKey {
    pub content_type: ContentType,
    pub content_id: ContentId,
    pub episode_key: Option<String>,
}

impl ProgressKey {
    pub fn new(
        content_type: ContentType,
        content_id: ContentId,
        episode_key: Option<String>,
    ) -> Self {
        Self {
            content_type,
            content_id,
            episode_key: episode_key.filter(|k| !k.is_empty()),
        }
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.content_id)?;
        if let Some(episode_key) = &self.episode_key {
            write!(f, ":{episode_key}")?;
        }
        Ok(())
    }
}

/// Parse the persisted `type:contentId[:episodeKey]` layout.
///
/// Everything after the content id's trailing colon is the episode key, so
/// colon-delimited episode keys (`tt1:1:2`) are kept whole. A content id that
/// itself contains a colon cannot be told apart from an episode key in this
/// form; such ids must be stored through the structured API.
impl FromStr for ProgressKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (content_type, rest) = s
            .split_once(':')
            .ok_or_else(|| Error::invalid_input(format!("malformed progress key: {s}")))?;
        let content_type: ContentType = content_type.parse()?;

        let (content_id, episode_key) = match rest.split_once(':') {
            Some((id, episode)) => (id, Some(episode.to_string())),
            None => (rest, None),
        };

        Ok(Self::new(content_type, ContentId::new(content_id)?, episode_key))
    }
}

/// One persisted playback position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub content_type: ContentType,
    pub content_id: ContentId,
    /// Opaque season/episode encoding; see `upnext_parser`.
    pub episode_key: Option<String>,
    /// Position in seconds.
    pub current_time: f64,
    /// Runtime in seconds.
    pub duration: f64,
    /// Epoch milliseconds of the last write.
    pub last_updated: i64,
    #[serde(default)]
    pub origin: ProgressOrigin,
    /// Epoch milliseconds of the remote event this record mirrors, if any.
    #[serde(default)]
    pub synced_at: Option<i64>,
}

impl ProgressRecord {
    /// The record's composite key.
    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(
            self.content_type,
            self.content_id.clone(),
            self.episode_key.clone(),
        )
    }

    /// Watched share in `[0, 100]`.
    pub fn progress_percent(&self) -> f64 {
        progress::percent(self.current_time, self.duration)
    }

    /// Whether the record counts as watched through.
    pub fn is_finished(&self, threshold: f64) -> bool {
        progress::is_finished(self.progress_percent(), threshold)
    }
}

/// Fields written by a progress-store `set` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressPatch {
    pub current_time: f64,
    pub duration: f64,
    /// Defaults to the time of the write.
    pub last_updated: Option<i64>,
    pub origin: ProgressOrigin,
}

impl ProgressPatch {
    /// A local playback position, stamped at write time.
    pub fn playback(current_time: f64, duration: f64) -> Self {
        Self {
            current_time,
            duration,
            last_updated: None,
            origin: ProgressOrigin::Local,
        }
    }

    /// Pin the write's timestamp.
    pub fn at(mut self, last_updated: i64) -> Self {
        self.last_updated = Some(last_updated);
        self
    }

    /// Build the full record this patch produces for `key`.
    pub fn into_record(self, key: ProgressKey, now: i64) -> ProgressRecord {
        let last_updated = self.last_updated.unwrap_or(now);
        let synced_at = match self.origin {
            ProgressOrigin::RemoteHistory => Some(last_updated),
            ProgressOrigin::Local => None,
        };
        ProgressRecord {
            content_type: key.content_type,
            content_id: key.content_id,
            episode_key: key.episode_key,
            current_time: self.current_time,
            duration: self.duration,
            last_updated,
            origin: self.origin,
            synced_at,
        }
    }
}

/// Options for a progress write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Skip the "never lower progress from a sync write" guard.
    /// Last-write-wins on `last_updated` still applies.
    pub force_write: bool,
}

/// Change notification emitted by a progress store after a successful write.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A record was created or replaced.
    Updated(ProgressKey),
    /// One record was removed.
    Removed(ProgressKey),
    /// Every record of a title was removed.
    ContentRemoved {
        content_type: ContentType,
        content_id: ContentId,
    },
}

/// Why a continue-watching row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// Resume a partially watched movie or episode.
    Continue,
    /// Start the next, already released episode of a series.
    UpNext,
}

/// One display-ready continue-watching entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueWatchingRow {
    pub kind: RowKind,
    pub content_type: ContentType,
    pub content_id: ContentId,
    pub name: String,
    pub poster: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub episode_title: Option<String>,
    /// Episode key of the record the row resumes, or of the synthesized
    /// next episode for up-next rows.
    pub episode_key: Option<String>,
    /// Watched share in `[0, 100]`.
    pub progress: f64,
    /// Epoch milliseconds used for ordering.
    pub last_updated: i64,
}

impl ContinueWatchingRow {
    /// `(type, id)` identity used for the one-row-per-title cap.
    pub fn title_key(&self) -> (ContentType, &ContentId) {
        (self.content_type, &self.content_id)
    }
}
