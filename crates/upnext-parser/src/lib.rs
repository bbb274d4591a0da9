//! # upnext-parser
//!
//! Normalizes the episode-key encodings found in persisted watch progress into
//! a `(season, episode)` pair.
//!
//! Progress written by different players and sync paths over the years uses
//! more than one layout for the same episode. Two are recognized, in priority
//! order:
//!
//! 1. `s<digits>e<digits>` anywhere in the key, case-insensitive (`"S01E05"`).
//! 2. Colon-delimited keys whose last two segments are numeric
//!    (`"tt0108778:1:5"`, `"kitsu:1234:1:5"`).
//!
//! Anything else is unparseable. Parsing is total: malformed input yields
//! `None`, never a panic or an error.
//!
//! ## Quick Start
//!
//! ```
//! use upnext_parser::{parse_episode_key, EpisodeRef};
//!
//! assert_eq!(parse_episode_key("s1e1"), Some(EpisodeRef::new(1, 1)));
//! assert_eq!(parse_episode_key("tt0108778:1:1"), Some(EpisodeRef::new(1, 1)));
//! assert_eq!(parse_episode_key("garbage"), None);
//! ```

mod matchers;

use std::fmt;

pub use matchers::KeyFormat;

/// A season/episode coordinate.
///
/// Ordering is by season, then episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EpisodeRef {
    /// Season number (0 is conventionally "specials").
    pub season: u32,
    /// Episode number within the season.
    pub episode: u32,
}

impl EpisodeRef {
    /// Create a new episode reference.
    pub const fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }

    /// The episode directly after this one in the same season.
    ///
    /// Returns `None` on overflow.
    pub fn next_in_season(&self) -> Option<Self> {
        self.episode.checked_add(1).map(|episode| Self {
            season: self.season,
            episode,
        })
    }
}

impl fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Result of a successful parse, tagged with the layout that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedEpisodeKey {
    /// Which encoding the key used.
    pub format: KeyFormat,
    /// The extracted coordinate.
    pub episode: EpisodeRef,
}

/// Parse an episode key, reporting which layout matched.
///
/// Matchers are tried in priority order; the first hit wins.
///
/// ```
/// use upnext_parser::{parse_episode_key_tagged, KeyFormat};
///
/// let parsed = parse_episode_key_tagged("tt0944947:s2e3").unwrap();
/// assert_eq!(parsed.format, KeyFormat::SeasonEpisode);
/// ```
pub fn parse_episode_key_tagged(key: &str) -> Option<ParsedEpisodeKey> {
    matchers::MATCHERS.iter().find_map(|(format, matcher)| {
        matcher(key).map(|episode| ParsedEpisodeKey {
            format: *format,
            episode,
        })
    })
}

/// Parse an episode key into an [`EpisodeRef`].
///
/// Returns `None` for any key that matches no known layout.
pub fn parse_episode_key(key: &str) -> Option<EpisodeRef> {
    parse_episode_key_tagged(key).map(|parsed| parsed.episode)
}

/// Build the canonical key for an episode of `content_id`.
///
/// The output uses the colon layout so it round-trips through
/// [`parse_episode_key`] regardless of what `content_id` looks like.
///
/// ```
/// use upnext_parser::{format_episode_key, parse_episode_key, EpisodeRef};
///
/// let key = format_episode_key("tt3", EpisodeRef::new(2, 3));
/// assert_eq!(key, "tt3:2:3");
/// assert_eq!(parse_episode_key(&key), Some(EpisodeRef::new(2, 3)));
/// ```
pub fn format_episode_key(content_id: &str, episode: EpisodeRef) -> String {
    format!("{}:{}:{}", content_id, episode.season, episode.episode)
}
