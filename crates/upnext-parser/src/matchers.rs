//! Ordered pattern matchers for episode keys.
//!
//! Each matcher is a plain function from the raw key to an optional
//! [`EpisodeRef`]. Matchers never fail loudly; a miss is `None`.

use winnow::ascii::digit1;
use winnow::prelude::*;
use winnow::token::one_of;

use crate::EpisodeRef;

/// The episode-key layout that produced a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum KeyFormat {
    /// `s<digits>e<digits>`, case-insensitive, anywhere in the key.
    SeasonEpisode,
    /// `...:<season>:<episode>`.
    ColonDelimited,
}

type Matcher = fn(&str) -> Option<EpisodeRef>;

/// Matchers in priority order.
pub(crate) const MATCHERS: &[(KeyFormat, Matcher)] = &[
    (KeyFormat::SeasonEpisode, match_season_episode),
    (KeyFormat::ColonDelimited, match_colon_delimited),
];

/// A run of ASCII digits that fits in a `u32`.
fn number(input: &mut &str) -> PResult<u32> {
    digit1.try_map(|digits: &str| digits.parse::<u32>()).parse_next(input)
}

/// `s<digits>e<digits>` at the start of `input`.
fn season_episode(input: &mut &str) -> PResult<EpisodeRef> {
    (one_of(['s', 'S']), number, one_of(['e', 'E']), number)
        .map(|(_, season, _, episode)| EpisodeRef::new(season, episode))
        .parse_next(input)
}

/// Scan for the first `s<digits>e<digits>` occurrence.
fn match_season_episode(key: &str) -> Option<EpisodeRef> {
    key.char_indices()
        .filter(|(_, c)| c.eq_ignore_ascii_case(&'s'))
        .find_map(|(idx, _)| {
            let mut rest = &key[idx..];
            season_episode(&mut rest).ok()
        })
}

/// Last two colon-separated segments, both fully numeric.
fn match_colon_delimited(key: &str) -> Option<EpisodeRef> {
    let mut segments = key.rsplit(':');
    let episode = segments.next()?;
    let season = segments.next()?;

    let season = number.parse(season).ok()?;
    let episode = number.parse(episode).ok()?;
    Some(EpisodeRef::new(season, episode))
}
