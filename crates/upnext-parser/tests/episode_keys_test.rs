//! Fixture tests for the episode-key encodings seen in persisted progress.

use upnext_parser::{parse_episode_key, parse_episode_key_tagged, EpisodeRef, KeyFormat};

/// `(input, expected)` pairs covering both legacy layouts.
const FIXTURES: &[(&str, Option<(u32, u32)>)] = &[
    // s/e layout
    ("s1e1", Some((1, 1))),
    ("S1E1", Some((1, 1))),
    ("S01E02", Some((1, 2))),
    ("tt0903747:s05e16", Some((5, 16))),
    ("show.s2e10.extra", Some((2, 10))),
    // colon layout
    ("tt0108778:1:1", Some((1, 1))),
    ("tt0903747:5:16", Some((5, 16))),
    ("tmdb:1399:8:6", Some((8, 6))),
    ("kitsu:7442:1:25", Some((1, 25))),
    ("0:0", Some((0, 0))),
    // unparseable
    ("garbage", None),
    ("", None),
    (":", None),
    ("::", None),
    ("tt0108778", None),
    ("tt0108778:1", None),
    ("tt0108778:one:two", None),
    ("s:e", None),
    ("episode-5", None),
    ("tt0108778:1:1a", None),
];

#[test]
fn fixture_table() {
    for (input, expected) in FIXTURES {
        let got = parse_episode_key(input);
        let want = expected.map(|(s, e)| EpisodeRef::new(s, e));
        assert_eq!(got, want, "input {input:?}");
    }
}

#[test]
fn equivalent_encodings_agree() {
    assert_eq!(parse_episode_key("s1e1"), parse_episode_key("tt0108778:1:1"));
    assert_eq!(parse_episode_key("s1e1"), Some(EpisodeRef::new(1, 1)));
}

#[test]
fn hostile_input_never_panics() {
    let long_digits = "9".repeat(4096);
    let inputs = [
        long_digits.clone(),
        format!("s{long_digits}e1"),
        format!("tt1:{long_digits}:{long_digits}"),
        "ß:ü:é".to_string(),
        "sSsSsS".to_string(),
        "\u{0}:\u{0}".to_string(),
        ":".repeat(1000),
    ];
    for input in &inputs {
        assert_eq!(parse_episode_key(input), None, "input {input:?}");
    }
}

#[test]
fn tagged_formats() {
    assert_eq!(
        parse_episode_key_tagged("S03E04").map(|p| p.format),
        Some(KeyFormat::SeasonEpisode)
    );
    assert_eq!(
        parse_episode_key_tagged("tt1:3:4").map(|p| p.format),
        Some(KeyFormat::ColonDelimited)
    );
    assert!(parse_episode_key_tagged("nope").is_none());
}

#[test]
fn season_episode_matcher_runs_first() {
    let parsed = parse_episode_key_tagged("tt1:s2e3:4:5").unwrap();
    assert_eq!(parsed.format, KeyFormat::SeasonEpisode);
    assert_eq!(parsed.episode, EpisodeRef::new(2, 3));
}
