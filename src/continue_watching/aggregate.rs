//! Pure rules that turn progress records into continue-watching rows.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use upnext_common::{
    format_episode_key, parse_episode_key, ContentId, ContentType, ContinueWatchingRow,
    ProgressRecord, RowKind,
};

use crate::metadata::{ResolvedMetadata, VideoInfo};
use crate::store::ProgressMap;

/// All records of one title, built fresh every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentGroup {
    pub content_type: ContentType,
    pub content_id: ContentId,
    /// Newest first.
    pub records: Vec<ProgressRecord>,
}

impl ContentGroup {
    pub fn latest(&self) -> Option<&ProgressRecord> {
        self.records.first()
    }
}

/// Group a store snapshot by `(type, content id)`, in key order.
pub fn group_records(records: ProgressMap) -> Vec<ContentGroup> {
    let mut groups: Vec<ContentGroup> = Vec::new();

    // The map is ordered by (type, id, episode), so each title is contiguous.
    for (_, record) in records {
        if let Some(group) = groups.last_mut().filter(|g| {
            g.content_type == record.content_type && g.content_id == record.content_id
        }) {
            group.records.push(record);
            continue;
        }
        groups.push(ContentGroup {
            content_type: record.content_type,
            content_id: record.content_id.clone(),
            records: vec![record],
        });
    }

    for group in &mut groups {
        group
            .records
            .sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
    }
    groups
}

/// Display title of an episode, falling back to its number.
pub fn episode_title(video: Option<&VideoInfo>, episode: u32) -> String {
    video
        .and_then(|v| v.title.clone())
        .unwrap_or_else(|| format!("Episode {episode}"))
}

/// Zero-progress row for the next episode of a series.
pub fn up_next_row(
    content_id: &ContentId,
    meta: &ResolvedMetadata,
    next: &VideoInfo,
    last_updated: i64,
) -> ContinueWatchingRow {
    ContinueWatchingRow {
        kind: RowKind::UpNext,
        content_type: ContentType::Series,
        content_id: content_id.clone(),
        name: meta.basic.name.clone(),
        poster: meta.basic.poster.clone(),
        season: Some(next.season),
        episode: Some(next.episode),
        episode_title: Some(episode_title(Some(next), next.episode)),
        episode_key: Some(format_episode_key(content_id.as_str(), next.episode_ref())),
        progress: 0.0,
        last_updated,
    }
}

fn continue_row(record: &ProgressRecord, meta: &ResolvedMetadata) -> ContinueWatchingRow {
    let parsed = match (record.content_type, record.episode_key.as_deref()) {
        (ContentType::Series, Some(key)) => {
            let parsed = parse_episode_key(key);
            if parsed.is_none() {
                tracing::debug!(
                    content_id = %record.content_id,
                    episode_key = key,
                    "Unrecognized episode key"
                );
            }
            parsed
        }
        _ => None,
    };

    ContinueWatchingRow {
        kind: RowKind::Continue,
        content_type: record.content_type,
        content_id: record.content_id.clone(),
        name: meta.basic.name.clone(),
        poster: meta.basic.poster.clone(),
        season: parsed.map(|ep| ep.season),
        episode: parsed.map(|ep| ep.episode),
        episode_title: parsed.map(|ep| episode_title(meta.find_episode(ep), ep.episode)),
        episode_key: record.episode_key.clone(),
        progress: record.progress_percent(),
        last_updated: record.last_updated,
    }
}

/// Candidate rows for one title.
///
/// - Finished records (at or above `threshold`) never yield a continue row.
/// - For series, if the newest record is finished and the following episode
///   has aired, an up-next row is produced for it.
/// - Every other unfinished record yields a continue row.
pub fn rows_for_group(
    group: &ContentGroup,
    meta: &ResolvedMetadata,
    threshold: f64,
    now: DateTime<Utc>,
) -> Vec<ContinueWatchingRow> {
    let mut rows = Vec::new();

    if group.content_type == ContentType::Series {
        if let Some(latest) = group.latest().filter(|r| r.is_finished(threshold)) {
            let next = latest
                .episode_key
                .as_deref()
                .and_then(parse_episode_key)
                .and_then(|watched| meta.next_released_episode(watched, now));
            if let Some(next) = next {
                rows.push(up_next_row(&group.content_id, meta, next, latest.last_updated));
            }
        }
    }

    rows.extend(
        group
            .records
            .iter()
            .filter(|r| !r.is_finished(threshold))
            .map(|r| continue_row(r, meta)),
    );
    rows
}

/// Keep one row per `(type, content id)`: the greatest `last_updated` wins,
/// and on a tie the row encountered first stays.
pub fn dedup_rows(rows: Vec<ContinueWatchingRow>) -> Vec<ContinueWatchingRow> {
    let mut kept: Vec<ContinueWatchingRow> = Vec::with_capacity(rows.len());
    let mut index: HashMap<(ContentType, ContentId), usize> = HashMap::new();

    for row in rows {
        let key = (row.content_type, row.content_id.clone());
        match index.get(&key) {
            Some(&idx) => {
                if row.last_updated > kept[idx].last_updated {
                    kept[idx] = row;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(row);
            }
        }
    }
    kept
}

fn row_order(a: &ContinueWatchingRow, b: &ContinueWatchingRow) -> Ordering {
    b.last_updated
        .cmp(&a.last_updated)
        .then_with(|| a.content_id.cmp(&b.content_id))
        .then_with(|| a.season.cmp(&b.season))
        .then_with(|| a.episode.cmp(&b.episode))
}

/// Newest first; ties by content id, then season and episode.
pub fn sort_rows(rows: &mut [ContinueWatchingRow]) {
    rows.sort_by(row_order);
}

/// Dedup and sort local rows followed by remote candidates.
pub fn finalize(
    local: Vec<ContinueWatchingRow>,
    remote: Vec<ContinueWatchingRow>,
) -> Vec<ContinueWatchingRow> {
    let mut rows = dedup_rows(local.into_iter().chain(remote).collect());
    sort_rows(&mut rows);
    rows
}
