//! Row mapping between SQLite and the shared domain types.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;
use upnext_common::{ContentId, ContentType, ProgressOrigin, ProgressRecord};

/// Columns selected by [`progress_from_row`], in order.
pub(crate) const PROGRESS_COLUMNS: &str = "content_type, content_id, episode_key, position_secs, \
     duration_secs, last_updated, origin, synced_at";

/// A removal marker for a whole title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub content_type: ContentType,
    pub content_id: ContentId,
    /// Epoch milliseconds of the removal.
    pub removed_at: i64,
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = upnext_common::Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a `watch_progress` row selected with [`PROGRESS_COLUMNS`].
pub(crate) fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<ProgressRecord> {
    let episode_key: String = row.get(2)?;
    Ok(ProgressRecord {
        content_type: parse_column(row, 0)?,
        content_id: parse_column(row, 1)?,
        episode_key: (!episode_key.is_empty()).then_some(episode_key),
        current_time: row.get(3)?,
        duration: row.get(4)?,
        last_updated: row.get(5)?,
        origin: parse_column::<ProgressOrigin>(row, 6)?,
        synced_at: row.get(7)?,
    })
}

/// Map a `progress_tombstones` row.
pub(crate) fn tombstone_from_row(row: &Row<'_>) -> rusqlite::Result<Tombstone> {
    Ok(Tombstone {
        content_type: parse_column(row, 0)?,
        content_id: parse_column(row, 1)?,
        removed_at: row.get(2)?,
    })
}
