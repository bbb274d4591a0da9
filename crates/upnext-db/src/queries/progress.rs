//! Watch progress queries.
//!
//! Records are keyed by `(content_type, content_id, episode_key)`; a missing
//! episode key is stored as the empty string so the primary key stays total.

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use upnext_common::{
    decide_write, ContentId, ContentType, Error, ProgressKey, ProgressRecord, Result, SetOptions,
    WriteDecision,
};

use crate::models::{progress_from_row, PROGRESS_COLUMNS};
use crate::queries::tombstones;

fn episode_column(episode_key: Option<&str>) -> &str {
    episode_key.unwrap_or("")
}

/// List every stored record, ordered by key.
pub fn list_progress(conn: &Connection) -> Result<Vec<ProgressRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM watch_progress
             ORDER BY content_type, content_id, episode_key"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let records = stmt
        .query_map([], progress_from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(records)
}

/// Get the record stored under `key`, if any.
pub fn get_progress(conn: &Connection, key: &ProgressKey) -> Result<Option<ProgressRecord>> {
    conn.query_row(
        &format!(
            "SELECT {PROGRESS_COLUMNS} FROM watch_progress
             WHERE content_type = :content_type
               AND content_id = :content_id
               AND episode_key = :episode_key"
        ),
        rusqlite::named_params! {
            ":content_type": key.content_type.as_str(),
            ":content_id": key.content_id.as_str(),
            ":episode_key": episode_column(key.episode_key.as_deref()),
        },
        progress_from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Insert or replace a record unconditionally.
pub fn upsert_progress(conn: &Connection, record: &ProgressRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO watch_progress
             (content_type, content_id, episode_key, position_secs, duration_secs,
              last_updated, origin, synced_at)
         VALUES
             (:content_type, :content_id, :episode_key, :position_secs, :duration_secs,
              :last_updated, :origin, :synced_at)
         ON CONFLICT (content_type, content_id, episode_key) DO UPDATE SET
             position_secs = excluded.position_secs,
             duration_secs = excluded.duration_secs,
             last_updated = excluded.last_updated,
             origin = excluded.origin,
             synced_at = excluded.synced_at",
        rusqlite::named_params! {
            ":content_type": record.content_type.as_str(),
            ":content_id": record.content_id.as_str(),
            ":episode_key": episode_column(record.episode_key.as_deref()),
            ":position_secs": record.current_time,
            ":duration_secs": record.duration,
            ":last_updated": record.last_updated,
            ":origin": record.origin.as_str(),
            ":synced_at": record.synced_at,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Apply the last-write-wins rule and store `record` if it wins.
///
/// The read and the write share one immediate transaction, so the write lock
/// is held before the stored record is compared.
pub fn write_progress(
    conn: &Connection,
    record: &ProgressRecord,
    options: SetOptions,
) -> Result<WriteDecision> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| Error::database(e.to_string()))?;

    let existing = get_progress(&tx, &record.key())?;
    let decision = decide_write(existing.as_ref(), record, options);
    if decision.is_write() {
        upsert_progress(&tx, record)?;
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(decision)
}

/// Delete the record stored under `key`.
///
/// Returns whether a row was removed.
pub fn delete_progress(conn: &Connection, key: &ProgressKey) -> Result<bool> {
    let deleted = conn
        .execute(
            "DELETE FROM watch_progress
             WHERE content_type = :content_type
               AND content_id = :content_id
               AND episode_key = :episode_key",
            rusqlite::named_params! {
                ":content_type": key.content_type.as_str(),
                ":content_id": key.content_id.as_str(),
                ":episode_key": episode_column(key.episode_key.as_deref()),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(deleted > 0)
}

/// Delete every record of a title and stamp its tombstone at `removed_at`.
///
/// Returns the number of records removed.
pub fn delete_content(
    conn: &Connection,
    content_type: ContentType,
    content_id: &ContentId,
    removed_at: i64,
) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let deleted = tx
        .execute(
            "DELETE FROM watch_progress
             WHERE content_type = :content_type AND content_id = :content_id",
            rusqlite::named_params! {
                ":content_type": content_type.as_str(),
                ":content_id": content_id.as_str(),
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    tombstones::upsert_tombstone(&tx, content_type, content_id, removed_at)?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(deleted)
}
