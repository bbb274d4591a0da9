//! Title removal tombstones.

use rusqlite::{Connection, OptionalExtension};
use upnext_common::{ContentId, ContentType, Error, Result};

use crate::models::{tombstone_from_row, Tombstone};

/// Record a removal, keeping the latest timestamp if one exists.
pub fn upsert_tombstone(
    conn: &Connection,
    content_type: ContentType,
    content_id: &ContentId,
    removed_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO progress_tombstones (content_type, content_id, removed_at)
         VALUES (:content_type, :content_id, :removed_at)
         ON CONFLICT (content_type, content_id) DO UPDATE SET
             removed_at = MAX(removed_at, excluded.removed_at)",
        rusqlite::named_params! {
            ":content_type": content_type.as_str(),
            ":content_id": content_id.as_str(),
            ":removed_at": removed_at,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Removal time of a title, if it was ever removed.
pub fn get_tombstone(
    conn: &Connection,
    content_type: ContentType,
    content_id: &ContentId,
) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT removed_at FROM progress_tombstones
         WHERE content_type = :content_type AND content_id = :content_id",
        rusqlite::named_params! {
            ":content_type": content_type.as_str(),
            ":content_id": content_id.as_str(),
        },
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// List every tombstone, most recent first.
pub fn list_tombstones(conn: &Connection) -> Result<Vec<Tombstone>> {
    let mut stmt = conn
        .prepare(
            "SELECT content_type, content_id, removed_at FROM progress_tombstones
             ORDER BY removed_at DESC",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let tombstones = stmt
        .query_map([], tombstone_from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(tombstones)
}
