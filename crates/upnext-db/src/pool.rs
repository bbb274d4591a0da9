//! Database connection pool management.
//!
//! Connection pooling for SQLite using r2d2. Migrations run once when the
//! pool is created.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use upnext_common::{Error, Result};

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize a new database pool with the given file path.
///
/// Creates the file if needed, switches it to WAL journaling and applies
/// pending migrations.
///
/// # Example
///
/// ```no_run
/// use upnext_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/upnext/upnext.db").unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
    });

    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    migrate(&pool)?;
    Ok(pool)
}

/// Initialize an in-memory database pool for testing.
///
/// Every SQLite in-memory connection is its own database, so the pool holds
/// a single connection.
///
/// ```
/// use upnext_db::pool::init_memory_pool;
///
/// let pool = init_memory_pool().unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create in-memory pool: {}", e)))?;

    migrate(&pool)?;
    Ok(pool)
}

fn migrate(pool: &DbPool) -> Result<()> {
    let conn = get_conn(pool)?;
    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;
    Ok(())
}

/// Get a connection from the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_memory_pool() {
        let pool = init_memory_pool().unwrap();
        assert_eq!(pool.max_size(), 1);
    }

    #[test]
    fn test_migrations_run_on_init() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='watch_progress'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_file_pool_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.db");
        let path = path.to_str().unwrap();

        {
            let pool = init_pool(path).unwrap();
            let conn = get_conn(&pool).unwrap();
            conn.execute(
                "INSERT INTO progress_tombstones (content_type, content_id, removed_at)
                 VALUES ('movie', 'tt1', 10)",
                [],
            )
            .unwrap();
        }

        let pool = init_pool(path).unwrap();
        let conn = get_conn(&pool).unwrap();
        let removed_at: i64 = conn
            .query_row(
                "SELECT removed_at FROM progress_tombstones WHERE content_id = 'tt1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(removed_at, 10);
    }
}
