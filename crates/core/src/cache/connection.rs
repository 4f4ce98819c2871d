//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use super::migrations;
use crate::Error;
use std::path::Path;
use std::time::Duration;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Staleness and expiry thresholds for cached entries.
///
/// `expire_after` must be greater than `stale_after`; `AppConfig::validate`
/// enforces this for loaded configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    /// Entries older than this are served but flagged for refresh.
    pub stale_after: Duration,
    /// Entries older than this are deleted.
    pub expire_after: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self { stale_after: Duration::from_secs(24 * 60 * 60), expire_after: Duration::from_secs(7 * 24 * 60 * 60) }
    }
}

/// Cache database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Cloning shares the same connection.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
    pub(crate) ttl: CacheTtl,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS))
            .await
            .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn, ttl: CacheTtl::default() })
    }

    /// Replace the staleness/expiry thresholds used by entry reads.
    pub fn with_ttl(mut self, ttl: CacheTtl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Thresholds currently applied to entry reads.
    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let version = db
            .conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_with_ttl() {
        let ttl = CacheTtl { stale_after: Duration::from_secs(1), expire_after: Duration::from_secs(5) };
        let db = CacheDb::open_in_memory().await.unwrap().with_ttl(ttl);
        assert_eq!(db.ttl(), ttl);
    }

    #[test]
    fn test_default_ttl_ordering() {
        let ttl = CacheTtl::default();
        assert!(ttl.expire_after > ttl.stale_after);
    }
}
