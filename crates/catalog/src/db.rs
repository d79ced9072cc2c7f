//! Database connection, pool management and schema bootstrap.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Version stamped into `PRAGMA user_version` when the schema is created.
pub const SCHEMA_VERSION: i64 = 1;
const SCHEMA: &str = include_str!("../schema/v1.sql");
// One scanner writing, a handful of readers browsing.
const MAX_CONNECTIONS: u32 = 5;

/// Handle to the catalog store.
///
/// This is the main entry point for interacting with the catalog database.
/// It manages the SQLite connection pool, and guarantees that the schema
/// exists before it is handed out.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    /// Canonical file backing the pool; `None` for in-memory databases.
    path: Option<PathBuf>,
}

impl Database {
    async fn new(options: SqliteConnectOptions, path: Option<PathBuf>, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // This is IMPORTANT to apply the query-based PRAGMAs to EVERY
            // connection (set by max connections) instead of only the
            // first connection returned by the pool.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::StoreUnavailable)?;
        let db = Self { pool, path };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Open the catalog database at the given path.
    ///
    /// Creates the database file if it doesn't exist and bootstraps the
    /// schema if the file is uninitialized.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(options, Some(path.to_path_buf()), None).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // In-memory database must either use the same cache `.shared_cache(true)`,
        // or be limited to one connection. Otherwise parallel connections will
        // see different databases that contain different data.
        Self::new(options, None, Some(1)).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Write-ahead log: readers don't block the scanner and vice versa,
            // and a power cut loses at most the last uncommitted transaction.
            .journal_mode(SqliteJournalMode::Wal)
            // PRAGMA synchronous = NORMAL (safe in WAL mode, much faster than FULL)
            .synchronous(SqliteSynchronous::Normal)
            // PRAGMA busy_timeout = 1500ms
            // Long scans hold the single writer slot for their whole
            // transaction; readers need some patience.
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 1000;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Read the schema version stamped into the database header.
    ///
    /// Zero means the store has never been initialized.
    pub async fn schema_version(&self) -> Result<i64> {
        sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::StoreUnavailable)
    }

    /// Create the schema if the store is uninitialized.
    ///
    /// This is called automatically by `connect` and `connect_in_memory`.
    /// A non-zero version is accepted as is: there is no upgrade path yet.
    #[instrument("ensuring catalog schema", skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        let version = self.schema_version().await?;
        if version > SCHEMA_VERSION {
            tracing::warn!(version, supported = SCHEMA_VERSION, "Catalog was written by a newer schema version");
            return Ok(());
        }
        if version != 0 {
            tracing::debug!(version, "Catalog schema present");
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Schema)?;
        sqlx::query(SCHEMA).execute(&mut *tx).await.or_raise(|| ErrorKind::Schema)?;
        // PRAGMA arguments cannot be bound.
        let stamp = format!("PRAGMA user_version = {SCHEMA_VERSION}");
        sqlx::query(&stamp).execute(&mut *tx).await.or_raise(|| ErrorKind::Schema)?;
        tx.commit().await.or_raise(|| ErrorKind::Schema)?;
        tracing::info!(version = SCHEMA_VERSION, "Initialized catalog schema");
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    ///
    /// This is useful for running custom queries or transactions.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The canonical database file, if the database is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the database connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them, which also checkpoints the write-ahead log. After calling
    /// this, the Database instance should not be used.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        assert!(db.path().is_none());
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_schema_is_stamped() {
        let db = Database::connect_in_memory().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), SCHEMA_VERSION);
        let indexes: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'songs' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert!(indexes.contains(&"idx_songs_fingerprint".to_string()));
        assert!(indexes.contains(&"idx_songs_status".to_string()));
        db.close().await;
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        // Running again should succeed (already initialized)
        db.ensure_schema().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), SCHEMA_VERSION);
        db.close().await;
    }

    #[tokio::test]
    async fn test_existing_version_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let db = Database::connect(&path).await.unwrap();
        sqlx::query("PRAGMA user_version = 42").execute(db.pool()).await.unwrap();
        db.close().await;
        let db = Database::connect(&path).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), 42);
        db.close().await;
    }

    #[tokio::test]
    async fn test_pragmas_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("catalog.db")).await.unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode").fetch_one(db.pool()).await.unwrap();
        assert_eq!(mode, "wal");
        // NORMAL = 1
        let sync: i64 = sqlx::query_scalar("PRAGMA synchronous").fetch_one(db.pool()).await.unwrap();
        assert_eq!(sync, 1);
        // Verify a PRAGMA set by after_connect().
        let checkpoint: i64 = sqlx::query_scalar("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(checkpoint, 1000);
        db.close().await;
    }

    #[tokio::test]
    async fn test_unopenable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so SQLite cannot create the file.
        let err = Database::connect(dir.path().join("missing/dir/catalog.db")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::StoreUnavailable));
    }

    #[tokio::test]
    async fn test_not_a_database_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();
        let err = Database::connect(&path).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::StoreUnavailable));
    }
}
