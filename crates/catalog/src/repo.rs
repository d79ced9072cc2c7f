//! Repository for catalog entries.
//!
//! Reads for collaborators (browsing, enrichment) and the handful of writes
//! that happen outside of a scan. Scans write through a
//! [`Transaction`](crate::Transaction) obtained from [`Repository::begin`].

use crate::Database;
use crate::entry::{CatalogEntry, Enrichment, EntryId};
use crate::error::{ErrorKind, Result};
use crate::models::EntryRow;
use crate::tx::Transaction;
use exn::ResultExt;
use sqlx::SqlitePool;

/// Repository for managing catalog entries in the database.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Start a write batch. Nothing is visible to other readers until
    /// [`Transaction::commit`] succeeds.
    pub async fn begin(&self) -> Result<Transaction> {
        let tx = self.pool.begin().await.or_raise(|| ErrorKind::Transaction)?;
        Ok(Transaction::new(tx))
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    /// Get an entry by its path relative to the library root
    /// (e.g., `"ABBA/Waterloo.mp3"`).
    pub async fn get_by_path(&self, path: impl AsRef<str>) -> Result<Option<CatalogEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(include_str!("../queries/get_by_path.sql"))
            .bind(path.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(CatalogEntry::try_from).transpose()
    }

    pub async fn get_by_id(&self, id: EntryId) -> Result<Option<CatalogEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(include_str!("../queries/get_by_id.sql"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(CatalogEntry::try_from).transpose()
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// List every entry, ordered by id.
    pub async fn list_entries(&self) -> Result<Vec<CatalogEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(include_str!("../queries/list_entries.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(CatalogEntry::try_from).collect()
    }

    /// List entries still waiting for metadata enrichment, oldest first.
    pub async fn list_pending(&self, limit: usize) -> Result<Vec<CatalogEntry>> {
        let limit = i64::try_from(limit).or_raise(|| ErrorKind::InvalidData("limit"))?;
        let rows: Vec<EntryRow> = sqlx::query_as(include_str!("../queries/list_pending.sql"))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(CatalogEntry::try_from).collect()
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_entries.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Write back the result of enriching one entry.
    ///
    /// A `None` title keeps the title seeded from the filename; every other
    /// descriptive field is replaced as given.
    ///
    /// Returns `true` if the entry exists.
    pub async fn record_enrichment(&self, id: EntryId, enrichment: &Enrichment) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/record_enrichment.sql"))
            .bind(enrichment.artist.as_deref())
            .bind(enrichment.title.as_deref())
            .bind(enrichment.variant.as_deref())
            .bind(enrichment.year)
            .bind(enrichment.genre.as_deref())
            .bind(enrichment.external_id.as_deref())
            .bind(enrichment.search_blob.as_deref())
            .bind(enrichment.status.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every entry as pending so the enrichment collaborator re-runs
    /// over the whole catalog.
    ///
    /// Returns the number of entries reset.
    pub async fn reset_all_to_pending(&self) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/reset_pending.sql"))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::info!(entries = result.rows_affected(), "Reset enrichment status to pending");
        Ok(result.rows_affected())
    }

    /// Hide or show an entry without deleting it.
    ///
    /// Returns `true` if the entry exists.
    pub async fn set_visible(&self, id: EntryId, visible: bool) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/set_visible.sql"))
            .bind(visible)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
