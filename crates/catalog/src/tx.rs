//! Write batch used by a library scan.
//!
//! Everything a scan changes goes through one [`Transaction`]. Dropping it
//! without calling [`commit`](Transaction::commit) rolls every statement back,
//! so a failed scan leaves the catalog exactly as it found it.

use crate::entry::{CatalogEntry, EntryId, Fingerprint, Format, NewEntry};
use crate::error::{ErrorKind, Result};
use crate::models::EntryRow;
use exn::ResultExt;
use sqlx::Sqlite;

pub struct Transaction {
    inner: sqlx::Transaction<'static, Sqlite>,
}

impl Transaction {
    pub(crate) fn new(inner: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self { inner }
    }

    /// Every entry in the catalog, as seen from inside this transaction.
    pub async fn entries(&mut self) -> Result<Vec<CatalogEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(include_str!("../queries/list_entries.sql"))
            .fetch_all(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Transaction)?;
        rows.into_iter().map(CatalogEntry::try_from).collect()
    }

    /// Create a new pending entry, seeding its title from the filename.
    pub async fn insert(&mut self, entry: &NewEntry) -> Result<EntryId> {
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_entry.sql"))
            .bind(&entry.path)
            .bind(entry.fingerprint.as_ref().map(Fingerprint::as_str))
            .bind(&entry.filename)
            .bind(entry.seed_title())
            .bind(entry.format.as_str())
            .fetch_one(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Transaction)?;
        Ok(EntryId(id))
    }

    /// Record new content for an entry that is still at the same path.
    ///
    /// When `repend` is set the entry goes back to
    /// [`Pending`](crate::EnrichmentStatus::Pending); descriptive fields are
    /// never touched.
    pub async fn update_content(
        &mut self,
        id: EntryId,
        filename: &str,
        format: Format,
        fingerprint: Option<&Fingerprint>,
        repend: bool,
    ) -> Result<()> {
        sqlx::query(include_str!("../queries/update_content.sql"))
            .bind(fingerprint.map(Fingerprint::as_str))
            .bind(format.as_str())
            .bind(filename)
            .bind(repend)
            .bind(id.0)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Transaction)?;
        Ok(())
    }

    /// Point an existing entry at the path it was moved to.
    pub async fn relocate(&mut self, id: EntryId, path: &str, filename: &str, format: Format) -> Result<()> {
        sqlx::query(include_str!("../queries/relocate_entry.sql"))
            .bind(path)
            .bind(filename)
            .bind(format.as_str())
            .bind(id.0)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Transaction)?;
        Ok(())
    }

    pub async fn delete(&mut self, id: EntryId) -> Result<()> {
        sqlx::query(include_str!("../queries/delete_entry.sql"))
            .bind(id.0)
            .execute(&mut *self.inner)
            .await
            .or_raise(|| ErrorKind::Transaction)?;
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        self.inner.commit().await.or_raise(|| ErrorKind::Transaction)
    }

    /// Explicitly discard every change. Dropping the transaction does the
    /// same thing, just less visibly.
    pub async fn rollback(self) -> Result<()> {
        self.inner.rollback().await.or_raise(|| ErrorKind::Transaction)
    }
}
