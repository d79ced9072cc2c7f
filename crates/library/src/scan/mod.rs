//! Reconciles the catalog against the media files under the library root.
//!
//! A scan runs in two phases. The whole tree is observed first (walk,
//! format detection, fingerprints) without touching the catalog. The
//! difference against the catalog is then applied inside one transaction,
//! so readers see either the catalog before the scan or after it, never
//! something in between.

mod disk;
pub(crate) mod error;
mod plan;
mod walk;

pub use self::disk::{DiskFile, DiskSet, observe};
pub use self::plan::{Move, Plan, Update, diff};
pub use self::walk::{Listing, ListingStream, listings};
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::scan::error::{ErrorKind, Result as ScanResult};
use derive_more::Display;
use exn::ResultExt;
use pikaraoke_catalog::{Repository, Transaction};
use std::path::Path;
use tracing::instrument;

/// What a scan changed in the catalog.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq)]
#[display("{added} added, {moved} moved, {updated} updated, {deleted} deleted")]
pub struct ScanStats {
    pub added: usize,
    pub moved: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Bring the catalog in line with the files under `root`.
///
/// On error nothing has been written.
pub async fn scan(cache: &Repository, root: impl AsRef<Path>) -> LibraryResult<ScanStats> {
    scan_inner(cache, root.as_ref()).await.or_raise(|| LibraryErrorKind::Scan)
}

#[instrument("scan", skip_all, fields(root = %root.display()))]
pub(crate) async fn scan_inner(cache: &Repository, root: &Path) -> ScanResult<ScanStats> {
    tracing::info!("Scanning library");
    let disk = observe(root).await?;

    let mut tx = cache.begin().await.or_raise(|| ErrorKind::Transaction)?;
    let entries = tx.entries().await.or_raise(|| ErrorKind::Catalog)?;
    let plan = diff(&disk, entries);
    if plan.is_empty() {
        tx.rollback().await.or_raise(|| ErrorKind::Transaction)?;
        tracing::info!(files = disk.len(), "Catalog already up to date");
        return Ok(ScanStats::default());
    }

    apply(&mut tx, &plan).await?;
    tx.commit().await.or_raise(|| ErrorKind::Transaction)?;
    let stats = plan.stats();
    tracing::info!(files = disk.len(), %stats, "Library scan complete");
    Ok(stats)
}

/// Write a plan through an open transaction. Dropping `tx` after an error
/// rolls everything back.
async fn apply(tx: &mut Transaction, plan: &Plan) -> ScanResult<()> {
    for update in &plan.updates {
        tracing::debug!(id = update.id.0, content_changed = update.content_changed, "Updating entry");
        tx.update_content(
            update.id,
            &update.filename,
            update.format,
            update.fingerprint.as_ref(),
            update.content_changed,
        )
        .await
        .or_raise(|| ErrorKind::Transaction)?;
    }
    for moved in &plan.moves {
        tracing::debug!(id = moved.id.0, from = %moved.from, to = %moved.to, "Relocating entry");
        tx.relocate(moved.id, &moved.to, &moved.filename, moved.format)
            .await
            .or_raise(|| ErrorKind::Transaction)?;
    }
    for entry in &plan.inserts {
        let id = tx.insert(entry).await.or_raise(|| ErrorKind::Transaction)?;
        tracing::debug!(id = id.0, path = %entry.path, format = %entry.format, "Added entry");
    }
    for id in &plan.deletes {
        tracing::debug!(id = id.0, "Deleting entry");
        tx.delete(*id).await.or_raise(|| ErrorKind::Transaction)?;
    }
    Ok(())
}
