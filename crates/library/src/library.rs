use crate::error::{ErrorKind, Result};
use crate::scan::{ScanStats, scan};
use exn::ResultExt;
use pikaraoke_catalog::error::ErrorKind as CatalogErrorKind;
use pikaraoke_catalog::{Database, Repository, recovery};
use pikaraoke_config::Config;
use std::path::{Path, PathBuf};

/// A karaoke library: a root directory of media files and the catalog that
/// mirrors it.
#[derive(Debug)]
pub struct Library {
    root: PathBuf,
    backup_dir: PathBuf,
    db: Database,
}

impl Library {
    /// Open (creating if needed) the catalog named in `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::Config)?;
        let path = &config.catalog.path;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Catalog)?;
        }
        let db = Database::connect(path).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::info!(root = %config.library.root.display(), catalog = %path.display(), "Opened library");
        Ok(Self::new(&config.library.root, &config.catalog.backup_dir, db))
    }

    pub fn new(root: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>, db: Database) -> Self {
        Self { root: root.into(), backup_dir: backup_dir.into(), db }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// A repository over the current catalog.
    ///
    /// A restore swaps the underlying database, so don't hold on to the
    /// returned repository across [`Library::restore`].
    pub fn repository(&self) -> Repository {
        Repository::from(&self.db)
    }

    /// Reconcile the catalog with the files under the library root.
    pub async fn scan(&self) -> Result<ScanStats> {
        scan(&self.repository(), &self.root).await
    }

    /// Write a snapshot of the catalog into the backup directory.
    ///
    /// Returns `None` (after logging why) if the snapshot failed; a failed
    /// snapshot never affects the live catalog.
    pub async fn snapshot(&self) -> Option<PathBuf> {
        recovery::snapshot(&self.db, &self.backup_dir).await
    }

    /// Replace the catalog with the snapshot at `upload`.
    ///
    /// Returns a human readable success message. A rejected upload leaves
    /// the live catalog untouched; a failed swap puts the previous catalog
    /// back before returning.
    pub async fn restore(&mut self, upload: impl AsRef<Path>) -> Result<String> {
        recovery::restore(&mut self.db, upload).await.map_err(|err| {
            let kind = match &*err {
                CatalogErrorKind::InvalidRestoreSource(reason) => ErrorKind::RestoreRejected(reason.clone()),
                _ => ErrorKind::RestoreFailed,
            };
            err.raise(kind)
        })
    }

    /// Queue every entry for metadata enrichment again.
    pub async fn reset_all_to_pending(&self) -> Result<u64> {
        self.repository().reset_all_to_pending().await.or_raise(|| ErrorKind::Catalog)
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}
