//! Disaster recovery: hot snapshots and file-swap restores.
//!
//! Snapshots are taken with `VACUUM INTO`, which reads from a consistent
//! snapshot of the live database without blocking writers. Restores validate
//! the candidate first, then close the pool, swap the canonical file and
//! reopen it through [`Database::connect`] so the schema gets bootstrapped if
//! the restored file is empty.

use crate::Database;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::macros::format_description;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::instrument;

/// Every SQLite 3 database file starts with these 16 bytes.
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";
const SNAPSHOT_PREFIX: &str = "pikaraoke_backup_";
const SNAPSHOT_EXTENSION: &str = "db";
const SIDE_FILE_SUFFIXES: [&str; 2] = ["-wal", "-shm"];
const ROLLBACK_SUFFIX: &str = ".pre-restore";
const PARTIAL_SUFFIX: &str = ".partial";
const RESTORE_OK: &str = "Restore successful. Database updated.";

/// Name of the snapshot file taken at the given moment, e.g.
/// `pikaraoke_backup_20240131_235959.db`.
pub fn snapshot_filename(at: OffsetDateTime) -> Result<String> {
    let stamp = at
        .format(format_description!("[year][month][day]_[hour][minute][second]"))
        .or_raise(|| ErrorKind::Snapshot)?;
    Ok(format!("{SNAPSHOT_PREFIX}{stamp}.{SNAPSHOT_EXTENSION}"))
}

/// Write a snapshot of the live catalog into `destination`.
///
/// Failure is not fatal to the running process: the cause is logged and
/// `None` is returned. Use [`try_snapshot`] to get hold of the error instead.
pub async fn snapshot(db: &Database, destination: impl AsRef<Path>) -> Option<PathBuf> {
    match try_snapshot(db, destination).await {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::error!(error = ?err, "Catalog snapshot failed");
            None
        },
    }
}

/// Write a snapshot of the live catalog into `destination`, creating the
/// directory if needed, and return the path of the snapshot file.
#[instrument("writing catalog snapshot", skip_all, fields(destination = %destination.as_ref().display()))]
pub async fn try_snapshot(db: &Database, destination: impl AsRef<Path>) -> Result<PathBuf> {
    let destination = destination.as_ref();
    fs::create_dir_all(destination).await.or_raise(|| ErrorKind::Snapshot)?;
    // Snapshot names are for humans browsing a backup folder: local time,
    // unless the local offset cannot be determined (multi-threaded runtime).
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let target = destination.join(snapshot_filename(now)?);
    snapshot_into(db, &target).await?;
    tracing::info!(path = %target.display(), "Wrote catalog snapshot");
    Ok(target)
}

/// Hot-copy the live catalog to `target`, replacing any file already there.
///
/// `VACUUM INTO` refuses to overwrite, so the copy is written next to the
/// target and renamed over it. A reader of `target` never sees a partial
/// snapshot.
async fn snapshot_into(db: &Database, target: &Path) -> Result<()> {
    let partial = with_suffix(target, PARTIAL_SUFFIX);
    if let Err(err) = fs::remove_file(&partial).await
        && err.kind() != IoErrorKind::NotFound
    {
        return Err(err).or_raise(|| ErrorKind::Snapshot);
    }
    let partial_str = partial.to_str().ok_or_raise(|| ErrorKind::InvalidData("snapshot path"))?;
    let written = sqlx::query("VACUUM INTO ?").bind(partial_str).execute(db.pool()).await;
    if let Err(err) = written {
        _ = fs::remove_file(&partial).await;
        return Err(err).or_raise(|| ErrorKind::Snapshot);
    }
    fs::rename(&partial, target).await.or_raise(|| ErrorKind::Snapshot)
}

/// Replace the live catalog with the database file at `source`.
///
/// The candidate is checked for the SQLite header before anything live is
/// touched; a rejected candidate returns
/// [`InvalidRestoreSource`](ErrorKind::InvalidRestoreSource) and leaves the
/// store as it was.
///
/// Once the swap has started, any failure puts the previous catalog file
/// back (if it had been preserved) and reconnects `db` to it before
/// returning [`RestoreSwap`](ErrorKind::RestoreSwap). Callers should treat
/// the store as suspect after a failed swap.
#[instrument("restoring catalog", skip_all, fields(source = %source.as_ref().display()))]
pub async fn restore(db: &mut Database, source: impl AsRef<Path>) -> Result<String> {
    let source = source.as_ref();
    let live = db
        .path()
        .map(Path::to_path_buf)
        .ok_or_raise(|| ErrorKind::RestoreSwap("in-memory catalog has no file to replace".to_string()))?;
    validate_source(source, &live).await?;

    db.close().await;
    let rollback = with_suffix(&live, ROLLBACK_SUFFIX);
    match swap(source, &live, &rollback).await {
        Ok(restored) => {
            *db = restored;
            if let Err(err) = fs::remove_file(&rollback).await
                && err.kind() != IoErrorKind::NotFound
            {
                tracing::warn!(path = %rollback.display(), error = %err, "Could not remove pre-restore copy");
            }
            tracing::info!(live = %live.display(), "Catalog restored");
            Ok(RESTORE_OK.to_string())
        },
        Err(err) => {
            tracing::error!(error = ?err, "Catalog restore failed; reconnecting to previous catalog");
            recover(db, &live, &rollback).await;
            Err(err)
        },
    }
}

async fn validate_source(source: &Path, live: &Path) -> Result<()> {
    let file = match fs::File::open(source).await {
        Ok(file) => file,
        Err(err) if err.kind() == IoErrorKind::NotFound => {
            exn::bail!(ErrorKind::InvalidRestoreSource("upload file not found".to_string()))
        },
        Err(err) => exn::bail!(ErrorKind::InvalidRestoreSource(format!("could not open upload: {err}"))),
    };
    let mut header = Vec::with_capacity(SQLITE_HEADER.len());
    file.take(SQLITE_HEADER.len() as u64)
        .read_to_end(&mut header)
        .await
        .or_raise(|| ErrorKind::InvalidRestoreSource("could not read upload".to_string()))?;
    if header.as_slice() != SQLITE_HEADER {
        exn::bail!(ErrorKind::InvalidRestoreSource("not a SQLite database".to_string()));
    }
    // Copying a file over itself truncates it.
    if let (Ok(a), Ok(b)) = (fs::canonicalize(source).await, fs::canonicalize(live).await)
        && a == b
    {
        exn::bail!(ErrorKind::InvalidRestoreSource("upload is the live catalog itself".to_string()));
    }
    Ok(())
}

async fn swap(source: &Path, live: &Path, rollback: &Path) -> Result<Database> {
    remove_side_files(live).await;
    // A stale copy from an earlier crashed restore must never be mistaken
    // for the catalog we are about to replace.
    _ = fs::remove_file(rollback).await;
    if fs::try_exists(live).await.unwrap_or(false)
        && let Err(err) = copy_with_metadata(live, rollback).await
    {
        _ = fs::remove_file(rollback).await;
        exn::bail!(ErrorKind::RestoreSwap(format!("could not preserve the current catalog: {err}")));
    }
    copy_with_metadata(source, live)
        .await
        .or_raise(|| ErrorKind::RestoreSwap("could not copy the upload over the live catalog".to_string()))?;
    Database::connect(live)
        .await
        .or_raise(|| ErrorKind::RestoreSwap("restored catalog could not be opened".to_string()))
}

/// Best effort: put the preserved catalog back and reconnect to it.
async fn recover(db: &mut Database, live: &Path, rollback: &Path) {
    if fs::try_exists(rollback).await.unwrap_or(false) {
        remove_side_files(live).await;
        match copy_with_metadata(rollback, live).await {
            Ok(()) => {
                _ = fs::remove_file(rollback).await;
            },
            Err(err) => {
                tracing::error!(path = %rollback.display(), error = %err, "Could not put the previous catalog back");
            },
        }
    }
    match Database::connect(live).await {
        Ok(reconnected) => *db = reconnected,
        Err(err) => tracing::error!(error = ?err, "Could not reconnect to the catalog after a failed restore"),
    }
}

/// Remove the write-ahead log and shared-memory files next to the catalog.
///
/// Missing files are fine. Other failures are logged and counted but never
/// stop the restore: replacing the canonical file is what matters.
async fn remove_side_files(live: &Path) -> usize {
    let mut suppressed = 0;
    for suffix in SIDE_FILE_SUFFIXES {
        let side = with_suffix(live, suffix);
        match fs::remove_file(&side).await {
            Ok(()) => tracing::debug!(path = %side.display(), "Removed catalog side file"),
            Err(err) if err.kind() == IoErrorKind::NotFound => {},
            Err(err) => {
                suppressed += 1;
                tracing::warn!(path = %side.display(), error = %err, "Could not remove catalog side file");
            },
        }
    }
    if suppressed > 0 {
        tracing::warn!(suppressed, "Continuing restore with leftover side files");
    }
    suppressed
}

/// Copy a file, keeping its permissions and modification time.
async fn copy_with_metadata(from: &Path, to: &Path) -> std::io::Result<()> {
    // Permissions are carried over by the copy itself.
    fs::copy(from, to).await?;
    let modified = fs::metadata(from).await?.modified()?;
    let file = fs::OpenOptions::new().write(true).open(to).await?.into_std().await;
    if let Err(err) = file.set_modified(modified) {
        tracing::debug!(path = %to.display(), error = %err, "Could not preserve modification time");
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
