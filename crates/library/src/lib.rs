//! Keeps the song catalog in step with a karaoke library on disk.
//!
//! The files under the library root are the source of truth. A
//! [`scan`](Library::scan) walks them, pairs companions (`.mp3`+`.cdg`,
//! video+`.ass`) into catalogued formats, fingerprints their content and
//! reconciles the catalog: new files are added, changed files updated,
//! moved files keep their entry (and its metadata) and vanished files are
//! removed.
//!
//! [`Library`] also exposes the catalog's disaster recovery: hot snapshots
//! and restores from an uploaded snapshot.

pub mod error;
pub mod fingerprint;
pub mod format;
mod library;
pub mod scan;

pub use crate::library::Library;
pub use crate::scan::ScanStats;
