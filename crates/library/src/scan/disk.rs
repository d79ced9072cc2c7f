use crate::fingerprint::fingerprint;
use crate::format::classify;
use crate::scan::error::Result;
use crate::scan::walk::listings;
use futures::{StreamExt, TryStreamExt};
use pikaraoke_catalog::{Fingerprint, Format};
use std::collections::BTreeMap;
use std::path::Path;

/// Files fingerprinted at once within a directory.
const FINGERPRINT_CONCURRENCY: usize = 8;

/// A catalogued media file as it currently exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskFile {
    pub filename: String,
    pub format: Format,
    /// `None` if the file could not be read.
    pub fingerprint: Option<Fingerprint>,
}

/// Every catalogued media file under the library root, keyed by
/// root-relative path.
pub type DiskSet = BTreeMap<String, DiskFile>;

/// Walk, classify and fingerprint the whole library.
///
/// Completes before anything is written so that a failure part-way through
/// leaves the catalog untouched.
pub async fn observe(root: &Path) -> Result<DiskSet> {
    let mut disk = DiskSet::new();
    let mut stream = listings(root);
    while let Some(listing) = stream.try_next().await? {
        let classified = classify(&listing);
        let files: Vec<(String, DiskFile)> = futures::stream::iter(classified)
            .map(|(path, (filename, format))| {
                let absolute = listing.absolute.join(&filename);
                async move {
                    let fingerprint = fingerprint(&absolute).await;
                    (path, DiskFile { filename, format, fingerprint })
                }
            })
            .buffer_unordered(FINGERPRINT_CONCURRENCY)
            .collect()
            .await;
        disk.extend(files);
    }
    tracing::debug!(files = disk.len(), "Library observed");
    Ok(disk)
}
