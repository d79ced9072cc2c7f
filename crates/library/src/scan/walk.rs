//! Directory walk producing one [`Listing`] per directory.
//!
//! Format detection needs to see a file's siblings, so the walk groups files
//! by directory instead of yielding them one at a time.

use crate::scan::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs::{self, DirEntry};

pub type ListingStream<'a> = Pin<Box<dyn Stream<Item = Result<Listing>> + Send + 'a>>;

/// The files found directly inside one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Directory relative to the library root, `/`-separated. Empty for the
    /// root itself.
    pub dir: String,
    /// Where the directory lives on disk.
    pub absolute: PathBuf,
    /// Names of regular files (and links to regular files), sorted.
    pub files: Vec<String>,
}

impl Listing {
    /// The root-relative path of a file in this directory.
    pub fn relative(&self, name: &str) -> String {
        join(&self.dir, name)
    }
}

enum WalkEntry {
    File(String),
    Descend(PathBuf, String),
    Skip,
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() { name.to_string() } else { format!("{dir}/{name}") }
}

/// Walk `root` recursively.
///
/// Links to files are followed; links to directories are not descended, so
/// a link cycle cannot make the walk run forever. Names that are not valid
/// UTF-8 are skipped with a warning.
///
/// A directory that cannot be listed yields an error: the caller must not
/// mistake its contents for deleted files. A subdirectory that disappears
/// mid-walk is treated as empty.
pub fn listings(root: &Path) -> ListingStream<'_> {
    let mut stack = vec![(root.to_path_buf(), String::new())];

    Box::pin(stream! {
        'dirs: while let Some((current, dir)) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound && !dir.is_empty() => {
                    tracing::debug!(path = %current.display(), "Directory vanished during scan");
                    continue 'dirs;
                },
                Err(err) => {
                    yield Err::<Listing, _>(err).or_raise(|| ErrorKind::Walk(current.clone()));
                    continue 'dirs;
                },
            };

            let mut files = Vec::new();
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        yield Err::<Listing, _>(err).or_raise(|| ErrorKind::Walk(current.clone()));
                        continue 'dirs;
                    },
                };
                match process_entry(&entry, &dir).await {
                    Ok(WalkEntry::File(name)) => files.push(name),
                    Ok(WalkEntry::Descend(path, relative)) => stack.push((path, relative)),
                    Ok(WalkEntry::Skip) => {},
                    Err(err) => {
                        tracing::warn!(path = %entry.path().display(), error = %err, "Skipping unreadable entry");
                    },
                }
            }
            files.sort();
            yield Ok(Listing { dir, absolute: current, files });
        }
    })
}

async fn process_entry(entry: &DirEntry, dir: &str) -> io::Result<WalkEntry> {
    let file_type = entry.file_type().await?;
    let Ok(name) = entry.file_name().into_string() else {
        tracing::warn!(path = %entry.path().display(), "Skipping file with a non UTF-8 name");
        return Ok(WalkEntry::Skip);
    };
    if file_type.is_dir() {
        return Ok(WalkEntry::Descend(entry.path(), join(dir, &name)));
    }
    if file_type.is_file() {
        return Ok(WalkEntry::File(name));
    }
    if file_type.is_symlink() {
        return Ok(match fs::metadata(entry.path()).await {
            Ok(target) if target.is_file() => WalkEntry::File(name),
            Ok(_) => WalkEntry::Skip,
            Err(err) => {
                tracing::debug!(path = %entry.path().display(), error = %err, "Skipping dangling link");
                WalkEntry::Skip
            },
        });
    }
    Ok(WalkEntry::Skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(root: &Path) -> Vec<Listing> {
        let mut listings: Vec<Listing> = listings(root).map(|listing| listing.unwrap()).collect().await;
        listings.sort_by(|a, b| a.dir.cmp(&b.dir));
        listings
    }

    #[tokio::test]
    async fn test_groups_files_by_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("ABBA/Live")).unwrap();
        std::fs::write(root.path().join("top.zip"), b"x").unwrap();
        std::fs::write(root.path().join("ABBA/Waterloo.mp3"), b"x").unwrap();
        std::fs::write(root.path().join("ABBA/Waterloo.cdg"), b"x").unwrap();
        std::fs::write(root.path().join("ABBA/Live/SOS.mp4"), b"x").unwrap();

        let listings = collect(root.path()).await;
        let dirs: Vec<&str> = listings.iter().map(|l| l.dir.as_str()).collect();
        assert_eq!(dirs, ["", "ABBA", "ABBA/Live"]);
        assert_eq!(listings[0].files, ["top.zip"]);
        assert_eq!(listings[1].files, ["Waterloo.cdg", "Waterloo.mp3"]);
        assert_eq!(listings[2].relative("SOS.mp4"), "ABBA/Live/SOS.mp4");
        assert_eq!(listings[2].absolute, root.path().join("ABBA/Live"));
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        let results: Vec<Result<Listing>> = listings(&missing).collect().await;
        assert_eq!(results.len(), 1);
        let err = results.into_iter().next().unwrap().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Walk(path) if *path == missing));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_links() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("real.mp4"), b"x").unwrap();
        std::fs::create_dir(root.path().join("sub")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("real.mp4"), root.path().join("linked.mp4")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("gone.mp4"), root.path().join("dangling.mp4")).unwrap();
        // A link back to the root must not loop.
        std::os::unix::fs::symlink(root.path(), root.path().join("sub/loop")).unwrap();

        let listings = collect(root.path()).await;
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].files, ["linked.mp4"]);
        assert!(listings[1].files.is_empty());
    }
}
