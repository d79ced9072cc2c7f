//! Cheap content fingerprints for move detection.
//!
//! A fingerprint hashes the file size together with the first
//! [`HEAD_BYTES`] of content, so a scan never reads whole media files. Two
//! files that share a size and a head but differ further in are treated as
//! the same content; for karaoke media that trade-off is acceptable.

use pikaraoke_catalog::Fingerprint;
use std::io;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

/// How much of each file's head takes part in its fingerprint.
pub const HEAD_BYTES: u64 = 16 * 1024;

/// Fingerprint the file at `path`.
///
/// Returns `None` if the file cannot be opened or read. An unfingerprinted
/// file is still catalogued, it just never takes part in move detection.
pub async fn fingerprint(path: &Path) -> Option<Fingerprint> {
    match read_fingerprint(path).await {
        Ok(fingerprint) => Some(fingerprint),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Could not fingerprint file");
            None
        },
    }
}

async fn read_fingerprint(path: &Path) -> io::Result<Fingerprint> {
    let file = fs::File::open(path).await?;
    // Size comes from the open handle so it matches the bytes read.
    let size = file.metadata().await?.len();
    let mut head = Vec::with_capacity(HEAD_BYTES as usize);
    file.take(HEAD_BYTES).read_to_end(&mut head).await?;
    Ok(digest(size, &head))
}

/// Fingerprint of a file with the given size whose content starts with `head`.
pub fn digest(size: u64, head: &[u8]) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(size.to_string().as_bytes());
    hasher.update(head);
    Fingerprint::new(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_identical_content_matches() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.mp4", b"same bytes");
        let b = write(dir.path(), "b.mp4", b"same bytes");
        let fp = fingerprint(&a).await.unwrap();
        assert_eq!(Some(&fp), fingerprint(&b).await.as_ref());
        assert_eq!(fp, digest(10, b"same bytes"));
        assert_eq!(fp.as_str().len(), 64);
    }

    #[tokio::test]
    async fn test_head_change_differs() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.mp4", b"first version");
        let b = write(dir.path(), "b.mp4", b"other version");
        assert_ne!(fingerprint(&a).await, fingerprint(&b).await);
    }

    #[tokio::test]
    async fn test_size_change_differs() {
        let dir = tempfile::tempdir().unwrap();
        let head = vec![7u8; HEAD_BYTES as usize];
        let mut longer = head.clone();
        longer.push(0);
        let a = write(dir.path(), "a.zip", &head);
        let b = write(dir.path(), "b.zip", &longer);
        assert_ne!(fingerprint(&a).await, fingerprint(&b).await);
    }

    #[tokio::test]
    async fn test_tail_change_is_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![1u8; HEAD_BYTES as usize + 100];
        let a = write(dir.path(), "a.zip", &bytes);
        *bytes.last_mut().unwrap() = 2;
        let b = write(dir.path(), "b.zip", &bytes);
        assert_eq!(fingerprint(&a).await, fingerprint(&b).await);
    }

    #[tokio::test]
    async fn test_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fingerprint(&dir.path().join("missing.mp4")).await.is_none());
        // Directories open but cannot be read.
        assert!(fingerprint(dir.path()).await.is_none());
    }
}
