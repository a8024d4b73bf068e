//! Subscription file backing store.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

/// Read-only store of subscription documents keyed by filename.
///
/// The trait seam exists so the assembler can be exercised against
/// in-memory doubles; the production implementation is [`DirStore`].
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Reads the document stored under `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::NotFound`] for unknown filenames; any
    /// other error is an I/O failure of the underlying storage.
    async fn read(&self, filename: &str) -> io::Result<Vec<u8>>;
}

/// Store backed by a flat directory on disk.
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    /// Creates a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Filenames must stay inside the store: only plain path components,
/// no parent references, no absolute paths.
fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && Path::new(filename)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl SubscriptionStore for DirStore {
    async fn read(&self, filename: &str) -> io::Result<Vec<u8>> {
        if !is_safe_filename(filename) {
            debug!(filename, "rejected unsafe subscription filename");
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "invalid subscription filename",
            ));
        }

        tokio::fs::read(self.dir.join(filename)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sub1.yaml"), b"port: 7890\n").unwrap();

        let store = DirStore::new(dir.path());
        assert_eq!(store.read("sub1.yaml").await.unwrap(), b"port: 7890\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());

        let err = store.read("nope.yaml").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());

        for name in ["../etc/passwd", "/etc/passwd", "a/../../b", ""] {
            let err = store.read(name).await.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::NotFound, "filename: {name}");
        }
    }

    #[test]
    fn test_nested_plain_paths_allowed() {
        assert!(is_safe_filename("sub1.yaml"));
        assert!(is_safe_filename("acme/sub1.yaml"));
        assert!(!is_safe_filename(".."));
    }
}
