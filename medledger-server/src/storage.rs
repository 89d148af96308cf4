//! Attachment blob storage.
//!
//! Blobs are keyed by a generated id plus the original (sanitized) file
//! name; metadata lives in the database. The store trait keeps the backend
//! swappable; the local-filesystem implementation is the default.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const STORED_PREFIX: &str = "/attachments/";

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist a blob; returns the stored path recorded in metadata.
    async fn save(&self, key: &str, file_name: &str, bytes: &[u8]) -> io::Result<String>;
    async fn read(&self, stored_path: &str) -> io::Result<Vec<u8>>;
    async fn remove(&self, stored_path: &str) -> io::Result<()>;
}

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, stored_path: &str) -> io::Result<PathBuf> {
        let relative = stored_path.strip_prefix(STORED_PREFIX).unwrap_or(stored_path);
        if Path::new(relative)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path escapes storage root",
            ));
        }
        Ok(self.root.join(relative))
    }
}

/// Strip directory components from a client-supplied file name.
pub fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .replace("..", "_")
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, key: &str, file_name: &str, bytes: &[u8]) -> io::Result<String> {
        let file_name = sanitize_file_name(file_name);
        let dir = self.root.join(key);
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(&file_name), bytes).await?;
        debug!(key = %key, file = %file_name, size = bytes.len(), "attachment stored");
        Ok(format!("{}{}/{}", STORED_PREFIX, key, file_name))
    }

    async fn read(&self, stored_path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(stored_path)?).await
    }

    async fn remove(&self, stored_path: &str) -> io::Result<()> {
        let path = self.resolve(stored_path)?;
        fs::remove_file(&path).await?;
        // Drop the per-attachment directory if it is now empty.
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir(parent).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("scan.pdf"), "scan.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("dir\\evil.exe"), "evil.exe");
        assert_eq!(sanitize_file_name("weird..name.pdf"), "weird_name.pdf");
    }

    #[test]
    fn resolve_rejects_traversal() {
        let store = LocalFileStore::new("/tmp/medledger-test");
        assert!(store.resolve("/attachments/abc/../../../etc/passwd").is_err());
        assert!(store.resolve("/attachments/abc/scan.pdf").is_ok());
    }

    #[tokio::test]
    async fn save_read_remove_round_trip() {
        let root = std::env::temp_dir().join(format!("medledger-store-{}", uuid::Uuid::new_v4()));
        let store = LocalFileStore::new(&root);

        let stored = store.save("key-1", "note.txt", b"hello").await.unwrap();
        assert!(stored.starts_with("/attachments/key-1/"));
        assert_eq!(store.read(&stored).await.unwrap(), b"hello");

        store.remove(&stored).await.unwrap();
        assert!(store.read(&stored).await.is_err());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
