//! Blob storage
//!
//! Work proofs and profile photos land here. The store is a narrow
//! interface (`bytes + mime in, public reference out`); the lifecycle
//! never touches the filesystem directly.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::extension_for;

/// A stored blob and where it can be fetched from.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Externally resolvable reference, e.g. `/uploads/ravi_1f3a9c2b.pdf`
    pub url: String,
    /// Filename on disk
    pub filename: String,
}

/// Content-addressable-ish blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `data` and return its public reference.
    ///
    /// `owner` is folded into the name for traceability; a random suffix
    /// keeps names collision-free.
    async fn store(&self, owner: &str, data: &[u8], mime_type: &str) -> Result<StoredBlob>;
}

/// Blob store writing to a local directory served as static files.
pub struct LocalBlobStore {
    dir: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    pub fn new(dir: PathBuf, public_base: String) -> Self {
        Self { dir, public_base }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, owner: &str, data: &[u8], mime_type: &str) -> Result<StoredBlob> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create upload directory {:?}", self.dir))?;

        let suffix = Uuid::new_v4().simple().to_string();
        let filename = format!("{}_{}.{}", owner, &suffix[..8], extension_for(mime_type));
        let path = self.dir.join(&filename);

        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write upload {:?}", path))?;

        Ok(StoredBlob {
            url: format!("{}/{}", self.public_base.trim_end_matches('/'), filename),
            filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_writes_file_and_builds_reference() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = LocalBlobStore::new(dir.path().to_path_buf(), "/uploads".into());

        let blob = store
            .store("ravi", b"%PDF-1.4 fake", "application/pdf")
            .await
            .expect("Failed to store");

        assert!(blob.filename.starts_with("ravi_"));
        assert!(blob.filename.ends_with(".pdf"));
        assert_eq!(blob.url, format!("/uploads/{}", blob.filename));

        let on_disk = tokio::fs::read(dir.path().join(&blob.filename))
            .await
            .expect("Failed to read back");
        assert_eq!(on_disk, b"%PDF-1.4 fake");
    }

    #[tokio::test]
    async fn test_names_do_not_collide() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = LocalBlobStore::new(dir.path().to_path_buf(), "/uploads".into());

        let a = store.store("ravi", b"one", "image/png").await.unwrap();
        let b = store.store("ravi", b"two", "image/png").await.unwrap();
        assert_ne!(a.filename, b.filename);
    }
}
