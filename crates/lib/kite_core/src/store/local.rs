//! Filesystem object backend: one file per object under a root directory.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{Backend, ObjectStore, Result, StoreError, is_valid_object_key};

/// Stores media objects as files in `root`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Open the store, creating `root` if it does not exist.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Backend for LocalObjectStore {
    async fn ping(&self) -> Result<()> {
        let meta = tokio::fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StoreError::Io(io::Error::other(format!(
                "{} is not a directory",
                self.root.display()
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
        if !is_valid_object_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        // Written aside and renamed so readers never see a partial object.
        let partial = self.root.join(format!(".{}.part", Uuid::new_v4()));
        tokio::fs::write(&partial, &data).await?;
        if let Err(e) = tokio::fs::rename(&partial, self.root.join(key)).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        debug!(key, bytes = data.len(), "object stored");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if !is_valid_object_key(key) {
            return Ok(None);
        }
        match tokio::fs::read(self.root.join(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::open(dir.path().join("media/objects"))
            .await
            .unwrap();
        assert!(store.root().is_dir());
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn objects_are_files_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::open(dir.path()).await.unwrap();

        store.put_object("clip.mp4", b"frames".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("clip.mp4")).unwrap(), b"frames");
        assert_eq!(
            store.get_object("clip.mp4").await.unwrap().as_deref(),
            Some(&b"frames"[..])
        );

        store.put_object("clip.mp4", b"again".to_vec()).await.unwrap();
        assert_eq!(
            store.get_object("clip.mp4").await.unwrap().as_deref(),
            Some(&b"again"[..])
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::open(dir.path().join("inner")).await.unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"x").unwrap();

        assert!(store.get_object("../secret.txt").await.unwrap().is_none());
        let err = store.put_object("../escape.txt", vec![1]).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn missing_root_fails_the_ping() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::open(dir.path().join("gone")).await.unwrap();
        std::fs::remove_dir(store.root()).unwrap();
        assert!(store.ping().await.is_err());
    }
}
