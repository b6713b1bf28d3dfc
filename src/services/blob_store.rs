// src/services/blob_store.rs
// DOCUMENTATION: Storage for uploaded image bytes
// PURPOSE: Write/read/delete files under the upload directory by generated name

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("invalid blob name: {0}")]
    InvalidName(String),

    #[error("I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Blob storage seam used by the integrity manager
/// DOCUMENTATION: Names are always produced by `generate_unique_name`;
/// client-supplied filenames never reach the store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fresh name with an extension matching the content type
    fn generate_unique_name(&self, content_type: &str) -> String;

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), BlobError>;

    /// `None` when the blob does not exist
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, BlobError>;

    async fn exists(&self, name: &str) -> Result<bool, BlobError>;

    /// Deleting a missing blob is a no-op
    async fn delete(&self, name: &str) -> Result<(), BlobError>;
}

/// File extension for an upload content type
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "image/tiff" => "tiff",
        _ => "bin",
    }
}

/// Content type to serve a stored blob with, derived from its extension
pub fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "tiff" => "image/tiff",
        _ => "image/jpeg",
    }
}

/// LocalBlobStore: one flat directory on the local filesystem
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create the store, creating `root` if it does not exist yet
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| BlobError::Io {
                name: root.display().to_string(),
                source,
            })?;

        log::info!("Blob store ready at {}", root.display());
        Ok(Self { root })
    }

    /// Resolve a generated name inside the root; anything that could
    /// escape the directory is rejected
    fn path_for(&self, name: &str) -> Result<PathBuf, BlobError> {
        let is_plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(|c: char| c == '/' || c == '\\' || c == '\0');

        if !is_plain {
            return Err(BlobError::InvalidName(name.to_string()));
        }

        Ok(self.root.join(name))
    }
}

fn io_error(name: &str, source: std::io::Error) -> BlobError {
    BlobError::Io {
        name: name.to_string(),
        source,
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn generate_unique_name(&self, content_type: &str) -> String {
        format!("{}.{}", Uuid::new_v4().simple(), extension_for(content_type))
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| io_error(name, e))?;

        log::debug!("Wrote blob {} ({} bytes)", name, bytes.len());
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(name, e)),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        let path = self.path_for(name)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error(name, e))
    }

    async fn delete(&self, name: &str) -> Result<(), BlobError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                log::debug!("Deleted blob {}", name);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(name, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::open(dir.path()).await.unwrap();
        let name = store.generate_unique_name("image/png");

        store.write(&name, b"not really a png").await.unwrap();
        assert!(store.exists(&name).await.unwrap());
        assert_eq!(
            store.read(&name).await.unwrap().as_deref(),
            Some(&b"not really a png"[..])
        );

        store.delete(&name).await.unwrap();
        assert!(!store.exists(&name).await.unwrap());
        assert!(store.read(&name).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::open(dir.path()).await.unwrap();

        assert!(store.delete("never-written.jpg").await.is_ok());
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("uploads").join("images");

        LocalBlobStore::open(&nested).await.unwrap();

        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_rejects_names_outside_root() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::open(dir.path()).await.unwrap();

        assert!(matches!(
            store.write("../escape.jpg", b"x").await,
            Err(BlobError::InvalidName(_))
        ));
        assert!(matches!(
            store.read("a/b.jpg").await,
            Err(BlobError::InvalidName(_))
        ));
    }

    #[test]
    fn test_generated_names_are_unique() {
        let store = LocalBlobStore {
            root: PathBuf::from("unused"),
        };
        let first = store.generate_unique_name("image/jpeg");
        let second = store.generate_unique_name("image/jpeg");

        assert_ne!(first, second);
        assert!(first.ends_with(".jpg"));
    }

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("IMAGE/JPEG; charset=binary"), "jpg");
        assert_eq!(extension_for("application/pdf"), "bin");
        assert_eq!(content_type_for("abc.png"), "image/png");
        assert_eq!(content_type_for("abc"), "image/jpeg");
    }
}
