//! Blob storage for uploaded audio.
//!
//! Blobs are addressed by a relative key such as
//! `audio/{owner}/{uuid}.{ext}`; the key is what an
//! [`AudioSource::file_ref`](conspectium_core::AudioSource) stores.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use conspectium_core::{Error, Result};

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data under the given key, replacing existing content.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read the data stored under the given key.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete the data under the given key. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether data exists under the given key.
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Filesystem storage backend rooted at a base directory.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve a key below the base directory. Absolute keys and `..`
    /// components are rejected.
    fn full_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || !safe {
            return Err(Error::Validation(format!("invalid storage key: {key}")));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(key)?;
        debug!(storage_key = %key, full_path = %full_path.display(), size = data.len(), "file_storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "file_storage: create_dir_all failed");
                e
            })?;
        }

        // temp file + rename keeps readers from seeing partial blobs
        let temp_path = full_path.with_extension("part");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "file_storage: rename failed");
            e
        })?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(key)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("stored file {key}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.full_path(key)?;
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_path = self.full_path(key)?;
        Ok(fs::try_exists(full_path).await?)
    }
}

/// Compute BLAKE3 hash of data with "blake3:" prefix.
///
/// Returns a string in the format: `blake3:{64-char-hex}`
pub fn compute_content_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    format!("blake3:{}", hash.to_hex())
}

/// Storage key for an uploaded audio blob.
///
/// Format: `audio/{owner}/{id}.{ext}`; the extension is lowercased and
/// reduced to ASCII alphanumerics, falling back to `bin`.
pub fn generate_storage_path(owner_id: &Uuid, id: &Uuid, extension: Option<&str>) -> String {
    let ext: String = extension
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };
    format!("audio/{}/{}.{}", owner_id.as_hyphenated(), id.as_hyphenated(), ext)
}
