//! Object storage for plant images.

use crate::db::{
    errors::{DbError, Result},
    models::file_storage::{FileStorageRequest, FileStorageResponse},
};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Trait for file storage backends
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store file content and return storage key
    async fn store(&self, request: FileStorageRequest) -> Result<FileStorageResponse>;

    /// Retrieve file content using storage key
    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>>;

    /// Delete file content using storage key. Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> Result<()>;

    /// Check if file exists using storage key
    async fn exists(&self, storage_key: &str) -> Result<bool>;
}

/// Stores files in a directory, sharded by the first two characters of a random UUID.
pub struct LocalFileStorage {
    base_path: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Resolve a key to a path under the storage root. Keys come from URLs, so anything that could
    /// escape the root is treated as missing.
    fn resolve(&self, storage_key: &str) -> Result<PathBuf> {
        let relative = Path::new(storage_key);
        let safe = !storage_key.is_empty() && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(DbError::NotFound);
        }
        Ok(self.base_path.join(relative))
    }
}

fn sanitize_extension(extension: &str) -> String {
    let ext: String = extension
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() { "bin".to_string() } else { ext }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, request: FileStorageRequest) -> Result<FileStorageResponse> {
        let file_uuid = uuid::Uuid::new_v4().to_string();
        let relative_path = format!("{}/{}.{}", &file_uuid[..2], file_uuid, sanitize_extension(&request.extension));

        let full_path = self.base_path.join(&relative_path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&request.content).await?;
        file.sync_all().await?;

        tracing::debug!(storage_key = %relative_path, bytes = request.content.len(), "Stored file");

        Ok(FileStorageResponse {
            storage_key: relative_path,
        })
    }

    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(storage_key)?;

        match fs::read(&full_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DbError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, storage_key: &str) -> Result<()> {
        let full_path = self.resolve(storage_key)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, storage_key: &str) -> Result<bool> {
        match self.resolve(storage_key) {
            Ok(full_path) => Ok(fs::try_exists(&full_path).await?),
            Err(_) => Ok(false),
        }
    }
}

/// Create the configured storage backend, making sure its root directory exists.
pub async fn create_file_storage(config: &crate::config::StorageConfig) -> Result<Arc<dyn FileStorage>> {
    tracing::info!("Creating local file storage backend (path: {:?})", config.path);
    if let Err(e) = fs::create_dir_all(&config.path).await {
        return Err(DbError::Other(anyhow::anyhow!(
            "Failed to create local storage directory {:?}: {}",
            config.path,
            e
        )));
    }
    Ok(Arc::new(LocalFileStorage::new(config.path.clone())))
}
