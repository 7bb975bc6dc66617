//! Sequential upload of image files with a status per file.
//!
//! Each file moves through `pending → converting → uploading → uploaded`, or ends in `failed` at
//! whichever step went wrong. Files are handled one at a time and a failure never stops the files
//! after it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::handlers::file_storage::FileStorage;
use crate::db::models::file_storage::FileStorageRequest;
use crate::images::convert::ImageConverter;
use crate::images::format::ImageFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Converting,
    Uploading,
    Uploaded,
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Uploaded | Self::Failed)
    }
}

/// Tracks where one file is in the pipeline
#[derive(Debug, Clone)]
pub struct UploadProgress {
    pub filename: String,
    pub status: UploadStatus,
    pub error: Option<String>,
    /// Every status the file passed through, in order
    pub history: Vec<UploadStatus>,
}

impl UploadProgress {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: UploadStatus::Pending,
            error: None,
            history: vec![UploadStatus::Pending],
        }
    }

    /// Move to the next status. Terminal statuses are never left.
    pub fn advance(&mut self, status: UploadStatus) {
        if self.status.is_terminal() {
            return;
        }
        tracing::debug!(filename = %self.filename, from = ?self.status, to = ?status, "Upload status changed");
        self.status = status;
        self.history.push(status);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.status.is_terminal() {
            return;
        }
        tracing::warn!(filename = %self.filename, step = ?self.status, reason = %reason, "Image upload failed");
        self.error = Some(reason);
        self.advance(UploadStatus::Failed);
    }
}

/// A file received from a multipart form
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// What ended up in storage for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: i64,
}

pub struct ImagePipeline {
    storage: Arc<dyn FileStorage>,
    converter: ImageConverter,
    max_file_size: u64,
}

impl ImagePipeline {
    pub fn new(storage: Arc<dyn FileStorage>, converter: ImageConverter, max_file_size: u64) -> Self {
        Self {
            storage,
            converter,
            max_file_size,
        }
    }

    /// Detect, convert and store one file. Returns `None` when the file failed, in which case
    /// `progress` carries the reason.
    ///
    /// A stored file is left at `uploading`: the caller marks it `uploaded` once the image row
    /// exists, or discards it and fails the file.
    #[tracing::instrument(skip(self, file, progress), fields(filename = %file.filename, size = file.bytes.len()))]
    pub async fn upload_one(&self, file: IncomingFile, progress: &mut UploadProgress) -> Option<StoredImage> {
        if file.bytes.is_empty() {
            progress.fail("file is empty");
            return None;
        }
        if file.bytes.len() as u64 > self.max_file_size {
            progress.fail(format!(
                "file is {} bytes, larger than the {} byte limit",
                file.bytes.len(),
                self.max_file_size
            ));
            return None;
        }

        let Some(format) = ImageFormat::detect(&file.bytes, Some(&file.filename), file.declared_type.as_deref()) else {
            progress.fail("unsupported file type; expected JPEG, PNG, GIF, WebP or HEIC");
            return None;
        };

        progress.advance(UploadStatus::Converting);
        let converted = match self.converter.convert(file.bytes, format).await {
            Ok(converted) => converted,
            Err(e) => {
                progress.fail(e.to_string());
                return None;
            }
        };

        progress.advance(UploadStatus::Uploading);
        let size_bytes = converted.bytes.len() as i64;
        let stored = self
            .storage
            .store(FileStorageRequest {
                content: converted.bytes,
                extension: converted.format.extension().to_string(),
            })
            .await;

        match stored {
            Ok(response) => {
                Some(StoredImage {
                    storage_key: response.storage_key,
                    content_type: converted.format.mime_type().to_string(),
                    size_bytes,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to write image to storage");
                progress.fail("could not store the file");
                None
            }
        }
    }

    /// Remove a stored file after a later step (such as the database insert) failed
    pub async fn discard(&self, image: &StoredImage) {
        if let Err(e) = self.storage.delete(&image.storage_key).await {
            tracing::warn!(storage_key = %image.storage_key, error = %e, "Failed to remove orphaned image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImagesConfig;
    use crate::db::handlers::file_storage::LocalFileStorage;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::io::Cursor;

    fn png() -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(4, 4, Rgb([200u8, 40, 90]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn pipeline(dir: &tempfile::TempDir, max_file_size: u64) -> (ImagePipeline, Arc<dyn FileStorage>) {
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(dir.path().to_path_buf()));
        let converter = ImageConverter::new(&ImagesConfig::default());
        (ImagePipeline::new(storage.clone(), converter, max_file_size), storage)
    }

    fn file(name: &str, bytes: Vec<u8>) -> IncomingFile {
        IncomingFile {
            filename: name.to_string(),
            declared_type: None,
            bytes,
        }
    }

    #[tokio::test]
    async fn test_successful_upload_walks_every_status() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, storage) = pipeline(&dir, 1024 * 1024);

        let mut progress = UploadProgress::new("leaf.png");
        let stored = pipeline.upload_one(file("leaf.png", png()), &mut progress).await.unwrap();
        assert_eq!(progress.status, UploadStatus::Uploading);
        progress.advance(UploadStatus::Uploaded);

        assert_eq!(
            progress.history,
            vec![
                UploadStatus::Pending,
                UploadStatus::Converting,
                UploadStatus::Uploading,
                UploadStatus::Uploaded
            ]
        );
        assert!(progress.error.is_none());
        assert_eq!(stored.content_type, "image/webp");
        assert!(stored.storage_key.ends_with(".webp"));
        assert!(storage.exists(&stored.storage_key).await.unwrap());

        pipeline.discard(&stored).await;
        assert!(!storage.exists(&stored.storage_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_stored_file_can_still_fail() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, storage) = pipeline(&dir, 1024 * 1024);

        let mut progress = UploadProgress::new("leaf.png");
        let stored = pipeline.upload_one(file("leaf.png", png()), &mut progress).await.unwrap();
        pipeline.discard(&stored).await;
        progress.fail("could not record the image");

        assert_eq!(progress.status, UploadStatus::Failed);
        assert_eq!(progress.history.last(), Some(&UploadStatus::Failed));
        assert!(!storage.exists(&stored.storage_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_files_fail_before_converting() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(&dir, 16);

        for (name, bytes) in [
            ("empty.png", Vec::new()),
            ("big.png", png()),
            ("notes.txt", b"hello".to_vec()),
        ] {
            let mut progress = UploadProgress::new(name);
            assert!(pipeline.upload_one(file(name, bytes), &mut progress).await.is_none());
            assert_eq!(progress.status, UploadStatus::Failed, "{name}");
            assert_eq!(progress.history, vec![UploadStatus::Pending, UploadStatus::Failed]);
            assert!(progress.error.is_some());
        }
    }

    #[tokio::test]
    async fn test_mislabelled_non_images_are_never_stored() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(&dir, 1024);

        let mut progress = UploadProgress::new("evil.webp");
        let upload = IncomingFile {
            filename: "evil.webp".to_string(),
            declared_type: Some("image/webp".to_string()),
            bytes: b"<html><script>alert(1)</script>".to_vec(),
        };
        assert!(pipeline.upload_one(upload, &mut progress).await.is_none());
        assert_eq!(progress.status, UploadStatus::Failed);
        assert!(progress.error.unwrap().contains("unsupported"));

        let mut stored_files = std::fs::read_dir(dir.path()).unwrap();
        assert!(stored_files.next().is_none(), "nothing was written to storage");
    }

    #[tokio::test]
    async fn test_heic_without_converter_fails_while_converting() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(&dir, 1024);

        let mut progress = UploadProgress::new("IMG_0001.HEIC");
        let heic = b"\0\0\0\x18ftypheic\0\0\0\0".to_vec();
        assert!(pipeline.upload_one(file("IMG_0001.HEIC", heic), &mut progress).await.is_none());
        assert_eq!(
            progress.history,
            vec![UploadStatus::Pending, UploadStatus::Converting, UploadStatus::Failed]
        );
        assert!(progress.error.unwrap().contains("not enabled"));
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut progress = UploadProgress::new("a.png");
        progress.fail("nope");
        progress.advance(UploadStatus::Uploading);
        progress.fail("again");
        assert_eq!(progress.status, UploadStatus::Failed);
        assert_eq!(progress.error.as_deref(), Some("nope"));
    }
}
