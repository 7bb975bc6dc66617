//! API models for plant images and upload reports.

use crate::config::StorageConfig;
use crate::db::models::plant_images::PlantImageDBResponse;
use crate::images::upload::UploadStatus;
use crate::types::{PlantId, PlantImageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlantImageResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PlantImageId,
    #[schema(value_type = String, format = "uuid")]
    pub plant_id: PlantId,
    pub url: String,
    pub content_type: String,
    pub original_filename: Option<String>,
    pub size_bytes: i64,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl PlantImageResponse {
    pub fn new(db: PlantImageDBResponse, storage: &StorageConfig) -> Self {
        Self {
            id: db.id,
            plant_id: db.plant_id,
            url: storage.url_for(&db.file_path),
            content_type: db.content_type,
            original_filename: db.original_filename,
            size_bytes: db.size_bytes,
            is_primary: db.is_primary,
            created_at: db.created_at,
        }
    }
}

/// Outcome for one file of a multipart upload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadedFileReport {
    /// Filename as sent by the client
    pub filename: String,
    pub status: UploadStatus,
    /// Why the file failed, when `status` is `failed`
    pub error: Option<String>,
    /// The stored image, when `status` is `uploaded`
    pub image: Option<PlantImageResponse>,
}

/// Result of a multipart upload, one entry per file in the order they were sent
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadReport {
    pub uploaded: usize,
    pub failed: usize,
    pub files: Vec<UploadedFileReport>,
}

impl UploadReport {
    pub fn new(files: Vec<UploadedFileReport>) -> Self {
        let uploaded = files.iter().filter(|f| f.status == UploadStatus::Uploaded).count();
        Self {
            uploaded,
            failed: files.len() - uploaded,
            files,
        }
    }
}
