//! Database models for stored plant images.

use crate::types::{PlantId, PlantImageId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct PlantImageCreateDBRequest {
    pub plant_id: PlantId,
    /// Storage key returned by the file storage backend
    pub file_path: String,
    pub content_type: String,
    pub original_filename: Option<String>,
    pub size_bytes: i64,
    /// Make this the primary image even if the plant already has one
    pub make_primary: bool,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PlantImageDBResponse {
    pub id: PlantImageId,
    pub plant_id: PlantId,
    pub file_path: String,
    pub content_type: String,
    pub original_filename: Option<String>,
    pub size_bytes: i64,
    pub is_primary: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
