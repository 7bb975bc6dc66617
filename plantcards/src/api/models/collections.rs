//! API request/response models for collections.

use crate::api::models::plants::PlantSummary;
use crate::db::models::collections::{CollectionDBResponse, CollectionUpdateDBRequest};
use crate::types::{CollectionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    /// Marks a curated collection; only admins may set this
    #[serde(default)]
    pub is_admin: bool,
}

/// Partial update. An empty description clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CollectionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_published: Option<bool>,
    /// Only admins may change this
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CollectionId,
    pub name: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub is_admin: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    pub plant_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A collection with the member plants the caller can see
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub collection: CollectionResponse,
    pub plants: Vec<PlantSummary>,
}

impl From<CollectionDBResponse> for CollectionResponse {
    fn from(db: CollectionDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            is_published: db.is_published,
            is_admin: db.is_admin,
            owner_id: db.owner_id,
            plant_count: db.plant_count,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<CollectionUpdate> for CollectionUpdateDBRequest {
    fn from(update: CollectionUpdate) -> Self {
        Self {
            name: update.name,
            description: update.description,
            is_published: update.is_published,
            is_admin: update.is_admin,
        }
    }
}
