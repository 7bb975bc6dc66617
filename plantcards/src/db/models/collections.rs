//! Database models for collections.

use crate::types::{CollectionId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct CollectionCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub is_admin: bool,
    pub owner_id: UserId,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionUpdateDBRequest {
    pub name: Option<String>,
    /// Empty string clears the description
    pub description: Option<String>,
    pub is_published: Option<bool>,
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CollectionDBResponse {
    pub id: CollectionId,
    pub name: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub is_admin: bool,
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub plant_count: i64,
}
