//! Database models for plant records.

use crate::filters::PlantRecord;
use crate::types::{PlantId, UserId};
use bon::Builder;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Builder)]
pub struct PlantCreateDBRequest {
    #[builder(into)]
    pub scientific_name: String,
    #[builder(into)]
    pub common_name: String,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub cultivar: Option<String>,
    pub description: Option<String>,
    #[builder(default)]
    pub is_published: bool,
    pub created_by: Option<UserId>,
}

/// Partial update. For the optional text columns an empty string clears the value.
#[derive(Debug, Clone, Default)]
pub struct PlantUpdateDBRequest {
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub cultivar: Option<String>,
    pub description: Option<String>,
    pub is_published: Option<bool>,
}

/// A plant plus the image summary shown in lists
#[derive(Debug, Clone, FromRow)]
pub struct PlantDBResponse {
    pub id: PlantId,
    pub scientific_name: String,
    pub common_name: String,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub cultivar: Option<String>,
    pub description: Option<String>,
    pub is_published: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Storage key of the primary image, if any
    pub primary_image_path: Option<String>,
    pub image_count: i64,
}

impl PlantRecord for PlantDBResponse {
    fn plant_id(&self) -> PlantId {
        self.id
    }

    fn scientific_name(&self) -> &str {
        &self.scientific_name
    }

    fn common_name(&self) -> &str {
        &self.common_name
    }

    fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    fn genus(&self) -> Option<&str> {
        self.genus.as_deref()
    }

    fn is_published(&self) -> bool {
        self.is_published
    }

    fn has_image(&self) -> bool {
        self.image_count > 0
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
