//! API request/response models for the plant catalog.

use crate::api::models::pagination::Pagination;
use crate::api::models::plant_images::PlantImageResponse;
use crate::config::StorageConfig;
use crate::db::models::plants::{PlantCreateDBRequest, PlantDBResponse, PlantUpdateDBRequest};
use crate::errors::Error;
use crate::filters::PlantFilter;
use crate::types::{PlantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlantCreate {
    pub scientific_name: String,
    pub common_name: String,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub cultivar: Option<String>,
    pub description: Option<String>,
}

/// Partial update. Omitted fields are unchanged; an empty string clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PlantUpdate {
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub cultivar: Option<String>,
    pub description: Option<String>,
}

/// Query parameters for listing plants
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPlantsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub filter: PlantFilter,

    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// A plant as shown in lists
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlantSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: PlantId,
    pub scientific_name: String,
    pub common_name: String,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub is_published: bool,
    /// URL of the primary image, if the plant has one
    pub primary_image_url: Option<String>,
    pub image_count: i64,
    /// Whether the caller has favorited this plant; always false for anonymous callers
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

/// A single plant with all of its images
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlantResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PlantId,
    pub scientific_name: String,
    pub common_name: String,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub cultivar: Option<String>,
    pub description: Option<String>,
    pub is_published: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub is_favorite: bool,
    pub primary_image_url: Option<String>,
    /// Primary image first, then oldest first
    pub images: Vec<PlantImageResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn required(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

impl PlantCreate {
    /// Check required names and build the insert request owned by `created_by`
    pub fn into_db_request(self, created_by: UserId) -> Result<PlantCreateDBRequest, Error> {
        required("scientific_name", &self.scientific_name)?;
        required("common_name", &self.common_name)?;

        Ok(PlantCreateDBRequest::builder()
            .scientific_name(self.scientific_name)
            .common_name(self.common_name)
            .maybe_family(self.family)
            .maybe_genus(self.genus)
            .maybe_species(self.species)
            .maybe_cultivar(self.cultivar)
            .maybe_description(self.description)
            .created_by(created_by)
            .build())
    }
}

impl TryFrom<PlantUpdate> for PlantUpdateDBRequest {
    type Error = Error;

    fn try_from(update: PlantUpdate) -> Result<Self, Error> {
        // Names can be changed but never cleared
        if let Some(name) = &update.scientific_name {
            required("scientific_name", name)?;
        }
        if let Some(name) = &update.common_name {
            required("common_name", name)?;
        }

        Ok(Self {
            scientific_name: update.scientific_name,
            common_name: update.common_name,
            family: update.family,
            genus: update.genus,
            species: update.species,
            cultivar: update.cultivar,
            description: update.description,
            is_published: None,
        })
    }
}

impl PlantSummary {
    pub fn new(db: PlantDBResponse, is_favorite: bool, storage: &StorageConfig) -> Self {
        Self {
            id: db.id,
            primary_image_url: db.primary_image_path.as_deref().map(|key| storage.url_for(key)),
            scientific_name: db.scientific_name,
            common_name: db.common_name,
            family: db.family,
            genus: db.genus,
            is_published: db.is_published,
            image_count: db.image_count,
            is_favorite,
            created_at: db.created_at,
        }
    }
}

impl PlantResponse {
    pub fn new(db: PlantDBResponse, images: Vec<PlantImageResponse>, is_favorite: bool, storage: &StorageConfig) -> Self {
        Self {
            id: db.id,
            primary_image_url: db.primary_image_path.as_deref().map(|key| storage.url_for(key)),
            scientific_name: db.scientific_name,
            common_name: db.common_name,
            family: db.family,
            genus: db.genus,
            species: db.species,
            cultivar: db.cultivar,
            description: db.description,
            is_published: db.is_published,
            created_by: db.created_by,
            is_favorite,
            images,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
