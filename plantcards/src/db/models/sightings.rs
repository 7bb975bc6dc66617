//! Database models for sightings.

use crate::types::{PlantId, SightingId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct SightingCreateDBRequest {
    pub user_id: UserId,
    pub plant_id: PlantId,
    pub observed_at: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SightingUpdateDBRequest {
    pub observed_at: Option<DateTime<Utc>>,
    /// Empty string clears the location
    pub location: Option<String>,
    /// Empty string clears the notes
    pub notes: Option<String>,
}

/// A sighting joined with the names of the plant it refers to
#[derive(Debug, Clone, FromRow)]
pub struct SightingDBResponse {
    pub id: SightingId,
    pub user_id: UserId,
    pub plant_id: PlantId,
    pub plant_common_name: String,
    pub plant_scientific_name: String,
    pub observed_at: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
