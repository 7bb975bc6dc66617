//! API request/response models for sightings.

use crate::api::models::pagination::Pagination;
use crate::db::models::sightings::{SightingDBResponse, SightingUpdateDBRequest};
use crate::errors::Error;
use crate::types::{PlantId, SightingId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SightingCreate {
    #[schema(value_type = String, format = "uuid")]
    pub plant_id: PlantId,
    /// Defaults to now; may not be in the future
    pub observed_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. Empty location or notes clear them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SightingUpdate {
    pub observed_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSightingsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only sightings of this plant
    #[param(value_type = Option<String>, format = "uuid")]
    pub plant_id: Option<PlantId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SightingResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: SightingId,
    #[schema(value_type = String, format = "uuid")]
    pub plant_id: PlantId,
    pub plant_common_name: String,
    pub plant_scientific_name: String,
    pub observed_at: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Sightings are things that happened; a timestamp ahead of the server clock is a client error.
/// A minute of slack absorbs clock drift between browser and server.
pub fn check_observed_at(observed_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
    if observed_at > now + chrono::Duration::minutes(1) {
        return Err(Error::BadRequest {
            message: "observed_at may not be in the future".to_string(),
        });
    }
    Ok(observed_at)
}

impl From<SightingDBResponse> for SightingResponse {
    fn from(db: SightingDBResponse) -> Self {
        Self {
            id: db.id,
            plant_id: db.plant_id,
            plant_common_name: db.plant_common_name,
            plant_scientific_name: db.plant_scientific_name,
            observed_at: db.observed_at,
            location: db.location,
            notes: db.notes,
            created_at: db.created_at,
        }
    }
}

impl TryFrom<SightingUpdate> for SightingUpdateDBRequest {
    type Error = Error;

    fn try_from(update: SightingUpdate) -> Result<Self, Error> {
        let observed_at = update
            .observed_at
            .map(|at| check_observed_at(at, Utc::now()))
            .transpose()?;

        Ok(Self {
            observed_at,
            location: update.location,
            notes: update.notes,
        })
    }
}
