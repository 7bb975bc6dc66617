//! Dashboard response models.

use crate::api::models::sightings::SightingResponse;
use crate::api::models::study::SessionSummary;
use crate::db::models::dashboard::{AdminStatsDBResponse, MissedPlantDBResponse, UserStatsDBResponse};
use crate::study::scoring::accuracy_percent;
use crate::types::PlantId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudyTotals {
    pub sessions: i64,
    pub finished_sessions: i64,
    pub answers: i64,
    pub correct: i64,
    /// Percentage of all answers that were correct, to one decimal place
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MissedPlant {
    #[schema(value_type = String, format = "uuid")]
    pub plant_id: PlantId,
    pub common_name: String,
    pub scientific_name: String,
    pub misses: i64,
    pub attempts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub study: StudyTotals,
    pub favorites_count: i64,
    pub sightings_count: i64,
    pub most_missed: Vec<MissedPlant>,
    pub recent_sessions: Vec<SessionSummary>,
    pub recent_sightings: Vec<SightingResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminDashboardResponse {
    pub total_plants: i64,
    pub published_plants: i64,
    pub unpublished_plants: i64,
    pub plants_without_images: i64,
    pub total_images: i64,
    pub total_users: i64,
    pub total_collections: i64,
    pub answers_last_week: i64,
}

impl From<&UserStatsDBResponse> for StudyTotals {
    fn from(db: &UserStatsDBResponse) -> Self {
        Self {
            sessions: db.total_sessions,
            finished_sessions: db.finished_sessions,
            answers: db.total_answers,
            correct: db.correct_answers,
            accuracy: accuracy_percent(db.correct_answers as u32, db.total_answers as u32),
        }
    }
}

impl From<MissedPlantDBResponse> for MissedPlant {
    fn from(db: MissedPlantDBResponse) -> Self {
        Self {
            plant_id: db.plant_id,
            common_name: db.common_name,
            scientific_name: db.scientific_name,
            misses: db.misses,
            attempts: db.attempts,
        }
    }
}

impl From<AdminStatsDBResponse> for AdminDashboardResponse {
    fn from(db: AdminStatsDBResponse) -> Self {
        Self {
            total_plants: db.total_plants,
            published_plants: db.published_plants,
            unpublished_plants: db.total_plants - db.published_plants,
            plants_without_images: db.plants_without_images,
            total_images: db.total_images,
            total_users: db.total_users,
            total_collections: db.total_collections,
            answers_last_week: db.answers_last_week,
        }
    }
}
