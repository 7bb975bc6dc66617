//! Aggregates read by the dashboard queries.

use crate::types::PlantId;
use sqlx::FromRow;

#[derive(Debug, Clone, Default, FromRow)]
pub struct UserStatsDBResponse {
    pub total_sessions: i64,
    pub finished_sessions: i64,
    pub total_answers: i64,
    pub correct_answers: i64,
    pub favorites_count: i64,
    pub sightings_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct MissedPlantDBResponse {
    pub plant_id: PlantId,
    pub common_name: String,
    pub scientific_name: String,
    pub misses: i64,
    pub attempts: i64,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct AdminStatsDBResponse {
    pub total_plants: i64,
    pub published_plants: i64,
    pub plants_without_images: i64,
    pub total_images: i64,
    pub total_users: i64,
    pub total_collections: i64,
    pub answers_last_week: i64,
}
