//! Database models for study sessions and recorded answers.

use crate::api::models::study::StudyMode;
use crate::types::{CollectionId, PlantId, StudySessionId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StudySessionCreateDBRequest {
    pub user_id: UserId,
    pub mode: StudyMode,
    pub collection_id: Option<CollectionId>,
    /// Deck in presentation order
    pub plant_ids: Vec<PlantId>,
    pub seed: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct StudySessionDBResponse {
    pub id: StudySessionId,
    pub user_id: UserId,
    pub mode: StudyMode,
    pub collection_id: Option<CollectionId>,
    pub plant_ids: Vec<PlantId>,
    pub seed: i64,
    pub total_cards: i32,
    pub answered_count: i32,
    pub correct_count: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct FlashcardAnswerCreateDBRequest {
    pub session_id: Option<StudySessionId>,
    pub card_index: Option<i32>,
    pub user_id: UserId,
    pub plant_id: PlantId,
    pub correct: bool,
    /// What the user typed or picked, for later review
    pub answer: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FlashcardAnswerDBResponse {
    pub id: Uuid,
    pub session_id: Option<StudySessionId>,
    pub card_index: Option<i32>,
    pub user_id: UserId,
    /// `None` once the plant has been deleted
    pub plant_id: Option<PlantId>,
    pub correct: bool,
    pub answer: Option<String>,
    pub answered_at: DateTime<Utc>,
}
