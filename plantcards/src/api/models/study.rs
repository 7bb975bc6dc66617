//! API models for flashcard and quiz sessions.

use crate::db::models::study::StudySessionDBResponse;
use crate::filters::PlantFilter;
use crate::study::scoring::{Scoreboard, accuracy_percent};
use crate::types::{CollectionId, PlantId, StudySessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "study_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    /// Image and names shown; the user marks themselves right or wrong, or types a guess
    Flashcards,
    /// Image shown with several names to pick from
    Quiz,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub mode: StudyMode,
    /// Draw cards from this collection instead of the whole catalog
    #[schema(value_type = Option<String>, format = "uuid")]
    pub collection_id: Option<CollectionId>,
    /// Narrow the candidate plants further
    pub filter: Option<PlantFilter>,
    /// Defaults to the profile's `cards_per_session`, capped by the server maximum
    pub card_count: Option<u32>,
    /// Fix the shuffle, e.g. to replay a deck
    pub seed: Option<u64>,
}

/// One card of a session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CardResponse {
    pub index: usize,
    pub image_url: Option<String>,
    /// Shown per the caller's name preference; hidden on unanswered quiz cards
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    /// Quiz mode only
    pub choices: Option<Vec<QuizChoice>>,
    pub answered: bool,
    /// Whether the recorded answer was right, once answered
    pub correct: Option<bool>,
    /// The plant was deleted after the session started; the card cannot be answered
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuizChoice {
    #[schema(value_type = String, format = "uuid")]
    pub plant_id: PlantId,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionScore {
    pub answered: i32,
    pub correct: i32,
    pub total: i32,
    /// Percentage of answered cards that were correct, to one decimal place
    pub accuracy: f64,
}

impl SessionScore {
    pub fn of(session: &StudySessionDBResponse) -> Self {
        Self {
            answered: session.answered_count,
            correct: session.correct_count,
            total: session.total_cards,
            accuracy: accuracy_percent(session.correct_count as u32, session.answered_count as u32),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: StudySessionId,
    pub mode: StudyMode,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub collection_id: Option<CollectionId>,
    pub score: SessionScore,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&StudySessionDBResponse> for SessionSummary {
    fn from(db: &StudySessionDBResponse) -> Self {
        Self {
            id: db.id,
            mode: db.mode,
            collection_id: db.collection_id,
            score: SessionScore::of(db),
            started_at: db.started_at,
            finished_at: db.finished_at,
        }
    }
}

/// A session and its deck
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: SessionSummary,
    /// Seed of the shuffle, usable to replay the same deck. Withheld for quizzes, where it would
    /// let a client work out which plant is behind each card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Streaks over the answers so far, in the order they were given
    pub progress: Scoreboard,
    pub cards: Vec<CardResponse>,
}

/// How the user answered a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardAnswer {
    /// Flashcards: the user flipped the card and judged themselves
    SelfAssessed { correct: bool },
    /// Flashcards: the user typed a name
    Typed { guess: String },
    /// Quiz: the user picked one of the offered choices
    Choice {
        #[schema(value_type = String, format = "uuid")]
        plant_id: PlantId,
    },
}

impl CardAnswer {
    pub fn allowed_in(&self, mode: StudyMode) -> bool {
        matches!(
            (self, mode),
            (CardAnswer::Choice { .. }, StudyMode::Quiz)
                | (CardAnswer::SelfAssessed { .. } | CardAnswer::Typed { .. }, StudyMode::Flashcards)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub card_index: usize,
    pub response: CardAnswer,
}

/// The plant behind a card, revealed once it is answered
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevealedPlant {
    #[schema(value_type = String, format = "uuid")]
    pub plant_id: PlantId,
    pub common_name: String,
    pub scientific_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerResult {
    pub card_index: usize,
    pub correct: bool,
    pub plant: RevealedPlant,
    pub score: SessionScore,
    /// True once every card has been answered
    pub finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_answer_wire_format() {
        let parsed: AnswerRequest =
            serde_json::from_str(r#"{"card_index": 2, "response": {"type": "typed", "guess": "oak"}}"#).unwrap();
        assert_eq!(parsed.card_index, 2);
        assert_eq!(parsed.response, CardAnswer::Typed { guess: "oak".to_string() });

        let parsed: CardAnswer = serde_json::from_str(r#"{"type": "self_assessed", "correct": true}"#).unwrap();
        assert_eq!(parsed, CardAnswer::SelfAssessed { correct: true });
    }

    #[test]
    fn test_answer_kind_must_match_mode() {
        let choice = CardAnswer::Choice { plant_id: Uuid::new_v4() };
        assert!(choice.allowed_in(StudyMode::Quiz));
        assert!(!choice.allowed_in(StudyMode::Flashcards));

        let typed = CardAnswer::Typed { guess: "x".to_string() };
        assert!(typed.allowed_in(StudyMode::Flashcards));
        assert!(!typed.allowed_in(StudyMode::Quiz));
        assert!(!CardAnswer::SelfAssessed { correct: false }.allowed_in(StudyMode::Quiz));
    }

    #[test]
    fn test_start_request_accepts_embedded_filter() {
        let parsed: StartSessionRequest =
            serde_json::from_str(r#"{"mode": "quiz", "filter": {"family": "Rosaceae", "has_image": true}, "card_count": 5}"#)
                .unwrap();
        assert_eq!(parsed.mode, StudyMode::Quiz);
        let filter = parsed.filter.unwrap();
        assert_eq!(filter.family.as_deref(), Some("Rosaceae"));
        assert_eq!(filter.has_image, Some(true));
    }
}
