//! Database repositories for study sessions and recorded answers.

use crate::db::{
    errors::{DbError, Result},
    models::study::{
        FlashcardAnswerCreateDBRequest, FlashcardAnswerDBResponse, StudySessionCreateDBRequest, StudySessionDBResponse,
    },
};
use crate::types::{PlantId, StudySessionId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct StudySessions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> StudySessions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), cards = request.plant_ids.len()), err)]
    pub async fn create(&mut self, request: &StudySessionCreateDBRequest) -> Result<StudySessionDBResponse> {
        let session = sqlx::query_as::<_, StudySessionDBResponse>(
            r#"
            INSERT INTO study_sessions (id, user_id, mode, collection_id, plant_ids, seed, total_cards)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.mode)
        .bind(request.collection_id)
        .bind(request.plant_ids.as_slice())
        .bind(request.seed)
        .bind(request.plant_ids.len() as i32)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %abbrev_uuid(&id)), err)]
    pub async fn get(&mut self, id: StudySessionId) -> Result<Option<StudySessionDBResponse>> {
        let session = sqlx::query_as::<_, StudySessionDBResponse>("SELECT * FROM study_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(session)
    }

    /// Same as [`Self::get`] but locks the row until the surrounding transaction ends
    #[instrument(skip(self), fields(session_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: StudySessionId) -> Result<Option<StudySessionDBResponse>> {
        let session = sqlx::query_as::<_, StudySessionDBResponse>("SELECT * FROM study_sessions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(session)
    }

    /// Most recent first
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<StudySessionDBResponse>> {
        let sessions = sqlx::query_as::<_, StudySessionDBResponse>(
            "SELECT * FROM study_sessions WHERE user_id = $1 ORDER BY started_at DESC, id LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(sessions)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn count_for_user(&mut self, user_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM study_sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Bump the counters of an unfinished session, finishing it when the last card is answered.
    /// Fails with `NotFound` if the session does not exist or is already finished.
    #[instrument(skip(self), fields(session_id = %abbrev_uuid(&id)), err)]
    pub async fn record_answer(&mut self, id: StudySessionId, correct: bool) -> Result<StudySessionDBResponse> {
        let session = sqlx::query_as::<_, StudySessionDBResponse>(
            r#"
            UPDATE study_sessions
            SET answered_count = answered_count + 1,
                correct_count = correct_count + $2,
                finished_at = CASE WHEN answered_count + 1 >= total_cards THEN NOW() ELSE NULL END
            WHERE id = $1 AND finished_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(i32::from(correct))
        .fetch_optional(&mut *self.db)
        .await?;

        session.ok_or(DbError::NotFound)
    }

    /// Take a deleted plant's card out of every open session that has not answered it yet.
    ///
    /// The card keeps its index but no longer counts toward `total_cards`, and a session with
    /// nothing left to answer is finished. Run in the transaction that deletes the plant.
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn remove_plant_from_open(&mut self, plant_id: PlantId) -> Result<u64> {
        // Lock first so the update below sees answers committed while waiting
        sqlx::query("SELECT id FROM study_sessions WHERE finished_at IS NULL AND $1 = ANY(plant_ids) ORDER BY id FOR UPDATE")
            .bind(plant_id)
            .fetch_all(&mut *self.db)
            .await?;

        let result = sqlx::query(
            r#"
            UPDATE study_sessions s
            SET total_cards = total_cards - 1,
                finished_at = CASE WHEN answered_count >= total_cards - 1 THEN NOW() ELSE NULL END
            WHERE finished_at IS NULL
              AND $1 = ANY(plant_ids)
              AND NOT EXISTS (SELECT 1 FROM flashcard_answers a WHERE a.session_id = s.id AND a.plant_id = $1)
            "#,
        )
        .bind(plant_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Mark the session finished. Finishing twice keeps the first timestamp.
    #[instrument(skip(self), fields(session_id = %abbrev_uuid(&id)), err)]
    pub async fn finish(&mut self, id: StudySessionId) -> Result<StudySessionDBResponse> {
        let session = sqlx::query_as::<_, StudySessionDBResponse>(
            "UPDATE study_sessions SET finished_at = COALESCE(finished_at, NOW()) WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        session.ok_or(DbError::NotFound)
    }
}

pub struct FlashcardAnswers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> FlashcardAnswers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), card_index = ?request.card_index), err)]
    pub async fn create(&mut self, request: &FlashcardAnswerCreateDBRequest) -> Result<FlashcardAnswerDBResponse> {
        let answer = sqlx::query_as::<_, FlashcardAnswerDBResponse>(
            r#"
            INSERT INTO flashcard_answers (id, session_id, card_index, user_id, plant_id, correct, answer)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.session_id)
        .bind(request.card_index)
        .bind(request.user_id)
        .bind(request.plant_id)
        .bind(request.correct)
        .bind(&request.answer)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(answer)
    }

    /// Answers of a session in card order
    #[instrument(skip(self), fields(session_id = %abbrev_uuid(&session_id)), err)]
    pub async fn list_for_session(&mut self, session_id: StudySessionId) -> Result<Vec<FlashcardAnswerDBResponse>> {
        let answers = sqlx::query_as::<_, FlashcardAnswerDBResponse>(
            "SELECT * FROM flashcard_answers WHERE session_id = $1 ORDER BY card_index, answered_at",
        )
        .bind(session_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::study::StudyMode;
    use crate::db::handlers::{Plants, Repository, Users};
    use crate::db::models::{plants::PlantCreateDBRequest, users::UserCreateDBRequest};
    use crate::types::PlantId;
    use sqlx::PgPool;

    async fn setup(pool: &PgPool) -> (UserId, Vec<PlantId>) {
        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: "student@example.com".to_string(),
                display_name: None,
                is_admin: false,
                auth_source: "native".to_string(),
                password_hash: None,
                cards_per_session: 20,
            })
            .await
            .unwrap();

        let mut plants = Plants::new(&mut conn);
        let mut ids = Vec::new();
        for (scientific, common) in [("Rosa canina", "Dog rose"), ("Bellis perennis", "Daisy")] {
            let plant = plants
                .create(
                    &PlantCreateDBRequest::builder()
                        .scientific_name(scientific)
                        .common_name(common)
                        .build(),
                )
                .await
                .unwrap();
            ids.push(plant.id);
        }
        (user.id, ids)
    }

    fn answer(session: &StudySessionDBResponse, index: i32, correct: bool) -> FlashcardAnswerCreateDBRequest {
        FlashcardAnswerCreateDBRequest {
            session_id: Some(session.id),
            card_index: Some(index),
            user_id: session.user_id,
            plant_id: session.plant_ids[index as usize],
            correct,
            answer: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_session_finishes_after_last_answer(pool: PgPool) {
        let (user_id, plant_ids) = setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut sessions = StudySessions::new(&mut conn);

        let session = sessions
            .create(&StudySessionCreateDBRequest {
                user_id,
                mode: StudyMode::Flashcards,
                collection_id: None,
                plant_ids: plant_ids.clone(),
                seed: 42,
            })
            .await
            .unwrap();
        assert_eq!(session.total_cards, 2);
        assert_eq!(session.plant_ids, plant_ids);
        assert!(session.finished_at.is_none());

        let after_first = sessions.record_answer(session.id, true).await.unwrap();
        assert_eq!((after_first.answered_count, after_first.correct_count), (1, 1));
        assert!(after_first.finished_at.is_none());

        let after_second = sessions.record_answer(session.id, false).await.unwrap();
        assert_eq!((after_second.answered_count, after_second.correct_count), (2, 1));
        assert!(after_second.finished_at.is_some());

        // Finished sessions take no more answers
        assert!(matches!(sessions.record_answer(session.id, true).await, Err(DbError::NotFound)));

        let finished = sessions.finish(session.id).await.unwrap();
        assert_eq!(finished.finished_at, after_second.finished_at);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_card_answer_rejected(pool: PgPool) {
        let (user_id, plant_ids) = setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let session = StudySessions::new(&mut conn)
            .create(&StudySessionCreateDBRequest {
                user_id,
                mode: StudyMode::Quiz,
                collection_id: None,
                plant_ids,
                seed: 7,
            })
            .await
            .unwrap();

        let mut answers = FlashcardAnswers::new(&mut conn);
        answers.create(&answer(&session, 1, true)).await.unwrap();
        answers.create(&answer(&session, 0, false)).await.unwrap();

        let duplicate = answers.create(&answer(&session, 1, false)).await;
        assert!(matches!(duplicate, Err(DbError::UniqueViolation { .. })));

        let listed = answers.list_for_session(session.id).await.unwrap();
        assert_eq!(listed.iter().map(|a| a.card_index).collect::<Vec<_>>(), vec![Some(0), Some(1)]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_removed_plants_leave_open_sessions(pool: PgPool) {
        let (user_id, plant_ids) = setup(&pool).await;
        let (rose, daisy) = (plant_ids[0], plant_ids[1]);
        let mut conn = pool.acquire().await.unwrap();

        let session = StudySessions::new(&mut conn)
            .create(&StudySessionCreateDBRequest {
                user_id,
                mode: StudyMode::Flashcards,
                collection_id: None,
                plant_ids: vec![rose, daisy],
                seed: 1,
            })
            .await
            .unwrap();
        let untouched = StudySessions::new(&mut conn)
            .create(&StudySessionCreateDBRequest {
                user_id,
                mode: StudyMode::Flashcards,
                collection_id: None,
                plant_ids: vec![rose],
                seed: 2,
            })
            .await
            .unwrap();
        FlashcardAnswers::new(&mut conn).create(&answer(&session, 0, true)).await.unwrap();
        StudySessions::new(&mut conn).record_answer(session.id, true).await.unwrap();

        // Already answered in `session`, unanswered in `untouched`
        assert_eq!(StudySessions::new(&mut conn).remove_plant_from_open(rose).await.unwrap(), 1);
        Plants::new(&mut conn).delete(rose).await.unwrap();

        let emptied = StudySessions::new(&mut conn).get(untouched.id).await.unwrap().unwrap();
        assert_eq!(emptied.total_cards, 0);
        assert!(emptied.finished_at.is_some(), "nothing left to answer");

        let answers = FlashcardAnswers::new(&mut conn).list_for_session(session.id).await.unwrap();
        assert_eq!(answers.len(), 1, "answers outlive their plant");
        assert_eq!(answers[0].plant_id, None);

        assert_eq!(StudySessions::new(&mut conn).remove_plant_from_open(daisy).await.unwrap(), 1);
        let session = StudySessions::new(&mut conn).get(session.id).await.unwrap().unwrap();
        assert_eq!((session.answered_count, session.total_cards), (1, 1));
        assert!(session.finished_at.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_and_count_for_user(pool: PgPool) {
        let (user_id, plant_ids) = setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut sessions = StudySessions::new(&mut conn);

        for seed in 0..3 {
            sessions
                .create(&StudySessionCreateDBRequest {
                    user_id,
                    mode: StudyMode::Flashcards,
                    collection_id: None,
                    plant_ids: plant_ids.clone(),
                    seed,
                })
                .await
                .unwrap();
        }

        assert_eq!(sessions.count_for_user(user_id).await.unwrap(), 3);
        assert_eq!(sessions.list_for_user(user_id, 0, 2).await.unwrap().len(), 2);
        assert_eq!(sessions.list_for_user(user_id, 2, 2).await.unwrap().len(), 1);
        assert!(sessions.get(Uuid::new_v4()).await.unwrap().is_none());
        assert!(matches!(sessions.finish(Uuid::new_v4()).await, Err(DbError::NotFound)));
    }
}
