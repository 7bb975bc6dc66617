//! Aggregate queries behind the user and admin dashboards.

use crate::db::{
    errors::Result,
    models::dashboard::{AdminStatsDBResponse, MissedPlantDBResponse, UserStatsDBResponse},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Dashboard<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Dashboard<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn user_stats(&mut self, user_id: UserId) -> Result<UserStatsDBResponse> {
        let stats = sqlx::query_as::<_, UserStatsDBResponse>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM study_sessions WHERE user_id = $1) AS total_sessions,
                (SELECT COUNT(*) FROM study_sessions WHERE user_id = $1 AND finished_at IS NOT NULL) AS finished_sessions,
                (SELECT COUNT(*) FROM flashcard_answers WHERE user_id = $1) AS total_answers,
                (SELECT COUNT(*) FROM flashcard_answers WHERE user_id = $1 AND correct) AS correct_answers,
                (SELECT COUNT(*) FROM favorites WHERE user_id = $1) AS favorites_count,
                (SELECT COUNT(*) FROM sightings WHERE user_id = $1) AS sightings_count
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(stats)
    }

    /// Plants the user got wrong most often; ties go to the plant with fewer attempts
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn most_missed(&mut self, user_id: UserId, limit: i64) -> Result<Vec<MissedPlantDBResponse>> {
        let plants = sqlx::query_as::<_, MissedPlantDBResponse>(
            r#"
            SELECT p.id AS plant_id, p.common_name, p.scientific_name,
                   COUNT(*) FILTER (WHERE NOT a.correct) AS misses,
                   COUNT(*) AS attempts
            FROM flashcard_answers a
            JOIN plants p ON p.id = a.plant_id
            WHERE a.user_id = $1
            GROUP BY p.id, p.common_name, p.scientific_name
            HAVING COUNT(*) FILTER (WHERE NOT a.correct) > 0
            ORDER BY misses DESC, attempts ASC, LOWER(p.common_name)
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(plants)
    }

    #[instrument(skip(self), err)]
    pub async fn admin_stats(&mut self) -> Result<AdminStatsDBResponse> {
        let stats = sqlx::query_as::<_, AdminStatsDBResponse>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM plants) AS total_plants,
                (SELECT COUNT(*) FROM plants WHERE is_published) AS published_plants,
                (SELECT COUNT(*) FROM plants p WHERE NOT EXISTS (SELECT 1 FROM plant_images i WHERE i.plant_id = p.id))
                    AS plants_without_images,
                (SELECT COUNT(*) FROM plant_images) AS total_images,
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM collections) AS total_collections,
                (SELECT COUNT(*) FROM flashcard_answers WHERE answered_at > NOW() - INTERVAL '7 days') AS answers_last_week
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::study::StudyMode;
    use crate::db::handlers::{FlashcardAnswers, Plants, Repository, StudySessions, Users};
    use crate::db::models::{
        plants::PlantCreateDBRequest,
        study::{FlashcardAnswerCreateDBRequest, StudySessionCreateDBRequest},
        users::UserCreateDBRequest,
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_empty_dashboard(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: "new@example.com".to_string(),
                display_name: None,
                is_admin: false,
                auth_source: "native".to_string(),
                password_hash: None,
                cards_per_session: 20,
            })
            .await
            .unwrap();

        let mut repo = Dashboard::new(&mut conn);
        let stats = repo.user_stats(user.id).await.unwrap();
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.total_answers, 0);
        assert!(repo.most_missed(user.id, 5).await.unwrap().is_empty());

        let admin = repo.admin_stats().await.unwrap();
        assert_eq!(admin.total_users, 1);
        assert_eq!(admin.total_plants, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_stats_and_most_missed(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: "learner@example.com".to_string(),
                display_name: None,
                is_admin: false,
                auth_source: "native".to_string(),
                password_hash: None,
                cards_per_session: 20,
            })
            .await
            .unwrap();

        let mut plants = Plants::new(&mut conn);
        let nettle = plants
            .create(
                &PlantCreateDBRequest::builder()
                    .scientific_name("Urtica dioica")
                    .common_name("Nettle")
                    .is_published(true)
                    .build(),
            )
            .await
            .unwrap();
        let dock = plants
            .create(
                &PlantCreateDBRequest::builder()
                    .scientific_name("Rumex obtusifolius")
                    .common_name("Dock")
                    .build(),
            )
            .await
            .unwrap();

        let session = StudySessions::new(&mut conn)
            .create(&StudySessionCreateDBRequest {
                user_id: user.id,
                mode: StudyMode::Flashcards,
                collection_id: None,
                plant_ids: vec![nettle.id, dock.id],
                seed: 1,
            })
            .await
            .unwrap();

        // Free-standing answers (no session) count towards the totals too
        let mut answers = FlashcardAnswers::new(&mut conn);
        for (session_id, card_index, plant_id, correct) in [
            (Some(session.id), Some(0), nettle.id, false),
            (Some(session.id), Some(1), dock.id, false),
            (None, None, nettle.id, false),
            (None, None, dock.id, true),
        ] {
            answers
                .create(&FlashcardAnswerCreateDBRequest {
                    session_id,
                    card_index,
                    user_id: user.id,
                    plant_id,
                    correct,
                    answer: None,
                })
                .await
                .unwrap();
        }

        let mut repo = Dashboard::new(&mut conn);
        let stats = repo.user_stats(user.id).await.unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.finished_sessions, 0);
        assert_eq!(stats.total_answers, 4);
        assert_eq!(stats.correct_answers, 1);

        let missed = repo.most_missed(user.id, 5).await.unwrap();
        assert_eq!(missed.len(), 2);
        assert_eq!(missed[0].plant_id, nettle.id);
        assert_eq!((missed[0].misses, missed[0].attempts), (2, 2));
        assert_eq!((missed[1].misses, missed[1].attempts), (1, 2));

        let admin = repo.admin_stats().await.unwrap();
        assert_eq!(admin.total_plants, 2);
        assert_eq!(admin.published_plants, 1);
        assert_eq!(admin.plants_without_images, 2);
        assert_eq!(admin.answers_last_week, 4);
    }
}
