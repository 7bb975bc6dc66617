//! Database repository for sightings.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::sightings::{SightingCreateDBRequest, SightingDBResponse, SightingUpdateDBRequest},
};
use crate::types::{PlantId, SightingId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Sightings of one user, optionally for a single plant
#[derive(Debug, Clone)]
pub struct SightingFilter {
    pub user_id: UserId,
    pub plant_id: Option<PlantId>,
    pub skip: i64,
    pub limit: i64,
}

impl SightingFilter {
    pub fn new(user_id: UserId, skip: i64, limit: i64) -> Self {
        Self {
            user_id,
            plant_id: None,
            skip,
            limit,
        }
    }

    pub fn with_plant(mut self, plant_id: Option<PlantId>) -> Self {
        self.plant_id = plant_id;
        self
    }
}

const SIGHTING_SELECT: &str = r#"
    SELECT s.id, s.user_id, s.plant_id, p.common_name AS plant_common_name,
           p.scientific_name AS plant_scientific_name, s.observed_at, s.location, s.notes, s.created_at
    FROM sightings s
    JOIN plants p ON p.id = s.plant_id
"#;

pub struct Sightings<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Sightings<'c> {
    type CreateRequest = SightingCreateDBRequest;
    type UpdateRequest = SightingUpdateDBRequest;
    type Response = SightingDBResponse;
    type Id = SightingId;
    type Filter = SightingFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), plant_id = %abbrev_uuid(&request.plant_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let sighting_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO sightings (id, user_id, plant_id, observed_at, location, notes)
            VALUES ($1, $2, $3, $4, NULLIF(btrim($5), ''), NULLIF(btrim($6), ''))
            "#,
        )
        .bind(sighting_id)
        .bind(request.user_id)
        .bind(request.plant_id)
        .bind(request.observed_at)
        .bind(&request.location)
        .bind(&request.notes)
        .execute(&mut *self.db)
        .await?;

        self.get_by_id(sighting_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(sighting_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let sql = format!("{SIGHTING_SELECT} WHERE s.id = $1");
        let sighting = sqlx::query_as::<_, SightingDBResponse>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(sighting)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<SightingId>) -> Result<HashMap<Self::Id, SightingDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!("{SIGHTING_SELECT} WHERE s.id = ANY($1)");
        let sightings = sqlx::query_as::<_, SightingDBResponse>(&sql)
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        Ok(sightings.into_iter().map(|s| (s.id, s)).collect())
    }

    /// Newest observation first
    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id), limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!(
            "{SIGHTING_SELECT} WHERE s.user_id = $1 AND ($2::uuid IS NULL OR s.plant_id = $2) \
             ORDER BY s.observed_at DESC, s.id LIMIT $3 OFFSET $4"
        );
        let sightings = sqlx::query_as::<_, SightingDBResponse>(&sql)
            .bind(filter.user_id)
            .bind(filter.plant_id)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(sightings)
    }

    #[instrument(skip(self), fields(sighting_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sightings WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(sighting_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let result = sqlx::query(
            r#"
            UPDATE sightings
            SET observed_at = COALESCE($2, observed_at),
                location = CASE WHEN $3::text IS NULL THEN location ELSE NULLIF(btrim($3), '') END,
                notes = CASE WHEN $4::text IS NULL THEN notes ELSE NULLIF(btrim($4), '') END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(request.observed_at)
        .bind(&request.location)
        .bind(&request.notes)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Sightings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Count matching sightings, ignoring the filter's paging
    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id)), err)]
    pub async fn count(&mut self, filter: &SightingFilter) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sightings WHERE user_id = $1 AND ($2::uuid IS NULL OR plant_id = $2)")
                .bind(filter.user_id)
                .bind(filter.plant_id)
                .fetch_one(&mut *self.db)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Plants, Users};
    use crate::db::models::{plants::PlantCreateDBRequest, users::UserCreateDBRequest};
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    async fn setup(pool: &PgPool) -> (UserId, PlantId, PlantId) {
        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: "walker@example.com".to_string(),
                display_name: None,
                is_admin: false,
                auth_source: "native".to_string(),
                password_hash: None,
                cards_per_session: 20,
            })
            .await
            .unwrap();
        let mut plants = Plants::new(&mut conn);
        let bluebell = plants
            .create(
                &PlantCreateDBRequest::builder()
                    .scientific_name("Hyacinthoides non-scripta")
                    .common_name("Bluebell")
                    .build(),
            )
            .await
            .unwrap();
        let primrose = plants
            .create(
                &PlantCreateDBRequest::builder()
                    .scientific_name("Primula vulgaris")
                    .common_name("Primrose")
                    .build(),
            )
            .await
            .unwrap();
        (user.id, bluebell.id, primrose.id)
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_newest_first_and_by_plant(pool: PgPool) {
        let (user_id, bluebell, primrose) = setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Sightings::new(&mut conn);

        let now = Utc::now();
        for (plant_id, days_ago) in [(bluebell, 3), (primrose, 1), (bluebell, 2)] {
            repo.create(&SightingCreateDBRequest {
                user_id,
                plant_id,
                observed_at: now - Duration::days(days_ago),
                location: Some(" Ancient woodland ".to_string()),
                notes: None,
            })
            .await
            .unwrap();
        }

        let all = repo.list(&SightingFilter::new(user_id, 0, 10)).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].plant_common_name, "Primrose");
        assert_eq!(all[0].location.as_deref(), Some("Ancient woodland"));
        assert!(all.windows(2).all(|w| w[0].observed_at >= w[1].observed_at));

        let filter = SightingFilter::new(user_id, 0, 10).with_plant(Some(bluebell));
        assert_eq!(repo.list(&filter).await.unwrap().len(), 2);
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        let paged = repo.list(&SightingFilter::new(user_id, 1, 1)).await.unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, all[1].id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_clears_notes(pool: PgPool) {
        let (user_id, bluebell, _) = setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Sightings::new(&mut conn);

        let sighting = repo
            .create(&SightingCreateDBRequest {
                user_id,
                plant_id: bluebell,
                observed_at: Utc::now(),
                location: None,
                notes: Some("Carpet of flowers".to_string()),
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                sighting.id,
                &SightingUpdateDBRequest {
                    notes: Some(String::new()),
                    location: Some("Hillside".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.notes, None);
        assert_eq!(updated.location.as_deref(), Some("Hillside"));
        assert_eq!(updated.observed_at, sighting.observed_at);

        assert!(repo.delete(sighting.id).await.unwrap());
        assert!(matches!(
            repo.update(sighting.id, &SightingUpdateDBRequest::default()).await,
            Err(DbError::NotFound)
        ));
    }
}
