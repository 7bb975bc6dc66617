//! Database repository for plant records.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{Repository, Visibility},
    models::plants::{PlantCreateDBRequest, PlantDBResponse, PlantUpdateDBRequest},
};
use crate::types::{PlantId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

const PLANT_SELECT: &str = r#"
    SELECT p.id, p.scientific_name, p.common_name, p.family, p.genus, p.species, p.cultivar,
           p.description, p.is_published, p.created_by, p.created_at, p.updated_at,
           (SELECT i.file_path FROM plant_images i WHERE i.plant_id = p.id AND i.is_primary LIMIT 1) AS primary_image_path,
           (SELECT COUNT(*) FROM plant_images i WHERE i.plant_id = p.id) AS image_count
    FROM plants p
"#;

pub struct Plants<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Plants<'c> {
    type CreateRequest = PlantCreateDBRequest;
    type UpdateRequest = PlantUpdateDBRequest;
    type Response = PlantDBResponse;
    type Id = PlantId;
    type Filter = Visibility;

    #[instrument(skip(self, request), fields(scientific_name = %request.scientific_name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let plant_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO plants (id, scientific_name, common_name, family, genus, species, cultivar, description, is_published, created_by)
            VALUES ($1, btrim($2), btrim($3), NULLIF(btrim($4), ''), NULLIF(btrim($5), ''), NULLIF(btrim($6), ''),
                    NULLIF(btrim($7), ''), NULLIF(btrim($8), ''), $9, $10)
            "#,
        )
        .bind(plant_id)
        .bind(&request.scientific_name)
        .bind(&request.common_name)
        .bind(&request.family)
        .bind(&request.genus)
        .bind(&request.species)
        .bind(&request.cultivar)
        .bind(&request.description)
        .bind(request.is_published)
        .bind(request.created_by)
        .execute(&mut *self.db)
        .await?;

        self.get_by_id(plant_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let sql = format!("{PLANT_SELECT} WHERE p.id = $1");
        let plant = sqlx::query_as::<_, PlantDBResponse>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(plant)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<PlantId>) -> Result<HashMap<Self::Id, PlantDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!("{PLANT_SELECT} WHERE p.id = ANY($1)");
        let plants = sqlx::query_as::<_, PlantDBResponse>(&sql)
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        Ok(plants.into_iter().map(|p| (p.id, p)).collect())
    }

    /// Every plant visible under `filter`, ordered by common name. Further narrowing happens in
    /// memory with [`crate::filters::apply_filters`].
    #[instrument(skip(self), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!(
            "{PLANT_SELECT} WHERE $1 OR p.is_published OR p.created_by = $2 \
             ORDER BY LOWER(p.common_name), LOWER(p.scientific_name), p.id"
        );
        let plants = sqlx::query_as::<_, PlantDBResponse>(&sql)
            .bind(filter.is_admin)
            .bind(filter.viewer)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(plants)
    }

    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM plants WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(plant_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let result = sqlx::query(
            r#"
            UPDATE plants
            SET scientific_name = COALESCE(btrim($2), scientific_name),
                common_name = COALESCE(btrim($3), common_name),
                family = CASE WHEN $4::text IS NULL THEN family ELSE NULLIF(btrim($4), '') END,
                genus = CASE WHEN $5::text IS NULL THEN genus ELSE NULLIF(btrim($5), '') END,
                species = CASE WHEN $6::text IS NULL THEN species ELSE NULLIF(btrim($6), '') END,
                cultivar = CASE WHEN $7::text IS NULL THEN cultivar ELSE NULLIF(btrim($7), '') END,
                description = CASE WHEN $8::text IS NULL THEN description ELSE NULLIF(btrim($8), '') END,
                is_published = COALESCE($9, is_published),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.scientific_name)
        .bind(&request.common_name)
        .bind(&request.family)
        .bind(&request.genus)
        .bind(&request.species)
        .bind(&request.cultivar)
        .bind(&request.description)
        .bind(request.is_published)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Plants<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&id)), err)]
    pub async fn set_published(&mut self, id: PlantId, is_published: bool) -> Result<PlantDBResponse> {
        self.update(
            id,
            &PlantUpdateDBRequest {
                is_published: Some(is_published),
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Users;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    async fn owner(pool: &PgPool, email: &str) -> UserId {
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: email.to_string(),
                display_name: None,
                is_admin: false,
                auth_source: "native".to_string(),
                password_hash: None,
                cards_per_session: 20,
            })
            .await
            .unwrap()
            .id
    }

    fn foxglove(created_by: Option<UserId>) -> PlantCreateDBRequest {
        PlantCreateDBRequest::builder()
            .scientific_name(" Digitalis purpurea ")
            .common_name("Foxglove")
            .family("Plantaginaceae".to_string())
            .genus("".to_string())
            .maybe_created_by(created_by)
            .build()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_trims_and_blanks(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let plant = Plants::new(&mut conn).create(&foxglove(None)).await.unwrap();

        assert_eq!(plant.scientific_name, "Digitalis purpurea");
        assert_eq!(plant.family.as_deref(), Some("Plantaginaceae"));
        assert_eq!(plant.genus, None);
        assert!(!plant.is_published);
        assert_eq!(plant.image_count, 0);
        assert!(plant.primary_image_path.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_scientific_name_unique_ignoring_case(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Plants::new(&mut conn);
        repo.create(&foxglove(None)).await.unwrap();

        let duplicate = PlantCreateDBRequest::builder()
            .scientific_name("DIGITALIS PURPUREA")
            .common_name("Common foxglove")
            .build();
        assert!(matches!(repo.create(&duplicate).await, Err(DbError::UniqueViolation { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_respects_visibility(pool: PgPool) {
        let alice = owner(&pool, "alice@example.com").await;
        let bob = owner(&pool, "bob@example.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Plants::new(&mut conn);
        let draft = repo.create(&foxglove(Some(alice))).await.unwrap();
        let published = repo
            .create(
                &PlantCreateDBRequest::builder()
                    .scientific_name("Bellis perennis")
                    .common_name("Daisy")
                    .is_published(true)
                    .maybe_created_by(Some(bob))
                    .build(),
            )
            .await
            .unwrap();

        let anonymous = repo.list(&Visibility::anonymous()).await.unwrap();
        assert_eq!(anonymous.iter().map(|p| p.id).collect::<Vec<_>>(), vec![published.id]);

        let as_alice = repo.list(&Visibility::for_user(alice, false)).await.unwrap();
        assert_eq!(as_alice.len(), 2);
        // Ordered by common name
        assert_eq!(as_alice[0].common_name, "Daisy");

        let as_bob = repo.list(&Visibility::for_user(bob, false)).await.unwrap();
        assert!(as_bob.iter().all(|p| p.id != draft.id));

        let as_admin = repo.list(&Visibility::for_user(bob, true)).await.unwrap();
        assert_eq!(as_admin.len(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_clears_optional_fields(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Plants::new(&mut conn);
        let plant = repo.create(&foxglove(None)).await.unwrap();

        let updated = repo
            .update(
                plant.id,
                &PlantUpdateDBRequest {
                    common_name: Some("Purple foxglove".to_string()),
                    family: Some("  ".to_string()),
                    description: Some("Biennial".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.common_name, "Purple foxglove");
        assert_eq!(updated.scientific_name, "Digitalis purpurea");
        assert_eq!(updated.family, None);
        assert_eq!(updated.description.as_deref(), Some("Biennial"));

        let published = repo.set_published(plant.id, true).await.unwrap();
        assert!(published.is_published);

        assert!(matches!(
            repo.update(Uuid::new_v4(), &PlantUpdateDBRequest::default()).await,
            Err(DbError::NotFound)
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_bulk_and_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Plants::new(&mut conn);
        let plant = repo.create(&foxglove(None)).await.unwrap();

        let found = repo.get_bulk(vec![plant.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key(&plant.id));

        assert!(repo.delete(plant.id).await.unwrap());
        assert!(repo.get_by_id(plant.id).await.unwrap().is_none());
    }
}
