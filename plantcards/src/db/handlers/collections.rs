//! Database repository for collections and their member plants.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{Repository, Visibility},
    models::collections::{CollectionCreateDBRequest, CollectionDBResponse, CollectionUpdateDBRequest},
};
use crate::types::{CollectionId, PlantId, abbrev_uuid};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

const COLLECTION_SELECT: &str = r#"
    SELECT c.id, c.name, c.description, c.is_published, c.is_admin, c.owner_id, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM collection_plants cp WHERE cp.collection_id = c.id) AS plant_count
    FROM collections c
"#;

pub struct Collections<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Collections<'c> {
    type CreateRequest = CollectionCreateDBRequest;
    type UpdateRequest = CollectionUpdateDBRequest;
    type Response = CollectionDBResponse;
    type Id = CollectionId;
    type Filter = Visibility;

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let collection_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO collections (id, name, description, is_published, is_admin, owner_id)
            VALUES ($1, btrim($2), NULLIF(btrim($3), ''), $4, $5, $6)
            "#,
        )
        .bind(collection_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.is_published)
        .bind(request.is_admin)
        .bind(request.owner_id)
        .execute(&mut *self.db)
        .await?;

        self.get_by_id(collection_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(collection_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let sql = format!("{COLLECTION_SELECT} WHERE c.id = $1");
        let collection = sqlx::query_as::<_, CollectionDBResponse>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(collection)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<CollectionId>) -> Result<HashMap<Self::Id, CollectionDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!("{COLLECTION_SELECT} WHERE c.id = ANY($1)");
        let collections = sqlx::query_as::<_, CollectionDBResponse>(&sql)
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        Ok(collections.into_iter().map(|c| (c.id, c)).collect())
    }

    /// Admin collections come first, then the rest alphabetically
    #[instrument(skip(self), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!(
            "{COLLECTION_SELECT} WHERE $1 OR c.is_published OR c.owner_id = $2 \
             ORDER BY c.is_admin DESC, LOWER(c.name), c.id"
        );
        let collections = sqlx::query_as::<_, CollectionDBResponse>(&sql)
            .bind(filter.is_admin)
            .bind(filter.viewer)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(collections)
    }

    #[instrument(skip(self), fields(collection_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(collection_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let result = sqlx::query(
            r#"
            UPDATE collections
            SET name = COALESCE(btrim($2), name),
                description = CASE WHEN $3::text IS NULL THEN description ELSE NULLIF(btrim($3), '') END,
                is_published = COALESCE($4, is_published),
                is_admin = COALESCE($5, is_admin),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.is_published)
        .bind(request.is_admin)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Collections<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Returns false when the plant was already a member
    #[instrument(skip(self), fields(collection_id = %abbrev_uuid(&collection_id), plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn add_plant(&mut self, collection_id: CollectionId, plant_id: PlantId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO collection_plants (collection_id, plant_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(collection_id)
        .bind(plant_id)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() > 0 {
            sqlx::query("UPDATE collections SET updated_at = NOW() WHERE id = $1")
                .bind(collection_id)
                .execute(&mut *self.db)
                .await?;
        }

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(collection_id = %abbrev_uuid(&collection_id), plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn remove_plant(&mut self, collection_id: CollectionId, plant_id: PlantId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM collection_plants WHERE collection_id = $1 AND plant_id = $2")
            .bind(collection_id)
            .bind(plant_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Member plant ids in the order they were added
    #[instrument(skip(self), fields(collection_id = %abbrev_uuid(&collection_id)), err)]
    pub async fn plant_ids(&mut self, collection_id: CollectionId) -> Result<Vec<PlantId>> {
        let ids: Vec<PlantId> = sqlx::query_scalar(
            "SELECT plant_id FROM collection_plants WHERE collection_id = $1 ORDER BY added_at, plant_id",
        )
        .bind(collection_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(ids)
    }
}
