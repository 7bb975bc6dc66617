//! Database repository for favorite plants.

use crate::db::errors::Result;
use crate::types::{PlantId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

pub struct Favorites<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Favorites<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Returns false when the plant was already a favorite
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn add(&mut self, user_id: UserId, plant_id: PlantId) -> Result<bool> {
        let result = sqlx::query("INSERT INTO favorites (user_id, plant_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(plant_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn remove(&mut self, user_id: UserId, plant_id: PlantId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND plant_id = $2")
            .bind(user_id)
            .bind(plant_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn plant_ids(&mut self, user_id: UserId) -> Result<HashSet<PlantId>> {
        let ids: Vec<PlantId> = sqlx::query_scalar("SELECT plant_id FROM favorites WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(ids.into_iter().collect())
    }
}
