//! Database repository for plant images and the primary-image invariant.
//!
//! A plant has at most one primary image. Every operation that changes which image is primary
//! runs inside a single transaction with the plant row locked, so concurrent uploads cannot leave
//! a plant with two primaries (the partial unique index would reject it anyway) or with none
//! while images remain.

use crate::db::{
    errors::{DbError, Result},
    models::plant_images::{PlantImageCreateDBRequest, PlantImageDBResponse},
};
use crate::types::{PlantId, PlantImageId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

pub struct PlantImages<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PlantImages<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert an image. It becomes primary when requested or when the plant has no primary yet.
    #[instrument(skip(self, request), fields(plant_id = %abbrev_uuid(&request.plant_id)), err)]
    pub async fn create(&mut self, request: &PlantImageCreateDBRequest) -> Result<PlantImageDBResponse> {
        let mut tx = self.db.begin().await?;

        lock_plant(&mut tx, request.plant_id).await?;

        let has_primary: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM plant_images WHERE plant_id = $1 AND is_primary)")
                .bind(request.plant_id)
                .fetch_one(&mut *tx)
                .await?;

        let is_primary = request.make_primary || !has_primary;
        if is_primary && has_primary {
            sqlx::query("UPDATE plant_images SET is_primary = FALSE WHERE plant_id = $1 AND is_primary")
                .bind(request.plant_id)
                .execute(&mut *tx)
                .await?;
        }

        let image = sqlx::query_as::<_, PlantImageDBResponse>(
            r#"
            INSERT INTO plant_images (id, plant_id, file_path, content_type, original_filename, size_bytes, is_primary, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.plant_id)
        .bind(&request.file_path)
        .bind(&request.content_type)
        .bind(&request.original_filename)
        .bind(request.size_bytes)
        .bind(is_primary)
        .bind(request.created_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(image)
    }

    /// Images of a plant, primary first and then oldest first
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn list_for_plant(&mut self, plant_id: PlantId) -> Result<Vec<PlantImageDBResponse>> {
        let images = sqlx::query_as::<_, PlantImageDBResponse>(
            "SELECT * FROM plant_images WHERE plant_id = $1 ORDER BY is_primary DESC, created_at, id",
        )
        .bind(plant_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(images)
    }

    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&plant_id), image_id = %abbrev_uuid(&image_id)), err)]
    pub async fn get(&mut self, plant_id: PlantId, image_id: PlantImageId) -> Result<Option<PlantImageDBResponse>> {
        let image = sqlx::query_as::<_, PlantImageDBResponse>("SELECT * FROM plant_images WHERE id = $1 AND plant_id = $2")
            .bind(image_id)
            .bind(plant_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(image)
    }

    /// Make `image_id` the plant's only primary image
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&plant_id), image_id = %abbrev_uuid(&image_id)), err)]
    pub async fn set_primary(&mut self, plant_id: PlantId, image_id: PlantImageId) -> Result<PlantImageDBResponse> {
        let mut tx = self.db.begin().await?;

        lock_plant(&mut tx, plant_id).await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM plant_images WHERE id = $1 AND plant_id = $2)")
            .bind(image_id)
            .bind(plant_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(DbError::NotFound);
        }

        sqlx::query("UPDATE plant_images SET is_primary = FALSE WHERE plant_id = $1 AND is_primary AND id <> $2")
            .bind(plant_id)
            .bind(image_id)
            .execute(&mut *tx)
            .await?;

        let image = sqlx::query_as::<_, PlantImageDBResponse>("UPDATE plant_images SET is_primary = TRUE WHERE id = $1 RETURNING *")
            .bind(image_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(image)
    }

    /// Delete an image row and return it so the caller can remove the stored file. When the
    /// primary image goes, the oldest remaining image is promoted.
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&plant_id), image_id = %abbrev_uuid(&image_id)), err)]
    pub async fn delete(&mut self, plant_id: PlantId, image_id: PlantImageId) -> Result<Option<PlantImageDBResponse>> {
        let mut tx = self.db.begin().await?;

        lock_plant(&mut tx, plant_id).await?;

        let deleted = sqlx::query_as::<_, PlantImageDBResponse>("DELETE FROM plant_images WHERE id = $1 AND plant_id = $2 RETURNING *")
            .bind(image_id)
            .bind(plant_id)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(image) = &deleted
            && image.is_primary
        {
            let promoted: Option<Uuid> = sqlx::query_scalar(
                r#"
                UPDATE plant_images SET is_primary = TRUE
                WHERE id = (SELECT id FROM plant_images WHERE plant_id = $1 ORDER BY created_at, id LIMIT 1)
                RETURNING id
                "#,
            )
            .bind(plant_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(promoted) = promoted {
                tracing::debug!(image_id = %abbrev_uuid(&promoted), "Promoted oldest image to primary");
            }
        }

        tx.commit().await?;

        Ok(deleted)
    }

    /// Storage keys of every image of a plant, read before the plant is deleted
    #[instrument(skip(self), fields(plant_id = %abbrev_uuid(&plant_id)), err)]
    pub async fn file_paths_for_plant(&mut self, plant_id: PlantId) -> Result<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT file_path FROM plant_images WHERE plant_id = $1")
            .bind(plant_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(paths)
    }
}

/// Lock the plant row for the rest of the transaction, failing if it does not exist
async fn lock_plant(conn: &mut PgConnection, plant_id: PlantId) -> Result<()> {
    let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM plants WHERE id = $1 FOR UPDATE")
        .bind(plant_id)
        .fetch_optional(&mut *conn)
        .await?;

    locked.map(|_| ()).ok_or(DbError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Plants, Repository};
    use crate::db::models::plants::PlantCreateDBRequest;
    use sqlx::PgPool;

    async fn plant(pool: &PgPool) -> PlantId {
        let mut conn = pool.acquire().await.unwrap();
        Plants::new(&mut conn)
            .create(
                &PlantCreateDBRequest::builder()
                    .scientific_name("Quercus robur")
                    .common_name("English oak")
                    .build(),
            )
            .await
            .unwrap()
            .id
    }

    fn image(plant_id: PlantId, key: &str, make_primary: bool) -> PlantImageCreateDBRequest {
        PlantImageCreateDBRequest {
            plant_id,
            file_path: key.to_string(),
            content_type: "image/webp".to_string(),
            original_filename: Some(format!("{key}.jpg")),
            size_bytes: 1024,
            make_primary,
            created_by: None,
        }
    }

    async fn primaries(pool: &PgPool, plant_id: PlantId) -> Vec<String> {
        sqlx::query_scalar("SELECT file_path FROM plant_images WHERE plant_id = $1 AND is_primary")
            .bind(plant_id)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_first_image_becomes_primary(pool: PgPool) {
        let plant_id = plant(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PlantImages::new(&mut conn);

        let first = repo.create(&image(plant_id, "a", false)).await.unwrap();
        let second = repo.create(&image(plant_id, "b", false)).await.unwrap();

        assert!(first.is_primary);
        assert!(!second.is_primary);
        assert_eq!(primaries(&pool, plant_id).await, vec!["a"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_make_primary_on_upload_replaces_existing(pool: PgPool) {
        let plant_id = plant(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PlantImages::new(&mut conn);

        repo.create(&image(plant_id, "a", false)).await.unwrap();
        let b = repo.create(&image(plant_id, "b", true)).await.unwrap();

        assert!(b.is_primary);
        assert_eq!(primaries(&pool, plant_id).await, vec!["b"]);

        let listed = PlantImages::new(&mut conn).list_for_plant(plant_id).await.unwrap();
        assert_eq!(listed[0].file_path, "b");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_set_primary_is_exclusive(pool: PgPool) {
        let plant_id = plant(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PlantImages::new(&mut conn);

        repo.create(&image(plant_id, "a", false)).await.unwrap();
        let b = repo.create(&image(plant_id, "b", false)).await.unwrap();

        let updated = repo.set_primary(plant_id, b.id).await.unwrap();
        assert!(updated.is_primary);
        assert_eq!(primaries(&pool, plant_id).await, vec!["b"]);

        // Setting it again is a no-op
        repo.set_primary(plant_id, b.id).await.unwrap();
        assert_eq!(primaries(&pool, plant_id).await, vec!["b"]);

        assert!(matches!(repo.set_primary(plant_id, Uuid::new_v4()).await, Err(DbError::NotFound)));
        assert!(matches!(repo.set_primary(Uuid::new_v4(), b.id).await, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deleting_primary_promotes_oldest(pool: PgPool) {
        let plant_id = plant(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = PlantImages::new(&mut conn);

        let a = repo.create(&image(plant_id, "a", false)).await.unwrap();
        repo.create(&image(plant_id, "b", false)).await.unwrap();
        repo.create(&image(plant_id, "c", false)).await.unwrap();

        let deleted = repo.delete(plant_id, a.id).await.unwrap().unwrap();
        assert_eq!(deleted.file_path, "a");
        assert_eq!(primaries(&pool, plant_id).await, vec!["b"]);

        assert!(repo.delete(plant_id, a.id).await.unwrap().is_none());

        let mut paths = repo.file_paths_for_plant(plant_id).await.unwrap();
        paths.sort();
        assert_eq!(paths, vec!["b", "c"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_for_missing_plant(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let result = PlantImages::new(&mut conn).create(&image(Uuid::new_v4(), "a", false)).await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }
}
