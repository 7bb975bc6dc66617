//! Database repository for user profiles and display preferences.

use crate::db::{
    errors::{DbError, Result},
    models::profiles::{ProfileDBResponse, ProfileUpdateDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Profiles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Profiles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get(&mut self, user_id: UserId) -> Result<Option<ProfileDBResponse>> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(profile)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn update(&mut self, user_id: UserId, request: &ProfileUpdateDBRequest) -> Result<ProfileDBResponse> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            r#"
            UPDATE profiles
            SET display_name = CASE WHEN $2::text IS NULL THEN display_name ELSE NULLIF(btrim($2), '') END,
                name_display = COALESCE($3, name_display),
                cards_per_session = COALESCE($4, cards_per_session),
                show_scientific_names = COALESCE($5, show_scientific_names),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&request.display_name)
        .bind(request.name_display)
        .bind(request.cards_per_session)
        .bind(request.show_scientific_names)
        .fetch_optional(&mut *self.db)
        .await?;

        profile.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn set_admin(&mut self, user_id: UserId, is_admin: bool) -> Result<ProfileDBResponse> {
        let profile = sqlx::query_as::<_, ProfileDBResponse>(
            "UPDATE profiles SET is_admin = $2, updated_at = NOW() WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(is_admin)
        .fetch_optional(&mut *self.db)
        .await?;

        profile.ok_or(DbError::NotFound)
    }
}
