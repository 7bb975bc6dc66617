//! Database repository for users.

use crate::types::{UserId, abbrev_uuid};
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
    /// Case-insensitive substring of email or display name
    pub search: Option<String>,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit, search: None }
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self
    }
}

const USER_SELECT: &str = r#"
    SELECT u.id, u.email, p.display_name, p.is_admin, u.auth_source, u.password_hash,
           u.created_at, u.updated_at, u.last_login
    FROM users u
    JOIN profiles p ON p.user_id = u.id
"#;

const USER_SEARCH: &str = "($1::text IS NULL OR u.email ILIKE '%' || $1 || '%' OR p.display_name ILIKE '%' || $1 || '%')";

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(auth_source = %request.auth_source), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user_id = Uuid::new_v4();

        // The profile row must exist for every user, so both inserts share a transaction
        let mut tx = self.db.begin().await?;

        sqlx::query("INSERT INTO users (id, email, auth_source, password_hash) VALUES ($1, $2, $3, $4)")
            .bind(user_id)
            .bind(request.email.trim())
            .bind(&request.auth_source)
            .bind(&request.password_hash)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, display_name, is_admin, cards_per_session)
            VALUES ($1, NULLIF(btrim($2), ''), $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(&request.display_name)
        .bind(request.is_admin)
        .bind(request.cards_per_session)
        .execute(&mut *tx)
        .await?;

        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        let user = sqlx::query_as::<_, UserDBResponse>(&sql).bind(user_id).fetch_one(&mut *tx).await?;

        tx.commit().await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        let user = sqlx::query_as::<_, UserDBResponse>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<UserId>) -> Result<HashMap<Self::Id, UserDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!("{USER_SELECT} WHERE u.id = ANY($1)");
        let users = sqlx::query_as::<_, UserDBResponse>(&sql)
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sql = format!("{USER_SELECT} WHERE {USER_SEARCH} ORDER BY u.created_at DESC, u.id LIMIT $2 OFFSET $3");
        let users = sqlx::query_as::<_, UserDBResponse>(&sql)
            .bind(&filter.search)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            "UPDATE users SET password_hash = COALESCE($2, password_hash), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(&request.password_hash)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        sqlx::query(
            r#"
            UPDATE profiles
            SET display_name = CASE WHEN $2::text IS NULL THEN display_name ELSE NULLIF(btrim($2), '') END,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(id)
        .bind(&request.display_name)
        .execute(&mut *tx)
        .await?;

        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        let user = sqlx::query_as::<_, UserDBResponse>(&sql).bind(id).fetch_one(&mut *tx).await?;

        tx.commit().await?;

        Ok(user)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Emails are matched case-insensitively, mirroring the unique index
    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let sql = format!("{USER_SELECT} WHERE LOWER(u.email) = LOWER($1)");
        let user = sqlx::query_as::<_, UserDBResponse>(&sql)
            .bind(email.trim())
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Count users matching the same search as [`Repository::list`]
    #[instrument(skip(self), err)]
    pub async fn count(&mut self, search: Option<&str>) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM users u JOIN profiles p ON p.user_id = u.id WHERE {USER_SEARCH}");
        let count: i64 = sqlx::query_scalar(&sql).bind(search).fetch_one(&mut *self.db).await?;

        Ok(count)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn record_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }
}
