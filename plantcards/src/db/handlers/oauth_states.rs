//! Database repository for pending OAuth authorization states.

use crate::db::{
    errors::Result,
    models::oauth_states::{OAuthStateCreateDBRequest, OAuthStateDBResponse},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct OAuthStates<'c> {
    db: &'c mut PgConnection,
}

impl<'c> OAuthStates<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(provider = %request.provider), err)]
    pub async fn create(&mut self, request: &OAuthStateCreateDBRequest) -> Result<OAuthStateDBResponse> {
        let state = sqlx::query_as::<_, OAuthStateDBResponse>(
            r#"
            INSERT INTO oauth_states (state, provider, redirect_to, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&request.state)
        .bind(&request.provider)
        .bind(&request.redirect_to)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(state)
    }

    /// Remove and return a state. Each state can be used once; the caller checks expiry.
    #[instrument(skip(self, state), err)]
    pub async fn consume(&mut self, state: &str) -> Result<Option<OAuthStateDBResponse>> {
        let state = sqlx::query_as::<_, OAuthStateDBResponse>("DELETE FROM oauth_states WHERE state = $1 RETURNING *")
            .bind(state)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(state)
    }

    #[instrument(skip(self), err)]
    pub async fn purge_expired(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at < NOW()")
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
