//! Database models for pending OAuth authorization requests.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct OAuthStateCreateDBRequest {
    pub state: String,
    pub provider: String,
    pub redirect_to: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OAuthStateDBResponse {
    pub state: String,
    pub provider: String,
    pub redirect_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
