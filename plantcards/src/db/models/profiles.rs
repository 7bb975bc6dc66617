//! Database models for user profiles.

use crate::api::models::profiles::NameDisplay;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ProfileDBResponse {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub name_display: NameDisplay,
    pub cards_per_session: i32,
    pub show_scientific_names: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` leaves a column unchanged and an empty display name clears it
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateDBRequest {
    pub display_name: Option<String>,
    pub name_display: Option<NameDisplay>,
    pub cards_per_session: Option<i32>,
    pub show_scientific_names: Option<bool>,
}
