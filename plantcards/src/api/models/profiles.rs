//! Profile and display preference models.

use crate::db::models::profiles::ProfileDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which plant name(s) to show on cards and quiz choices
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "name_display", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NameDisplay {
    #[default]
    Common,
    Scientific,
    Both,
}

impl NameDisplay {
    /// Whether the (common, scientific) names are shown, taking the global scientific toggle into account.
    ///
    /// A `scientific` preference always shows the scientific name, otherwise there would be nothing to show.
    pub fn visible_names(self, show_scientific_names: bool) -> (bool, bool) {
        match self {
            NameDisplay::Common => (true, false),
            NameDisplay::Scientific => (false, true),
            NameDisplay::Both => (true, show_scientific_names),
        }
    }

    /// Label for a plant under this preference, e.g. `Foxglove (Digitalis purpurea)`
    pub fn label(self, common_name: &str, scientific_name: &str) -> String {
        match self {
            NameDisplay::Common => common_name.to_string(),
            NameDisplay::Scientific => scientific_name.to_string(),
            NameDisplay::Both => format!("{common_name} ({scientific_name})"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub name_display: NameDisplay,
    pub cards_per_session: i32,
    pub show_scientific_names: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update. Omitted fields are left unchanged; an empty display name clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub name_display: Option<NameDisplay>,
    /// Clamped to the configured maximum
    pub cards_per_session: Option<i32>,
    pub show_scientific_names: Option<bool>,
}

impl ProfileResponse {
    pub fn new(email: String, db: ProfileDBResponse) -> Self {
        Self {
            user_id: db.user_id,
            email,
            display_name: db.display_name,
            is_admin: db.is_admin,
            name_display: db.name_display,
            cards_per_session: db.cards_per_session,
            show_scientific_names: db.show_scientific_names,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
