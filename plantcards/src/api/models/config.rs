//! Public client configuration.

use crate::config::Config;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Settings a browser client needs before the user logs in: which login options to render, the
/// upload limits to enforce locally, and the deck size bounds.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientConfig {
    pub native_auth_enabled: bool,
    pub registration_enabled: bool,
    pub max_file_size: u64,
    pub max_files_per_upload: usize,
    /// MIME types the upload endpoint accepts
    pub accepted_image_types: Vec<String>,
    pub default_cards_per_session: u32,
    pub max_cards_per_session: u32,
    pub quiz_choices: usize,
}

impl From<&Config> for ClientConfig {
    fn from(config: &Config) -> Self {
        let mut accepted = vec!["image/jpeg", "image/png", "image/gif", "image/webp"];
        if config.images.heic_converter.is_some() {
            accepted.extend(["image/heic", "image/heif"]);
        }

        Self {
            native_auth_enabled: config.auth.native.enabled,
            registration_enabled: config.auth.native.enabled && config.auth.native.allow_registration,
            max_file_size: config.images.max_file_size,
            max_files_per_upload: config.images.max_files_per_upload,
            accepted_image_types: accepted.into_iter().map(String::from).collect(),
            default_cards_per_session: config.study.default_cards_per_session,
            max_cards_per_session: config.study.max_cards_per_session,
            quiz_choices: config.study.quiz_choices,
        }
    }
}
