//! OpenAPI documentation for the plantcards HTTP API.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{handlers, models};
use crate::{filters, images};

/// Name of the session cookie in the default configuration
const DEFAULT_SESSION_COOKIE: &str = "plantcards_session";

/// Security schemes: the session JWT as a bearer token or as a cookie.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `/authentication/login` or `/authentication/register`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    DEFAULT_SESSION_COOKIE,
                    "Session cookie set on login. The cookie name is configurable.",
                ))),
            );
        }
    }
}

/// Endpoints under `/api/v1`
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::config::get_config,
        handlers::profiles::get_profile,
        handlers::profiles::update_profile,
        handlers::profiles::list_users,
        handlers::profiles::update_user,
        handlers::plants::list_plants,
        handlers::plants::get_plant,
        handlers::plants::create_plant,
        handlers::plants::update_plant,
        handlers::plants::delete_plant,
        handlers::plants::publish_plant,
        handlers::plants::unpublish_plant,
        handlers::plant_images::list_images,
        handlers::plant_images::upload_images,
        handlers::plant_images::set_primary_image,
        handlers::plant_images::delete_image,
        handlers::collections::list_collections,
        handlers::collections::get_collection,
        handlers::collections::create_collection,
        handlers::collections::update_collection,
        handlers::collections::delete_collection,
        handlers::collections::add_collection_plant,
        handlers::collections::remove_collection_plant,
        handlers::favorites::list_favorites,
        handlers::favorites::add_favorite,
        handlers::favorites::remove_favorite,
        handlers::sightings::list_sightings,
        handlers::sightings::create_sighting,
        handlers::sightings::update_sighting,
        handlers::sightings::delete_sighting,
        handlers::study::start_session,
        handlers::study::list_sessions,
        handlers::study::get_session,
        handlers::study::answer_card,
        handlers::study::finish_session,
        handlers::dashboard::get_dashboard,
        handlers::dashboard::get_admin_dashboard,
    ),
    components(schemas(
        models::config::ClientConfig,
        models::profiles::NameDisplay,
        models::profiles::ProfileResponse,
        models::profiles::ProfileUpdate,
        models::users::UserResponse,
        models::users::AdminUserUpdate,
        models::plants::PlantCreate,
        models::plants::PlantUpdate,
        models::plants::PlantSummary,
        models::plants::PlantResponse,
        models::plant_images::PlantImageResponse,
        models::plant_images::UploadedFileReport,
        models::plant_images::UploadReport,
        images::UploadStatus,
        filters::PlantFilter,
        filters::PlantSort,
        models::collections::CollectionCreate,
        models::collections::CollectionUpdate,
        models::collections::CollectionResponse,
        models::collections::CollectionDetail,
        models::sightings::SightingCreate,
        models::sightings::SightingUpdate,
        models::sightings::SightingResponse,
        models::study::StudyMode,
        models::study::StartSessionRequest,
        models::study::CardResponse,
        models::study::QuizChoice,
        models::study::SessionScore,
        models::study::SessionSummary,
        models::study::SessionResponse,
        models::study::CardAnswer,
        models::study::AnswerRequest,
        models::study::RevealedPlant,
        models::study::AnswerResult,
        models::dashboard::StudyTotals,
        models::dashboard::MissedPlant,
        models::dashboard::DashboardResponse,
        models::dashboard::AdminDashboardResponse,
    ))
)]
struct V1ApiDoc;

#[derive(OpenApi)]
#[openapi(
    nest((path = "/api/v1", api = V1ApiDoc)),
    paths(
        handlers::auth::get_registration_info,
        handlers::auth::register,
        handlers::auth::get_login_info,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::list_providers,
        handlers::auth::oauth_authorize,
        handlers::auth::oauth_callback,
        handlers::storage::get_stored_file,
    ),
    components(schemas(
        models::auth::RegistrationInfo,
        models::auth::LoginInfo,
        models::auth::RegisterRequest,
        models::auth::LoginRequest,
        models::auth::AuthResponse,
        models::auth::AuthSuccessResponse,
        models::auth::AuthProvidersResponse,
        models::auth::OAuthProviderInfo,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "authentication", description = "Registration, login and OAuth sign-in. Successful logins set a session cookie and return the same token for bearer use."),
        (name = "config", description = "Public client configuration."),
        (name = "profiles", description = "The caller's profile and display preferences."),
        (name = "admin", description = "User management for admins."),
        (name = "plants", description = "The plant catalog. Unpublished plants are visible only to their creator and admins."),
        (name = "plant_images", description = "Uploading and managing plant photos. Uploads are converted to WebP where possible."),
        (name = "collections", description = "Named sets of plants. Admin collections are curated and shown to everyone."),
        (name = "favorites", description = "The caller's favorite plants."),
        (name = "sightings", description = "Private log of where and when the caller saw a plant."),
        (name = "study", description = "Flashcard and multiple-choice quiz sessions.

A session fixes its deck when it starts. Cards are addressed by index, and each card can be answered once. Sessions finish by themselves when the last card is answered."),
        (name = "dashboard", description = "Study progress for the caller and catalog totals for admins."),
        (name = "storage", description = "Stored image files."),
    ),
    info(
        title = "Plant Flashcards API",
        version = "1.0.0",
        description = "Browse a plant catalog, curate collections, and learn plants with flashcards and quizzes.

## Authentication

Most endpoints accept the session token either as a cookie or in the `Authorization` header:

```
Authorization: Bearer YOUR_TOKEN
```

Anonymous callers can browse published plants and curated collections.

## Errors

Errors are JSON objects with a `message` field.",
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_nested_and_secured() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        assert!(paths.contains_key("/api/v1/plants"));
        assert!(paths.contains_key("/api/v1/study/sessions/{id}/answers"));
        assert!(paths.contains_key("/authentication/login"));
        assert!(paths.contains_key("/storage/{key}"));
        assert!(!paths.contains_key("/plants"));

        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("BearerAuth"));
        assert!(schemes.contains_key("CookieAuth"));
    }
}
