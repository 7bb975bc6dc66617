//! HTTP handler for the public client configuration.

use axum::{Json, extract::State};

use crate::{AppState, api::models::config::ClientConfig};

#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    summary = "Get client config",
    description = "Login options, upload limits and deck sizes a client needs before anyone logs in",
    responses(
        (status = 200, description = "Client configuration", body = ClientConfig),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_config(State(state): State<AppState>) -> Json<ClientConfig> {
    Json(ClientConfig::from(&state.config))
}

#[cfg(test)]
mod tests {
    use crate::api::models::config::ClientConfig;
    use crate::config::HeicConverterConfig;
    use crate::test_utils::{create_test_app, create_test_app_with_config, create_test_config};
    use axum::http::StatusCode;
    use sqlx::PgPool;
    use std::time::Duration;

    #[sqlx::test]
    #[test_log::test]
    async fn test_config_is_public(pool: PgPool) {
        let (app, _storage) = create_test_app(pool).await;

        let response = app.get("/api/v1/config").await;
        response.assert_status(StatusCode::OK);

        let config: ClientConfig = response.json();
        assert!(config.native_auth_enabled);
        assert!(config.registration_enabled);
        assert!(config.accepted_image_types.contains(&"image/webp".to_string()));
        assert!(!config.accepted_image_types.contains(&"image/heic".to_string()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_heic_advertised_with_converter(pool: PgPool) {
        let mut config = create_test_config();
        config.images.heic_converter = Some(HeicConverterConfig {
            command: "heif-convert".to_string(),
            args: vec!["{input}".to_string(), "{output}".to_string()],
            timeout: Duration::from_secs(30),
        });
        let (app, _storage) = create_test_app_with_config(pool, config).await;

        let config: ClientConfig = app.get("/api/v1/config").await.json();
        assert!(config.accepted_image_types.contains(&"image/heic".to_string()));
    }
}
