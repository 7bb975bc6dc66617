//! Test utilities for integration testing.

use crate::config::{DatabaseConfig, NativeAuthConfig, PasswordConfig, PoolSettings, SessionConfig, StorageConfig, StudyConfig};
use crate::db::handlers::{Plants, Repository, Users};
use crate::db::handlers::file_storage::LocalFileStorage;
use crate::db::models::{plants::PlantCreateDBRequest, users::UserCreateDBRequest};
use crate::types::{PlantId, UserId};
use crate::{
    AppState,
    api::models::users::{CurrentUser, UserResponse},
    auth::session,
};
use axum_test::TestServer;
use sqlx::PgPool;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// A test server backed by `pool`, storing images in a fresh temporary directory.
///
/// Keep the returned [`TempDir`] alive for as long as the server is used.
pub async fn create_test_app(pool: PgPool) -> (TestServer, TempDir) {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, mut config: crate::config::Config) -> (TestServer, TempDir) {
    let storage_dir = TempDir::new().expect("Failed to create storage directory");
    config.storage.path = storage_dir.path().to_path_buf();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    (app.into_test_server(), storage_dir)
}

pub fn create_test_config() -> crate::config::Config {
    crate::config::Config {
        database_url: None,
        database: DatabaseConfig {
            // Will get overriden by the test pool
            url: None,
            pool: PoolSettings {
                max_connections: 2,
                min_connections: 0,
                ..Default::default()
            },
        },
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: crate::config::AuthConfig {
            native: NativeAuthConfig {
                enabled: true,
                allow_registration: true,
                password: PasswordConfig {
                    min_length: 8,
                    // Cheap hashing keeps the suite fast
                    argon2_memory_kib: 8,
                    argon2_iterations: 1,
                    argon2_parallelism: 1,
                    ..Default::default()
                },
                session: SessionConfig {
                    cookie_secure: false,
                    ..Default::default()
                },
            },
            ..Default::default()
        },
        storage: StorageConfig {
            path: std::env::temp_dir().join(format!("plantcards-test-storage-{}", std::process::id())),
            ..Default::default()
        },
        study: StudyConfig {
            default_cards_per_session: 10,
            max_cards_per_session: 50,
            quiz_choices: 4,
        },
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    }
}

/// State for exercising extractors and helpers without a server
pub async fn create_test_state(pool: PgPool) -> AppState {
    let config = create_test_config();
    AppState::builder()
        .db(pool)
        .storage(Arc::new(LocalFileStorage::new(config.storage.path.clone())))
        .http_client(crate::build_http_client(std::time::Duration::from_secs(5)).expect("Failed to build HTTP client"))
        .config(config)
        .build()
}

async fn insert_user(pool: &PgPool, is_admin: bool) -> UserResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let user_id = Uuid::new_v4();

    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: format!("testuser_{}@example.com", user_id.simple()),
            display_name: Some("Test User".to_string()),
            is_admin,
            auth_source: "test".to_string(),
            password_hash: None,
            cards_per_session: 10,
        })
        .await
        .expect("Failed to create test user");

    UserResponse::from(user)
}

pub async fn create_test_user(pool: &PgPool) -> UserResponse {
    insert_user(pool, false).await
}

pub async fn create_test_admin_user(pool: &PgPool) -> UserResponse {
    insert_user(pool, true).await
}

/// Headers that authenticate as `user` via a bearer session token
pub fn add_auth_headers(user: &UserResponse) -> Vec<(String, String)> {
    let config = create_test_config();
    let token = session::create_session_token(&CurrentUser::from(user), &config).expect("Failed to create session token");
    vec![("authorization".to_string(), format!("Bearer {token}"))]
}

pub async fn create_test_plant(pool: &PgPool, owner: UserId, scientific_name: &str, common_name: &str, published: bool) -> PlantId {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Plants::new(&mut conn)
        .create(
            &PlantCreateDBRequest::builder()
                .scientific_name(scientific_name)
                .common_name(common_name)
                .is_published(published)
                .created_by(owner)
                .build(),
        )
        .await
        .expect("Failed to create test plant")
        .id
}
