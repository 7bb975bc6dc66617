//! # plantcards: Plant Flashcards
//!
//! `plantcards` is a self-hostable web service for learning to recognise plants. It keeps a
//! catalog of plants with photos, lets users group them into collections, mark favorites and log
//! sightings, and turns any slice of the catalog into a flashcard or multiple-choice quiz session.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. Uploaded images live on the local filesystem behind the
//! [`db::handlers::file_storage::FileStorage`] trait; the database only records their keys.
//!
//! ### Request Flow
//!
//! Requests to `/api/v1/*` are authenticated by the [`api::models::users::CurrentUser`]
//! extractor, which accepts the session JWT as a bearer token or a cookie. Browsing endpoints
//! take an `Option<CurrentUser>` so anonymous visitors can see published plants and curated
//! collections. Handlers check permissions with [`auth::permissions`] and talk to the database
//! through the repositories in [`db::handlers`].
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) holds the Axum handlers and their request/response models.
//!
//! The **authentication layer** ([`auth`]) covers password hashing, session tokens, OAuth login
//! and the permission rules for plants and collections.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Each entity (users, plants,
//! collections, sessions, ...) has a repository that owns its queries.
//!
//! The **image pipeline** ([`images`]) detects upload formats, converts them to WebP and stores
//! them one at a time, reporting progress per file.
//!
//! The **study engine** ([`study`]) is pure: seeded deck shuffles, quiz choice generation, answer
//! matching and scoring. Handlers persist what it computes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use plantcards::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = plantcards::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     plantcards::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run automatically on startup, or by hand:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! plantcards::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod filters;
pub mod images;
mod openapi;
pub mod study;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    config::CorsOrigin,
    db::handlers::{Profiles, Repository, Users, file_storage::{FileStorage, create_file_storage}},
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    openapi::ApiDoc,
};
use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{delete, get, patch, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{CollectionId, PlantId, PlantImageId, SightingId, StudySessionId, UserId};

/// Headroom on top of the file bytes in a multipart upload, for boundaries and text fields
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .storage(Arc::new(LocalFileStorage::new(path)))
///     .http_client(build_http_client(Duration::from_secs(10))?)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Where plant image bytes are kept
    pub storage: Arc<dyn FileStorage>,
    /// Outbound client for OAuth token and userinfo calls
    pub http_client: reqwest::Client,
}

/// Get the plantcards database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the outbound HTTP client.
///
/// reqwest is compiled without a bundled crypto provider, so the aws-lc-rs provider is installed
/// here if nothing else has installed one yet.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("plantcards/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: an existing account with this email is promoted to admin, and its password is
/// replaced when one is given. Called on every startup so there is always an admin to log in as.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = match password {
        Some(pwd) => Some(auth::password::hash_string(pwd).context("Failed to hash admin password")?),
        None => None,
    };

    let mut tx = db.begin().await?;

    let existing = Users::new(&mut tx)
        .get_user_by_email(email)
        .await
        .context("Failed to check existing user")?;

    let user_id = match existing {
        Some(user) => {
            if password_hash.is_some() {
                Users::new(&mut tx)
                    .update(
                        user.id,
                        &UserUpdateDBRequest {
                            password_hash,
                            ..Default::default()
                        },
                    )
                    .await
                    .context("Failed to update admin password")?;
            }
            if !user.is_admin {
                Profiles::new(&mut tx).set_admin(user.id, true).await?;
            }
            user.id
        }
        None => {
            let created = Users::new(&mut tx)
                .create(&UserCreateDBRequest {
                    email: email.to_string(),
                    display_name: None,
                    is_admin: true,
                    auth_source: "system".to_string(),
                    password_hash,
                    cards_per_session: 20,
                })
                .await
                .context("Failed to create admin user")?;
            info!("Created initial admin user {}", email);
            created.id
        }
    };

    tx.commit().await?;
    Ok(user_id)
}

/// Connect to the configured database and run migrations
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let url = config
        .database_url()
        .context("No database configured: set database.url or DATABASE_URL")?;

    let settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .connect(url)
        .await?;

    migrator().run(&pool).await?;
    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut exposed = vec![http::header::LOCATION];
    for header in &config.auth.security.cors.exposed_headers {
        let name = header.parse::<http::HeaderName>()?;
        if !exposed.contains(&name) {
            exposed.push(name);
        }
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(exposed);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Largest request body the image upload route accepts
fn upload_body_limit(config: &Config) -> usize {
    let per_file = usize::try_from(config.images.max_file_size).unwrap_or(usize::MAX);
    per_file
        .saturating_mul(config.images.max_files_per_upload)
        .saturating_add(MULTIPART_OVERHEAD)
}

/// Build the main application router with all endpoints and middleware.
///
/// - Authentication routes at `/authentication/*`
/// - The REST API at `/api/v1/*`
/// - Stored files at `/storage/*`
/// - API documentation at `/api/docs`
/// - Optional Prometheus metrics at `/internal/metrics`
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers;

    // Authentication routes (at root level)
    let auth_routes = Router::new()
        .route(
            "/authentication/register",
            get(handlers::auth::get_registration_info).post(handlers::auth::register),
        )
        .route(
            "/authentication/login",
            get(handlers::auth::get_login_info).post(handlers::auth::login),
        )
        .route("/authentication/logout", post(handlers::auth::logout))
        .route("/authentication/providers", get(handlers::auth::list_providers))
        .route("/authentication/oauth/{provider}", get(handlers::auth::oauth_authorize))
        .route("/authentication/oauth/{provider}/callback", get(handlers::auth::oauth_callback))
        .with_state(state.clone());

    // Uploads get their own body limit, everything else keeps axum's default
    let upload_routes = Router::new().route(
        "/plants/{id}/images",
        get(handlers::plant_images::list_images)
            .post(handlers::plant_images::upload_images)
            .layer(DefaultBodyLimit::max(upload_body_limit(&state.config))),
    );

    let api_routes = Router::new()
        .merge(upload_routes)
        .route("/config", get(handlers::config::get_config))
        // Profile and user management
        .route(
            "/profile",
            get(handlers::profiles::get_profile).patch(handlers::profiles::update_profile),
        )
        .route("/admin/users", get(handlers::profiles::list_users))
        .route("/admin/users/{id}", patch(handlers::profiles::update_user))
        // Plant catalog
        .route(
            "/plants",
            get(handlers::plants::list_plants).post(handlers::plants::create_plant),
        )
        .route(
            "/plants/{id}",
            get(handlers::plants::get_plant)
                .patch(handlers::plants::update_plant)
                .delete(handlers::plants::delete_plant),
        )
        .route("/plants/{id}/publish", post(handlers::plants::publish_plant))
        .route("/plants/{id}/unpublish", post(handlers::plants::unpublish_plant))
        .route(
            "/plants/{id}/images/{image_id}",
            delete(handlers::plant_images::delete_image),
        )
        .route(
            "/plants/{id}/images/{image_id}/primary",
            post(handlers::plant_images::set_primary_image),
        )
        // Collections
        .route(
            "/collections",
            get(handlers::collections::list_collections).post(handlers::collections::create_collection),
        )
        .route(
            "/collections/{id}",
            get(handlers::collections::get_collection)
                .patch(handlers::collections::update_collection)
                .delete(handlers::collections::delete_collection),
        )
        .route(
            "/collections/{id}/plants/{plant_id}",
            put(handlers::collections::add_collection_plant).delete(handlers::collections::remove_collection_plant),
        )
        // Favorites
        .route("/favorites", get(handlers::favorites::list_favorites))
        .route(
            "/favorites/{plant_id}",
            put(handlers::favorites::add_favorite).delete(handlers::favorites::remove_favorite),
        )
        // Sightings
        .route(
            "/sightings",
            get(handlers::sightings::list_sightings).post(handlers::sightings::create_sighting),
        )
        .route(
            "/sightings/{id}",
            patch(handlers::sightings::update_sighting).delete(handlers::sightings::delete_sighting),
        )
        // Study sessions
        .route(
            "/study/sessions",
            get(handlers::study::list_sessions).post(handlers::study::start_session),
        )
        .route("/study/sessions/{id}", get(handlers::study::get_session))
        .route("/study/sessions/{id}/answers", post(handlers::study::answer_card))
        .route("/study/sessions/{id}/finish", post(handlers::study::finish_session))
        // Dashboards
        .route("/dashboard", get(handlers::dashboard::get_dashboard))
        .route("/admin/dashboard", get(handlers::dashboard::get_admin_dashboard))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/storage/{*key}", get(handlers::storage::get_stored_file))
        .with_state(state.clone())
        .merge(auth_routes)
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()));

    // Add Prometheus metrics if enabled
    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(create_cors_layer(&state.config)?),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations, ensures the
///    initial admin exists and prepares the storage directory
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, drains requests and closes the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application on an existing pool (migrations are still run), or connect to the
    /// configured database when `pool` is `None`.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting plantcards with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &pool)
            .await
            .context("Failed to create initial admin user")?;

        let storage = create_file_storage(&config.storage)
            .await
            .context("Failed to set up image storage")?;

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .storage(storage)
            .http_client(build_http_client(Duration::from_secs(10))?)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Plantcards listening on http://{}, available at {}",
            bind_addr, self.config.public_url
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_config};
    use axum::http::StatusCode;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_initial_admin_user_new_user(pool: PgPool) {
        let user_id = create_initial_admin_user("root@example.com", Some("hunter22hunter"), &pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn).get_by_id(user_id).await.unwrap().unwrap();
        assert!(user.is_admin);
        assert_eq!(user.auth_source, "system");
        let hash = user.password_hash.unwrap();
        assert!(auth::password::verify_string("hunter22hunter", &hash).unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_initial_admin_user_existing_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let existing = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: "gardener@example.com".to_string(),
                display_name: None,
                is_admin: false,
                auth_source: "native".to_string(),
                password_hash: None,
                cards_per_session: 20,
            })
            .await
            .unwrap();

        let first = create_initial_admin_user("gardener@example.com", None, &pool).await.unwrap();
        let second = create_initial_admin_user("gardener@example.com", Some("new-password"), &pool)
            .await
            .unwrap();
        assert_eq!(first, existing.id);
        assert_eq!(second, existing.id);

        let user = Users::new(&mut conn).get_by_id(existing.id).await.unwrap().unwrap();
        assert!(user.is_admin, "existing account is promoted");
        assert!(auth::password::verify_string("new-password", &user.password_hash.unwrap()).unwrap());
    }

    #[test]
    fn test_upload_body_limit_covers_every_file() {
        let mut config = create_test_config();
        config.images.max_file_size = 1000;
        config.images.max_files_per_upload = 3;
        assert_eq!(upload_body_limit(&config), 3000 + MULTIPART_OVERHEAD);

        config.images.max_file_size = u64::MAX;
        assert_eq!(upload_body_limit(&config), usize::MAX);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_integration(pool: PgPool) {
        let (app, _storage) = create_test_app(pool).await;

        let response = app.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");

        app.get("/api/docs").await.assert_status_ok();
        app.get("/api/v1/nope").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cors_preflight(pool: PgPool) {
        let (app, _storage) = create_test_app(pool).await;

        let response = app
            .method(http::Method::OPTIONS, "/api/v1/plants")
            .add_header("origin", "http://localhost:5173")
            .add_header("access-control-request-method", "POST")
            .await;
        assert_eq!(response.header("access-control-allow-origin"), "http://localhost:5173");
        assert_eq!(response.header("access-control-allow-credentials"), "true");
    }

    #[test]
    fn test_cors_rejects_bad_exposed_header() {
        let mut config = create_test_config();
        config.auth.security.cors.exposed_headers = vec!["not a header".to_string()];
        assert!(create_cors_layer(&config).is_err());
    }
}
