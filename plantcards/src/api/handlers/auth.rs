use axum::{
    Json,
    extract::{Path, Query, State},
    response::Redirect,
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        auth::{
            AuthProvidersResponse, AuthResponse, AuthSuccessResponse, LoginInfo, LoginRequest, LoginResponse, LogoutResponse,
            OAuthAuthorizeQuery, OAuthCallbackQuery, OAuthLoginRedirect, OAuthProviderInfo, RegisterRequest, RegisterResponse,
            RegistrationInfo,
        },
        users::{CurrentUser, UserResponse},
    },
    auth::{oauth, password, session},
    db::{
        handlers::{OAuthStates, Repository, Users},
        models::{oauth_states::OAuthStateCreateDBRequest, users::UserCreateDBRequest},
    },
    errors::Error,
};

fn native_enabled(state: &AppState) -> Result<(), Error> {
    if state.config.auth.native.enabled {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        })
    }
}

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

/// Issue a session for `user` and build the `Set-Cookie` value carrying it
fn start_session(user: &UserResponse, state: &AppState) -> Result<String, Error> {
    let token = session::create_session_token(&CurrentUser::from(user), &state.config)?;
    Ok(session::session_cookie(&token, &state.config))
}

/// Get registration information
#[utoipa::path(
    get,
    path = "/authentication/register",
    tag = "authentication",
    responses(
        (status = 200, description = "Registration info", body = RegistrationInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_registration_info(State(state): State<AppState>) -> Result<Json<RegistrationInfo>, Error> {
    let enabled = state.config.auth.native.enabled && state.config.auth.native.allow_registration;
    Ok(Json(RegistrationInfo {
        enabled,
        message: if enabled {
            "Registration is enabled".to_string()
        } else {
            "Registration is disabled".to_string()
        },
    }))
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/authentication/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input or registration disabled"),
        (status = 409, description = "User already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    native_enabled(&state)?;
    if !state.config.auth.native.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let email = request.email.trim().to_string();
    if !email.contains('@') {
        return Err(Error::BadRequest {
            message: "A valid email address is required".to_string(),
        });
    }
    password::validate_password(&request.password, &state.config.auth.native.password)?;

    let password_hash = password::hash_password(request.password, &state.config.auth.native.password).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    // The unique index on LOWER(email) turns a duplicate into a 409
    let created = users
        .create(&UserCreateDBRequest {
            email,
            display_name: request.display_name,
            is_admin: false,
            auth_source: "native".to_string(),
            password_hash: Some(password_hash),
            cards_per_session: state.config.study.default_cards_per_session as i32,
        })
        .await?;
    users.record_login(created.id).await?;

    let user = UserResponse::from(created);
    let cookie = start_session(&user, &state)?;

    Ok(RegisterResponse {
        auth_response: AuthResponse {
            user,
            message: "Registration successful".to_string(),
        },
        cookie,
    })
}

/// Get login information
#[utoipa::path(
    get,
    path = "/authentication/login",
    tag = "authentication",
    responses(
        (status = 200, description = "Login info", body = LoginInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_login_info(State(state): State<AppState>) -> Result<Json<LoginInfo>, Error> {
    Ok(Json(LoginInfo {
        enabled: state.config.auth.native.enabled,
        message: if state.config.auth.native.enabled {
            "Native login is enabled".to_string()
        } else {
            "Native login is disabled".to_string()
        },
    }))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    native_enabled(&state)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let user = users.get_user_by_email(request.email.trim()).await?.ok_or_else(invalid_credentials)?;

    // Accounts created through OAuth have no password
    let hash = user.password_hash.clone().ok_or_else(invalid_credentials)?;
    if !password::verify_password(request.password, hash).await? {
        return Err(invalid_credentials());
    }

    users.record_login(user.id).await?;

    let user = UserResponse::from(user);
    let cookie = start_session(&user, &state)?;

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user,
            message: "Login successful".to_string(),
        },
        cookie,
    })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: session::clear_session_cookie(&state.config),
    })
}

/// List the available login methods
#[utoipa::path(
    get,
    path = "/authentication/providers",
    tag = "authentication",
    responses(
        (status = 200, description = "Available login methods", body = AuthProvidersResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_providers(State(state): State<AppState>) -> Json<AuthProvidersResponse> {
    let native = &state.config.auth.native;
    Json(AuthProvidersResponse {
        native: native.enabled,
        registration: native.enabled && native.allow_registration,
        oauth: state
            .config
            .auth
            .oauth
            .providers
            .iter()
            .map(|p| OAuthProviderInfo {
                id: p.id.clone(),
                display_name: p.display_name.clone(),
                login_path: format!("/authentication/oauth/{}", p.id),
            })
            .collect(),
    })
}

/// Start an OAuth login by redirecting to the provider
#[utoipa::path(
    get,
    path = "/authentication/oauth/{provider}",
    tag = "authentication",
    params(
        ("provider" = String, Path, description = "Configured provider id"),
        OAuthAuthorizeQuery,
    ),
    responses(
        (status = 307, description = "Redirect to the provider's consent page"),
        (status = 404, description = "Unknown provider"),
    )
)]
#[tracing::instrument(skip_all, fields(provider = %provider_id))]
pub async fn oauth_authorize(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(query): Query<OAuthAuthorizeQuery>,
) -> Result<Redirect, Error> {
    let provider = oauth::find_provider(&state.config, &provider_id)?;
    let state_token = oauth::generate_state_token();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut states = OAuthStates::new(&mut conn);

    let purged = states.purge_expired().await?;
    if purged > 0 {
        tracing::debug!(purged, "Removed expired OAuth states");
    }

    let ttl = chrono::Duration::from_std(state.config.auth.oauth.state_ttl).map_err(|e| Error::Internal {
        operation: format!("convert OAuth state TTL: {e}"),
    })?;
    states
        .create(&OAuthStateCreateDBRequest {
            state: state_token.clone(),
            provider: provider.id.clone(),
            redirect_to: Some(oauth::sanitize_redirect(query.redirect_to.as_deref())),
            expires_at: Utc::now() + ttl,
        })
        .await?;

    let url = oauth::build_authorize_url(provider, &oauth::callback_url(&state.config, provider), &state_token);
    Ok(Redirect::temporary(url.as_str()))
}

/// Finish an OAuth login
#[utoipa::path(
    get,
    path = "/authentication/oauth/{provider}/callback",
    tag = "authentication",
    params(
        ("provider" = String, Path, description = "Configured provider id"),
        OAuthCallbackQuery,
    ),
    responses(
        (status = 303, description = "Logged in; redirect back into the app"),
        (status = 400, description = "Missing, expired or mismatched state, or access denied"),
        (status = 502, description = "The provider failed"),
    )
)]
#[tracing::instrument(skip_all, fields(provider = %provider_id))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<OAuthLoginRedirect, Error> {
    let provider = oauth::find_provider(&state.config, &provider_id)?;

    if let Some(error) = query.error {
        let detail = query.error_description.unwrap_or_default();
        tracing::info!(%error, %detail, "Provider returned an error to the callback");
        return Err(Error::BadRequest {
            message: format!("Login was not completed: {error}"),
        });
    }
    let (Some(code), Some(state_token)) = (query.code, query.state) else {
        return Err(Error::BadRequest {
            message: "Missing code or state".to_string(),
        });
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Single use: consumed before anything else can fail
    let pending = OAuthStates::new(&mut conn).consume(&state_token).await?;
    let pending = match pending {
        Some(pending) if pending.provider == provider.id && pending.expires_at > Utc::now() => pending,
        _ => {
            return Err(Error::BadRequest {
                message: "Invalid or expired login state".to_string(),
            });
        }
    };

    let redirect_uri = oauth::callback_url(&state.config, provider);
    let access_token = oauth::exchange_code(&state.http_client, provider, &code, &redirect_uri).await?;
    let identity = oauth::fetch_identity(&state.http_client, provider, &access_token).await?;

    let user = oauth::find_or_create_user(&mut conn, &identity, &provider.id, &state.config).await?;
    let user = UserResponse::from(user);
    let cookie = start_session(&user, &state)?;

    Ok(OAuthLoginRedirect {
        location: oauth::sanitize_redirect(pending.redirect_to.as_deref()),
        cookie,
    })
}

#[cfg(test)]
mod tests {
    use crate::api::models::auth::{AuthProvidersResponse, AuthResponse};
    use crate::config::OAuthProviderConfig;
    use crate::test_utils::{create_test_app, create_test_app_with_config, create_test_config};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_login_logout(pool: PgPool) {
        let (app, _storage) = create_test_app(pool.clone()).await;

        let response = app
            .post("/authentication/register")
            .json(&json!({"email": "rose@example.com", "password": "password123", "display_name": "Rose"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
        assert!(cookie.contains("HttpOnly"));
        let body: AuthResponse = response.json();
        assert_eq!(body.user.email, "rose@example.com");
        assert_eq!(body.user.auth_source, "native");
        assert!(!body.user.is_admin);

        let response = app
            .post("/authentication/login")
            .json(&json!({"email": "ROSE@example.com", "password": "password123"}))
            .await;
        response.assert_status_ok();
        assert!(response.headers().get("set-cookie").is_some());

        let response = app
            .post("/authentication/login")
            .json(&json!({"email": "rose@example.com", "password": "wrong-password"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = app.post("/authentication/logout").await;
        response.assert_status_ok();
        let cleared = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cleared.contains("Max-Age=0"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_conflicts(pool: PgPool) {
        let (app, _storage) = create_test_app(pool.clone()).await;
        let body = json!({"email": "dup@example.com", "password": "password123"});

        app.post("/authentication/register").json(&body).await.assert_status(StatusCode::CREATED);
        let response = app
            .post("/authentication/register")
            .json(&json!({"email": "DUP@example.com", "password": "password123"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_password_rules_and_disabled_registration(pool: PgPool) {
        let (app, _storage) = create_test_app(pool.clone()).await;
        app.post("/authentication/register")
            .json(&json!({"email": "short@example.com", "password": "short"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let mut config = create_test_config();
        config.auth.native.allow_registration = false;
        let (app, _storage) = create_test_app_with_config(pool, config).await;
        app.post("/authentication/register")
            .json(&json!({"email": "closed@example.com", "password": "password123"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        let info: serde_json::Value = app.get("/authentication/register").await.json();
        assert_eq!(info["enabled"], false);
    }

    fn provider(base: &str) -> OAuthProviderConfig {
        OAuthProviderConfig {
            id: "herbarium".to_string(),
            display_name: "Herbarium ID".to_string(),
            authorize_url: format!("{base}/authorize").parse().unwrap(),
            token_url: format!("{base}/token").parse().unwrap(),
            userinfo_url: format!("{base}/userinfo").parse().unwrap(),
            client_id: "client-123".to_string(),
            client_secret: "shh".to_string(),
            scopes: vec!["email".to_string()],
            email_field: "email".to_string(),
            name_field: Some("name".to_string()),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_oauth_round_trip(pool: PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "sage@example.com", "name": "Sage"})))
            .mount(&server)
            .await;

        let mut config = create_test_config();
        config.auth.oauth.providers = vec![provider(&server.uri())];
        let (app, _storage) = create_test_app_with_config(pool.clone(), config).await;

        let providers: AuthProvidersResponse = app.get("/authentication/providers").await.json();
        assert_eq!(providers.oauth.len(), 1);
        assert_eq!(providers.oauth[0].login_path, "/authentication/oauth/herbarium");

        let response = app
            .get("/authentication/oauth/herbarium")
            .add_query_param("redirect_to", "/study")
            .await;
        response.assert_status(StatusCode::TEMPORARY_REDIRECT);
        let location = url::Url::parse(response.headers()["location"].to_str().unwrap()).unwrap();
        assert_eq!(location.path(), "/authorize");
        let state = location
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let response = app
            .get("/authentication/oauth/herbarium/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", &state)
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/study");
        assert!(response.headers().get("set-cookie").is_some());

        // The state is single use
        let response = app
            .get("/authentication/oauth/herbarium/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", &state)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let auth_source: String = sqlx::query_scalar("SELECT auth_source FROM users WHERE email = 'sage@example.com'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(auth_source, "oauth:herbarium");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_oauth_unknown_provider_and_bad_state(pool: PgPool) {
        let mut config = create_test_config();
        config.auth.oauth.providers = vec![provider("http://127.0.0.1:9")];
        let (app, _storage) = create_test_app_with_config(pool, config).await;

        app.get("/authentication/oauth/nope").await.assert_status(StatusCode::NOT_FOUND);
        app.get("/authentication/oauth/herbarium/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", "never-issued")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        app.get("/authentication/oauth/herbarium/callback")
            .add_query_param("error", "access_denied")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
