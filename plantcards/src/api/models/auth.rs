//! Authentication payloads: native login/registration and OAuth redirects.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::models::users::UserResponse;

/// Registration information
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegistrationInfo {
    /// Whether registration is enabled
    pub enabled: bool,
    /// Status message
    pub message: String,
}

/// Login information
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginInfo {
    /// Whether native login is enabled
    pub enabled: bool,
    /// Status message
    pub message: String,
}

/// Request to register a new user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Email address (must be unique, case-insensitive)
    pub email: String,
    /// Password (will be hashed)
    pub password: String,
    pub display_name: Option<String>,
}

/// Request to login
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response after successful login or registration
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// Login methods available to the browser
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthProvidersResponse {
    /// Email/password login is available
    pub native: bool,
    /// Self-registration is available
    pub registration: bool,
    pub oauth: Vec<OAuthProviderInfo>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OAuthProviderInfo {
    pub id: String,
    pub display_name: String,
    /// Path that starts the redirect flow for this provider
    pub login_path: String,
}

/// Query for `GET /authentication/oauth/{provider}`
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct OAuthAuthorizeQuery {
    /// Relative path to land on after login, e.g. `/study`
    pub redirect_to: Option<String>,
}

/// Query the provider sends back to the callback
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denied access
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn with_cookie(status: StatusCode, cookie: &str, body: impl IntoResponse) -> Response {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Refusing to send malformed session cookie: {}", e),
    }
    (status, headers, body).into_response()
}

/// Structured response for successful registration
pub struct RegisterResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for RegisterResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::CREATED, &self.cookie, Json(self.auth_response))
    }
}

/// Structured response for successful login
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::OK, &self.cookie, Json(self.auth_response))
    }
}

/// Structured response for successful logout
pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::OK, &self.cookie, Json(self.auth_response))
    }
}

/// Redirect back into the app after an OAuth login, carrying the new session cookie
pub struct OAuthLoginRedirect {
    pub location: String,
    pub cookie: String,
}

impl IntoResponse for OAuthLoginRedirect {
    fn into_response(self) -> Response {
        let mut response = with_cookie(StatusCode::SEE_OTHER, &self.cookie, ());
        match HeaderValue::from_str(&self.location) {
            Ok(value) => {
                response.headers_mut().insert(header::LOCATION, value);
            }
            Err(_) => {
                response.headers_mut().insert(header::LOCATION, HeaderValue::from_static("/"));
            }
        }
        response
    }
}
