//! OAuth2 authorization-code login.
//!
//! Providers are configured, not coded: any provider with an authorize, token and userinfo
//! endpoint works. The flow is
//!
//! 1. `GET /authentication/oauth/{provider}` stores a random `state` (with a TTL and the page to
//!    return to) and redirects the browser to the provider
//! 2. the provider redirects back to `/authentication/oauth/{provider}/callback?code=&state=`
//! 3. the state is consumed, the code exchanged for an access token, the userinfo fetched, and
//!    the user found or created by email

use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use sqlx::PgConnection;
use url::Url;

use crate::{
    config::{Config, OAuthProviderConfig},
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    errors::Error,
};

/// Identity asserted by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthIdentity {
    pub email: String,
    pub display_name: Option<String>,
}

pub fn find_provider<'a>(config: &'a Config, id: &str) -> Result<&'a OAuthProviderConfig, Error> {
    config
        .auth
        .oauth
        .providers
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| Error::NotFound {
            resource: "OAuth provider".to_string(),
            id: id.to_string(),
        })
}

/// 32 random bytes, base64url encoded
pub fn generate_state_token() -> String {
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// Where the provider should send the browser back to
pub fn callback_url(config: &Config, provider: &OAuthProviderConfig) -> String {
    format!(
        "{}/authentication/oauth/{}/callback",
        config.public_url.trim_end_matches('/'),
        provider.id
    )
}

pub fn build_authorize_url(provider: &OAuthProviderConfig, redirect_uri: &str, state: &str) -> Url {
    let mut url = provider.authorize_url.clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &provider.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", state)
        .append_pair("scope", &provider.scopes.join(" "));
    url
}

/// Only same-site relative paths are honoured; anything else lands on `/`
pub fn sanitize_redirect(redirect_to: Option<&str>) -> String {
    match redirect_to.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Read a value from a JSON document by dotted path, e.g. `data.attributes.email`
pub fn extract_field<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(json, |value, key| value.get(key))
}

fn upstream(message: impl Into<String>) -> Error {
    Error::Upstream { message: message.into() }
}

/// Pull `access_token` out of a token response. Some providers still answer with a
/// form-encoded body instead of JSON.
pub fn parse_access_token_response(raw: &str) -> Result<String, Error> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(upstream("token exchange returned an empty body"));
    }

    let fields: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(_) => {
            let pairs: Vec<(String, String)> =
                serde_urlencoded::from_str(body).map_err(|e| upstream(format!("unreadable token response: {e}")))?;
            Value::Object(pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
        }
    };

    if let Some(token) = fields
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Ok(token.to_string());
    }

    let error = fields.get("error").and_then(Value::as_str);
    let description = fields.get("error_description").and_then(Value::as_str);
    let detail = match (error, description) {
        (Some(e), Some(d)) if !d.is_empty() => format!("{e}: {d}"),
        (Some(e), _) => e.to_string(),
        (None, Some(d)) => d.to_string(),
        (None, None) => "no access_token in response".to_string(),
    };
    Err(upstream(format!("token exchange failed: {detail}")))
}

pub fn extract_identity(provider: &OAuthProviderConfig, userinfo: &Value) -> Result<OAuthIdentity, Error> {
    let email = extract_field(userinfo, &provider.email_field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|e| e.contains('@'))
        .ok_or_else(|| {
            upstream(format!(
                "userinfo from {} has no email at '{}'",
                provider.id, provider.email_field
            ))
        })?;

    let display_name = provider
        .name_field
        .as_deref()
        .and_then(|field| extract_field(userinfo, field))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Ok(OAuthIdentity {
        email: email.to_string(),
        display_name,
    })
}

/// Exchange an authorization code for an access token
#[tracing::instrument(skip(http, provider, code), fields(provider = %provider.id), err)]
pub async fn exchange_code(
    http: &reqwest::Client,
    provider: &OAuthProviderConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<String, Error> {
    let form = serde_urlencoded::to_string([
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", provider.client_id.as_str()),
        ("client_secret", provider.client_secret.as_str()),
    ])
    .map_err(|e| Error::Internal {
        operation: format!("encode token request: {e}"),
    })?;

    let response = http
        .post(provider.token_url.clone())
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(form)
        .send()
        .await
        .map_err(|e| upstream(format!("token endpoint unreachable: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| upstream(format!("reading token response: {e}")))?;

    if !status.is_success() {
        tracing::warn!(%status, "Token endpoint rejected the authorization code");
    }
    parse_access_token_response(&body)
}

/// Fetch and interpret the provider's userinfo document
#[tracing::instrument(skip(http, provider, access_token), fields(provider = %provider.id), err)]
pub async fn fetch_identity(
    http: &reqwest::Client,
    provider: &OAuthProviderConfig,
    access_token: &str,
) -> Result<OAuthIdentity, Error> {
    let response = http
        .get(provider.userinfo_url.clone())
        .bearer_auth(access_token)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| upstream(format!("userinfo endpoint unreachable: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(upstream(format!("userinfo endpoint returned {status}")));
    }

    let userinfo: Value = response
        .json()
        .await
        .map_err(|e| upstream(format!("userinfo is not JSON: {e}")))?;

    extract_identity(provider, &userinfo)
}

/// Log in the account with this email, creating it on first login
#[tracing::instrument(skip(conn, identity, config), fields(provider = %provider_id), err)]
pub async fn find_or_create_user(
    conn: &mut PgConnection,
    identity: &OAuthIdentity,
    provider_id: &str,
    config: &Config,
) -> Result<UserDBResponse, Error> {
    let mut users = Users::new(conn);

    let user = match users.get_user_by_email(&identity.email).await? {
        Some(user) => user,
        None => {
            tracing::info!("Creating account on first OAuth login");
            users
                .create(&UserCreateDBRequest {
                    email: identity.email.clone(),
                    display_name: identity.display_name.clone(),
                    is_admin: false,
                    auth_source: format!("oauth:{provider_id}"),
                    password_hash: None,
                    cards_per_session: config.study.default_cards_per_session as i32,
                })
                .await?
        }
    };

    users.record_login(user.id).await?;
    Ok(user)
}
