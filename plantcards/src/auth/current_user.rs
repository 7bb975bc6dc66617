//! Extractors resolving the caller of a request.
//!
//! Credentials are looked for in this order:
//! 1. `Authorization: Bearer <jwt>` (scripts and non-browser clients)
//! 2. The session cookie set at login
//!
//! A verified token is then checked against the database, so a deleted account stops working
//! immediately and admin changes apply without waiting for the token to expire.
//!
//! Use `CurrentUser` for endpoints that require a login and `Option<CurrentUser>` for endpoints
//! that also serve anonymous visitors.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Token from an `Authorization: Bearer` header, if one was sent
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

/// Value of the session cookie, if one was sent
fn session_cookie<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Resolve the caller from whichever credential is present.
///
/// Returns:
/// - Ok(None): no credentials, or credentials that did not verify
/// - Ok(Some(user)): a verified token for an account that still exists
/// - Err(error): the database could not be reached
#[instrument(skip_all)]
async fn resolve_user(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>> {
    let cookie_name = &state.config.auth.native.session.cookie_name;
    let candidates = [("bearer", bearer_token(parts)), ("cookie", session_cookie(parts, cookie_name))];

    for (source, token) in candidates {
        let Some(token) = token else {
            continue;
        };
        match session::verify_session_token(token, &state.config) {
            Ok(claims) => {
                let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
                let Some(user) = Users::new(&mut conn).get_by_id(claims.id).await? else {
                    debug!(source, "Session token refers to a deleted user");
                    return Ok(None);
                };
                debug!(source, user_id = %user.id, "Authenticated request");
                return Ok(Some(CurrentUser::from(user)));
            }
            Err(Error::Unauthenticated { .. }) => {
                // Expired or tampered tokens are expected; try the next credential
                trace!(source, "Session token did not verify");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(None)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        resolve_user(parts, state)
            .await?
            .ok_or(Error::Unauthenticated { message: None })
    }
}

impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>> {
        resolve_user(parts, state).await
    }
}
