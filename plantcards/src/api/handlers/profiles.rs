//! HTTP handlers for the caller's profile and admin user management.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        profiles::{ProfileResponse, ProfileUpdate},
        users::{AdminUserUpdate, CurrentUser, ListUsersQuery, UserResponse},
    },
    auth::permissions,
    db::{
        handlers::{Profiles, Repository, UserFilter, Users},
        models::profiles::ProfileUpdateDBRequest,
    },
    errors::Error,
    types::{UserId, abbrev_uuid},
};

/// Get the caller's profile
#[utoipa::path(
    get,
    path = "/profile",
    tag = "profiles",
    responses(
        (status = 200, description = "The caller's profile", body = ProfileResponse),
        (status = 401, description = "Not logged in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn get_profile(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ProfileResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let profile = Profiles::new(&mut conn)
        .get(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Profile".to_string(),
            id: current_user.id.to_string(),
        })?;

    Ok(Json(ProfileResponse::new(current_user.email, profile)))
}

/// Update the caller's display preferences
#[utoipa::path(
    patch,
    path = "/profile",
    tag = "profiles",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid value"),
        (status = 401, description = "Not logged in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn update_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, Error> {
    let max = state.config.study.max_cards_per_session as i32;
    let cards_per_session = match update.cards_per_session {
        Some(n) if n < 1 => {
            return Err(Error::BadRequest {
                message: "cards_per_session must be at least 1".to_string(),
            });
        }
        Some(n) => Some(n.min(max)),
        None => None,
    };

    let request = ProfileUpdateDBRequest {
        display_name: update.display_name,
        name_display: update.name_display,
        cards_per_session,
        show_scientific_names: update.show_scientific_names,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let profile = Profiles::new(&mut conn).update(current_user.id, &request).await?;

    Ok(Json(ProfileResponse::new(current_user.email, profile)))
}

/// List user accounts
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<UserResponse>),
        (status = 403, description = "Not an admin"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, Error> {
    permissions::require_admin(&current_user)?;

    let (skip, limit) = query.pagination.params();
    let search = query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);
    let total = users.count(search.as_deref()).await?;
    let page = users.list(&UserFilter::new(skip, limit).with_search(search)).await?;

    Ok(Json(PaginatedResponse::new(
        page.into_iter().map(UserResponse::from).collect(),
        total,
        skip,
        limit,
    )))
}

/// Grant or revoke admin rights
#[utoipa::path(
    patch,
    path = "/admin/users/{id}",
    tag = "admin",
    request_body = AdminUserUpdate,
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Admins cannot revoke their own admin flag"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No such user"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(target = %abbrev_uuid(&id)))]
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<UserId>,
    Json(update): Json<AdminUserUpdate>,
) -> Result<Json<UserResponse>, Error> {
    permissions::require_admin(&current_user)?;

    if id == current_user.id && !update.is_admin {
        return Err(Error::BadRequest {
            message: "You cannot revoke your own admin rights".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Profiles::new(&mut conn).set_admin(id, update.is_admin).await?;
    let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;

    tracing::info!(is_admin = update.is_admin, "Changed admin flag");
    Ok(Json(UserResponse::from(user)))
}
