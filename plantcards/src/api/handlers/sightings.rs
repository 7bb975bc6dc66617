//! HTTP handlers for logged plant sightings. Sightings are private to the user who logged them.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sqlx::PgConnection;

use crate::{
    AppState,
    api::{
        handlers::{not_found, visible_plant},
        models::{
            pagination::PaginatedResponse,
            sightings::{ListSightingsQuery, SightingCreate, SightingResponse, SightingUpdate, check_observed_at},
            users::CurrentUser,
        },
    },
    db::{
        handlers::{Repository, SightingFilter, Sightings},
        models::sightings::{SightingCreateDBRequest, SightingDBResponse, SightingUpdateDBRequest},
    },
    errors::Error,
    types::{SightingId, abbrev_uuid},
};

/// Someone else's sighting looks missing
async fn own_sighting(conn: &mut PgConnection, user: &CurrentUser, id: SightingId) -> Result<SightingDBResponse, Error> {
    match Sightings::new(conn).get_by_id(id).await? {
        Some(sighting) if sighting.user_id == user.id => Ok(sighting),
        _ => Err(not_found("Sighting", id)),
    }
}

/// List the caller's sightings, newest observation first
#[utoipa::path(
    get,
    path = "/sightings",
    tag = "sightings",
    params(ListSightingsQuery),
    responses(
        (status = 200, description = "Page of sightings", body = PaginatedResponse<SightingResponse>),
        (status = 401, description = "Not logged in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn list_sightings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListSightingsQuery>,
) -> Result<Json<PaginatedResponse<SightingResponse>>, Error> {
    let (skip, limit) = query.pagination.params();
    let filter = SightingFilter::new(current_user.id, skip, limit).with_plant(query.plant_id);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut sightings = Sightings::new(&mut conn);
    let total = sightings.count(&filter).await?;
    let page = sightings.list(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        page.into_iter().map(SightingResponse::from).collect(),
        total,
        skip,
        limit,
    )))
}

/// Log a sighting
#[utoipa::path(
    post,
    path = "/sightings",
    tag = "sightings",
    request_body = SightingCreate,
    responses(
        (status = 201, description = "Sighting logged", body = SightingResponse),
        (status = 400, description = "Observation time is in the future"),
        (status = 404, description = "Plant not found or not visible"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_sighting(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<SightingCreate>,
) -> Result<(StatusCode, Json<SightingResponse>), Error> {
    let now = Utc::now();
    let observed_at = check_observed_at(create.observed_at.unwrap_or(now), now)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    visible_plant(&mut conn, Some(&current_user), create.plant_id).await?;

    let sighting = Sightings::new(&mut conn)
        .create(&SightingCreateDBRequest {
            user_id: current_user.id,
            plant_id: create.plant_id,
            observed_at,
            location: create.location,
            notes: create.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(sighting.into())))
}

/// Update one of the caller's sightings
#[utoipa::path(
    patch,
    path = "/sightings/{id}",
    tag = "sightings",
    request_body = SightingUpdate,
    params(("id" = uuid::Uuid, Path, description = "Sighting ID")),
    responses(
        (status = 200, description = "Updated sighting", body = SightingResponse),
        (status = 400, description = "Observation time is in the future"),
        (status = 404, description = "Sighting not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(sighting_id = %abbrev_uuid(&id)))]
pub async fn update_sighting(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<SightingId>,
    Json(update): Json<SightingUpdate>,
) -> Result<Json<SightingResponse>, Error> {
    let request = SightingUpdateDBRequest::try_from(update)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    own_sighting(&mut conn, &current_user, id).await?;
    let sighting = Sightings::new(&mut conn).update(id, &request).await?;

    Ok(Json(sighting.into()))
}

/// Delete one of the caller's sightings
#[utoipa::path(
    delete,
    path = "/sightings/{id}",
    tag = "sightings",
    params(("id" = uuid::Uuid, Path, description = "Sighting ID")),
    responses(
        (status = 204, description = "Sighting deleted"),
        (status = 404, description = "Sighting not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(sighting_id = %abbrev_uuid(&id)))]
pub async fn delete_sighting(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<SightingId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    own_sighting(&mut conn, &current_user, id).await?;
    Sightings::new(&mut conn).delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
