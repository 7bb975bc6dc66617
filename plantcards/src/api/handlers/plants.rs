//! HTTP handlers for the plant catalog.

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::{
        handlers::{not_found, visibility, visible_collection, visible_plant},
        models::{
            pagination::PaginatedResponse,
            plant_images::PlantImageResponse,
            plants::{ListPlantsQuery, PlantCreate, PlantResponse, PlantSummary, PlantUpdate},
            users::CurrentUser,
        },
    },
    auth::permissions,
    db::{
        handlers::{Collections, Favorites, PlantImages, Plants, Repository, StudySessions},
        models::plants::{PlantDBResponse, PlantUpdateDBRequest},
    },
    errors::Error,
    filters::{FilterContext, PlantFilter, apply_filters, sort_plants},
    types::{Operation, PlantId, abbrev_uuid},
};

/// The caller's favorite plants; empty for anonymous callers
pub(crate) async fn favorite_ids(conn: &mut PgConnection, user: Option<&CurrentUser>) -> Result<HashSet<PlantId>, Error> {
    match user {
        Some(user) => Ok(Favorites::new(conn).plant_ids(user.id).await?),
        None => Ok(HashSet::new()),
    }
}

/// Every plant the caller may see, narrowed and ordered by `filter`.
///
/// A `collection_id` the caller cannot see behaves like a missing collection.
pub(crate) async fn filtered_plants(
    conn: &mut PgConnection,
    user: Option<&CurrentUser>,
    filter: &PlantFilter,
    favorites: HashSet<PlantId>,
) -> Result<Vec<PlantDBResponse>, Error> {
    let filter = filter.clone().normalized();

    let collection_members = match filter.collection_id {
        Some(collection_id) => {
            visible_collection(conn, user, collection_id).await?;
            let members = Collections::new(conn).plant_ids(collection_id).await?;
            Some(members.into_iter().collect())
        }
        None => None,
    };

    let plants = Plants::new(conn).list(&visibility(user)).await?;
    let ctx = FilterContext {
        favorites,
        collection_members,
    };
    let mut plants = apply_filters(plants, &filter, &ctx);
    if let Some(sort) = filter.sort {
        sort_plants(&mut plants, sort);
    }

    Ok(plants)
}

/// List plants
#[utoipa::path(
    get,
    path = "/plants",
    tag = "plants",
    params(ListPlantsQuery),
    responses(
        (status = 200, description = "Page of visible plants", body = PaginatedResponse<PlantSummary>),
        (status = 404, description = "Filtered collection not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_plants(
    State(state): State<AppState>,
    current_user: Option<CurrentUser>,
    Query(query): Query<ListPlantsQuery>,
) -> Result<Json<PaginatedResponse<PlantSummary>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = current_user.as_ref();

    let favorites = favorite_ids(&mut conn, user).await?;
    let plants = filtered_plants(&mut conn, user, &query.filter, favorites.clone()).await?;

    let total = plants.len() as i64;
    let (skip, limit) = query.pagination.params();
    let data = query
        .pagination
        .page_of(plants)
        .into_iter()
        .map(|plant| {
            let is_favorite = favorites.contains(&plant.id);
            PlantSummary::new(plant, is_favorite, &state.config.storage)
        })
        .collect();

    Ok(Json(PaginatedResponse::new(data, total, skip, limit)))
}

/// Get a plant with all of its images
#[utoipa::path(
    get,
    path = "/plants/{id}",
    tag = "plants",
    params(("id" = uuid::Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "The plant", body = PlantResponse),
        (status = 404, description = "Plant not found or not visible"),
    )
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&id)))]
pub async fn get_plant(
    State(state): State<AppState>,
    current_user: Option<CurrentUser>,
    Path(id): Path<PlantId>,
) -> Result<Json<PlantResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plant = visible_plant(&mut conn, current_user.as_ref(), id).await?;
    Ok(Json(plant_response(&mut conn, &state, current_user.as_ref(), plant).await?))
}

async fn plant_response(
    conn: &mut PgConnection,
    state: &AppState,
    user: Option<&CurrentUser>,
    plant: PlantDBResponse,
) -> Result<PlantResponse, Error> {
    let images = PlantImages::new(conn)
        .list_for_plant(plant.id)
        .await?
        .into_iter()
        .map(|image| PlantImageResponse::new(image, &state.config.storage))
        .collect();
    let is_favorite = favorite_ids(conn, user).await?.contains(&plant.id);

    Ok(PlantResponse::new(plant, images, is_favorite, &state.config.storage))
}

/// Create a plant
///
/// New plants are owned by the caller and start unpublished.
#[utoipa::path(
    post,
    path = "/plants",
    tag = "plants",
    request_body = PlantCreate,
    responses(
        (status = 201, description = "Plant created", body = PlantResponse),
        (status = 400, description = "Missing name"),
        (status = 401, description = "Not logged in"),
        (status = 409, description = "A plant with this scientific name already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_plant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<PlantCreate>,
) -> Result<(StatusCode, Json<PlantResponse>), Error> {
    let request = create.into_db_request(current_user.id)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plant = Plants::new(&mut conn).create(&request).await?;
    tracing::info!(plant_id = %abbrev_uuid(&plant.id), "Created plant");

    Ok((StatusCode::CREATED, Json(PlantResponse::new(plant, vec![], false, &state.config.storage))))
}

/// Update a plant
#[utoipa::path(
    patch,
    path = "/plants/{id}",
    tag = "plants",
    request_body = PlantUpdate,
    params(("id" = uuid::Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "Updated plant", body = PlantResponse),
        (status = 400, description = "Invalid value"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Plant not found"),
        (status = 409, description = "A plant with this scientific name already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&id)))]
pub async fn update_plant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<PlantId>,
    Json(update): Json<PlantUpdate>,
) -> Result<Json<PlantResponse>, Error> {
    let request = PlantUpdateDBRequest::try_from(update)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plant = visible_plant(&mut conn, Some(&current_user), id).await?;
    permissions::require_modify_plant(&current_user, &plant, Operation::UpdateOwn)?;

    let plant = Plants::new(&mut conn).update(id, &request).await?;
    Ok(Json(plant_response(&mut conn, &state, Some(&current_user), plant).await?))
}

/// Delete a plant along with its images, memberships, favorites and sightings.
///
/// Open study sessions keep the card but stop counting it.
#[utoipa::path(
    delete,
    path = "/plants/{id}",
    tag = "plants",
    params(("id" = uuid::Uuid, Path, description = "Plant ID")),
    responses(
        (status = 204, description = "Plant deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Plant not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&id)))]
pub async fn delete_plant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<PlantId>,
) -> Result<StatusCode, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let plant = visible_plant(&mut tx, Some(&current_user), id).await?;
    permissions::require_modify_plant(&current_user, &plant, Operation::DeleteOwn)?;

    let file_paths = PlantImages::new(&mut tx).file_paths_for_plant(id).await?;
    let sessions = StudySessions::new(&mut tx).remove_plant_from_open(id).await?;
    if !Plants::new(&mut tx).delete(id).await? {
        return Err(not_found("Plant", id));
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    if sessions > 0 {
        tracing::info!(sessions, "Removed plant from open study sessions");
    }

    // The rows are gone either way; a file that fails to delete is only logged
    for path in file_paths {
        if let Err(e) = state.storage.delete(&path).await {
            tracing::warn!(storage_key = %path, error = %e, "Failed to delete image file");
        }
    }

    tracing::info!("Deleted plant");
    Ok(StatusCode::NO_CONTENT)
}

async fn set_published(state: AppState, current_user: CurrentUser, id: PlantId, is_published: bool) -> Result<Json<PlantResponse>, Error> {
    permissions::require_admin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plant = Plants::new(&mut conn).set_published(id, is_published).await?;
    tracing::info!(is_published, "Changed plant visibility");

    Ok(Json(plant_response(&mut conn, &state, Some(&current_user), plant).await?))
}

/// Publish a plant
#[utoipa::path(
    post,
    path = "/plants/{id}/publish",
    tag = "plants",
    params(("id" = uuid::Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "Published plant", body = PlantResponse),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Plant not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&id)))]
pub async fn publish_plant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<PlantId>,
) -> Result<Json<PlantResponse>, Error> {
    set_published(state, current_user, id, true).await
}

/// Unpublish a plant
#[utoipa::path(
    post,
    path = "/plants/{id}/unpublish",
    tag = "plants",
    params(("id" = uuid::Uuid, Path, description = "Plant ID")),
    responses(
        (status = 200, description = "Unpublished plant", body = PlantResponse),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Plant not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&id)))]
pub async fn unpublish_plant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<PlantId>,
) -> Result<Json<PlantResponse>, Error> {
    set_published(state, current_user, id, false).await
}
