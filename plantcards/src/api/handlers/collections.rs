//! HTTP handlers for collections and their member plants.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::{not_found, plants::favorite_ids, visibility, visible_collection, visible_plant},
        models::{
            collections::{CollectionCreate, CollectionDetail, CollectionResponse, CollectionUpdate},
            plants::PlantSummary,
            users::CurrentUser,
        },
    },
    auth::permissions,
    db::{
        handlers::{Collections, Plants, Repository},
        models::collections::{CollectionCreateDBRequest, CollectionUpdateDBRequest},
    },
    errors::Error,
    types::{CollectionId, Operation, Permission, PlantId, Resource, abbrev_uuid},
};

fn only_admins_curate(action: Operation) -> Error {
    Error::InsufficientPermissions {
        required: Permission::Allow(Resource::Collections, Operation::UpdateAll),
        action,
        resource: "curated collections".to_string(),
    }
}

fn check_name(name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "name must not be empty".to_string(),
        });
    }
    Ok(())
}

/// List collections
///
/// Published collections and the caller's own; admins see every collection.
#[utoipa::path(
    get,
    path = "/collections",
    tag = "collections",
    responses(
        (status = 200, description = "Visible collections, curated ones first", body = Vec<CollectionResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_collections(
    State(state): State<AppState>,
    current_user: Option<CurrentUser>,
) -> Result<Json<Vec<CollectionResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let collections = Collections::new(&mut conn).list(&visibility(current_user.as_ref())).await?;

    Ok(Json(collections.into_iter().map(CollectionResponse::from).collect()))
}

/// Get a collection with its member plants
#[utoipa::path(
    get,
    path = "/collections/{id}",
    tag = "collections",
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "The collection and the members the caller can see", body = CollectionDetail),
        (status = 404, description = "Collection not found or not visible"),
    )
)]
#[tracing::instrument(skip_all, fields(collection_id = %abbrev_uuid(&id)))]
pub async fn get_collection(
    State(state): State<AppState>,
    current_user: Option<CurrentUser>,
    Path(id): Path<CollectionId>,
) -> Result<Json<CollectionDetail>, Error> {
    let user = current_user.as_ref();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let collection = visible_collection(&mut conn, user, id).await?;

    let member_ids = Collections::new(&mut conn).plant_ids(id).await?;
    let mut members = Plants::new(&mut conn).get_bulk(member_ids.clone()).await?;
    let favorites = favorite_ids(&mut conn, user).await?;

    let plants = member_ids
        .into_iter()
        .filter_map(|plant_id| members.remove(&plant_id))
        .filter(|plant| permissions::can_view_plant(user, plant))
        .map(|plant| {
            let is_favorite = favorites.contains(&plant.id);
            PlantSummary::new(plant, is_favorite, &state.config.storage)
        })
        .collect();

    Ok(Json(CollectionDetail {
        collection: collection.into(),
        plants,
    }))
}

/// Create a collection owned by the caller
#[utoipa::path(
    post,
    path = "/collections",
    tag = "collections",
    request_body = CollectionCreate,
    responses(
        (status = 201, description = "Collection created", body = CollectionResponse),
        (status = 400, description = "Missing name"),
        (status = 403, description = "Only admins may create curated collections"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn create_collection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<CollectionCreate>,
) -> Result<(StatusCode, Json<CollectionResponse>), Error> {
    check_name(&create.name)?;
    if create.is_admin && !current_user.is_admin {
        return Err(only_admins_curate(Operation::CreateAll));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let collection = Collections::new(&mut conn)
        .create(&CollectionCreateDBRequest {
            name: create.name,
            description: create.description,
            is_published: create.is_published,
            is_admin: create.is_admin,
            owner_id: current_user.id,
        })
        .await?;

    tracing::info!(collection_id = %abbrev_uuid(&collection.id), "Created collection");
    Ok((StatusCode::CREATED, Json(collection.into())))
}

/// Update a collection
#[utoipa::path(
    patch,
    path = "/collections/{id}",
    tag = "collections",
    request_body = CollectionUpdate,
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Updated collection", body = CollectionResponse),
        (status = 400, description = "Invalid value"),
        (status = 403, description = "Not allowed to change this collection"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(collection_id = %abbrev_uuid(&id)))]
pub async fn update_collection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<CollectionId>,
    Json(update): Json<CollectionUpdate>,
) -> Result<Json<CollectionResponse>, Error> {
    if let Some(name) = &update.name {
        check_name(name)?;
    }
    if update.is_admin.is_some() && !current_user.is_admin {
        return Err(only_admins_curate(Operation::UpdateAll));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let collection = visible_collection(&mut conn, Some(&current_user), id).await?;
    permissions::require_modify_collection(&current_user, &collection, Operation::UpdateOwn)?;

    let collection = Collections::new(&mut conn)
        .update(id, &CollectionUpdateDBRequest::from(update))
        .await?;
    Ok(Json(collection.into()))
}

/// Delete a collection. Its plants are not affected.
#[utoipa::path(
    delete,
    path = "/collections/{id}",
    tag = "collections",
    params(("id" = uuid::Uuid, Path, description = "Collection ID")),
    responses(
        (status = 204, description = "Collection deleted"),
        (status = 403, description = "Not allowed to change this collection"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(collection_id = %abbrev_uuid(&id)))]
pub async fn delete_collection(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<CollectionId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let collection = visible_collection(&mut conn, Some(&current_user), id).await?;
    permissions::require_modify_collection(&current_user, &collection, Operation::DeleteOwn)?;

    if !Collections::new(&mut conn).delete(id).await? {
        return Err(not_found("Collection", id));
    }

    tracing::info!("Deleted collection");
    Ok(StatusCode::NO_CONTENT)
}

/// Add a plant to a collection. Adding a member again is a no-op.
#[utoipa::path(
    put,
    path = "/collections/{id}/plants/{plant_id}",
    tag = "collections",
    params(
        ("id" = uuid::Uuid, Path, description = "Collection ID"),
        ("plant_id" = uuid::Uuid, Path, description = "Plant ID"),
    ),
    responses(
        (status = 204, description = "Plant is a member"),
        (status = 403, description = "Not allowed to change this collection"),
        (status = 404, description = "Collection or plant not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(collection_id = %abbrev_uuid(&id), plant_id = %abbrev_uuid(&plant_id)))]
pub async fn add_collection_plant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((id, plant_id)): Path<(CollectionId, PlantId)>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let collection = visible_collection(&mut conn, Some(&current_user), id).await?;
    permissions::require_modify_collection(&current_user, &collection, Operation::UpdateOwn)?;
    visible_plant(&mut conn, Some(&current_user), plant_id).await?;

    let added = Collections::new(&mut conn).add_plant(id, plant_id).await?;
    tracing::debug!(added, "Collection membership ensured");
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a plant from a collection. Removing a non-member is a no-op.
#[utoipa::path(
    delete,
    path = "/collections/{id}/plants/{plant_id}",
    tag = "collections",
    params(
        ("id" = uuid::Uuid, Path, description = "Collection ID"),
        ("plant_id" = uuid::Uuid, Path, description = "Plant ID"),
    ),
    responses(
        (status = 204, description = "Plant is not a member"),
        (status = 403, description = "Not allowed to change this collection"),
        (status = 404, description = "Collection not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(collection_id = %abbrev_uuid(&id), plant_id = %abbrev_uuid(&plant_id)))]
pub async fn remove_collection_plant(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((id, plant_id)): Path<(CollectionId, PlantId)>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let collection = visible_collection(&mut conn, Some(&current_user), id).await?;
    permissions::require_modify_collection(&current_user, &collection, Operation::UpdateOwn)?;

    let removed = Collections::new(&mut conn).remove_plant(id, plant_id).await?;
    tracing::debug!(removed, "Collection membership removed");
    Ok(StatusCode::NO_CONTENT)
}
