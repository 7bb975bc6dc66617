//! HTTP handlers for the caller's favorite plants.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::visible_plant,
        models::{plants::PlantSummary, users::CurrentUser},
    },
    auth::permissions,
    db::handlers::{Favorites, Plants, Repository},
    errors::Error,
    types::{PlantId, abbrev_uuid},
};

/// List the caller's favorite plants
///
/// Favorites that have since become invisible to the caller (an unpublished plant they do not
/// own) are left out.
#[utoipa::path(
    get,
    path = "/favorites",
    tag = "favorites",
    responses(
        (status = 200, description = "Favorite plants by name", body = Vec<PlantSummary>),
        (status = 401, description = "Not logged in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn list_favorites(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<PlantSummary>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let ids = Favorites::new(&mut conn).plant_ids(current_user.id).await?;
    let plants = Plants::new(&mut conn).get_bulk(ids.into_iter().collect()).await?;

    let mut favorites: Vec<_> = plants
        .into_values()
        .filter(|plant| permissions::can_view_plant(Some(&current_user), plant))
        .collect();
    favorites.sort_by(|a, b| {
        a.common_name
            .to_lowercase()
            .cmp(&b.common_name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });

    Ok(Json(
        favorites
            .into_iter()
            .map(|plant| PlantSummary::new(plant, true, &state.config.storage))
            .collect(),
    ))
}

/// Favorite a plant. Favoriting twice is a no-op.
#[utoipa::path(
    put,
    path = "/favorites/{plant_id}",
    tag = "favorites",
    params(("plant_id" = uuid::Uuid, Path, description = "Plant ID")),
    responses(
        (status = 204, description = "Plant is a favorite"),
        (status = 404, description = "Plant not found or not visible"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&plant_id)))]
pub async fn add_favorite(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(plant_id): Path<PlantId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    visible_plant(&mut conn, Some(&current_user), plant_id).await?;
    Favorites::new(&mut conn).add(current_user.id, plant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Unfavorite a plant. Removing a plant that is not a favorite is a no-op.
#[utoipa::path(
    delete,
    path = "/favorites/{plant_id}",
    tag = "favorites",
    params(("plant_id" = uuid::Uuid, Path, description = "Plant ID")),
    responses(
        (status = 204, description = "Plant is not a favorite"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(plant_id = %abbrev_uuid(&plant_id)))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(plant_id): Path<PlantId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Favorites::new(&mut conn).remove(current_user.id, plant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::{pagination::PaginatedResponse, plants::PlantSummary};
    use crate::test_utils::{add_auth_headers, create_test_admin_user, create_test_app, create_test_plant, create_test_user};
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_favorites_are_idempotent_and_flagged(pool: PgPool) {
        let (app, _storage) = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let user = create_test_user(&pool).await;
        let auth = add_auth_headers(&user);
        let rose = create_test_plant(&pool, admin.id, "Rosa canina", "Dog rose", true).await;
        let ash = create_test_plant(&pool, admin.id, "Fraxinus excelsior", "Ash", true).await;
        let hidden = create_test_plant(&pool, admin.id, "Taxus baccata", "Yew", false).await;

        for plant in [rose, rose, ash] {
            app.put(&format!("/api/v1/favorites/{plant}"))
                .add_header(&auth[0].0, &auth[0].1)
                .await
                .assert_status(StatusCode::NO_CONTENT);
        }
        app.put(&format!("/api/v1/favorites/{hidden}"))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let favorites: Vec<PlantSummary> = app.get("/api/v1/favorites").add_header(&auth[0].0, &auth[0].1).await.json();
        let names: Vec<_> = favorites.iter().map(|p| p.common_name.as_str()).collect();
        assert_eq!(names, vec!["Ash", "Dog rose"]);
        assert!(favorites.iter().all(|p| p.is_favorite));

        let page: PaginatedResponse<PlantSummary> = app
            .get("/api/v1/plants")
            .add_header(&auth[0].0, &auth[0].1)
            .add_query_param("favorites_only", "true")
            .await
            .json();
        assert_eq!(page.total_count, 2);

        for _ in 0..2 {
            app.delete(&format!("/api/v1/favorites/{rose}"))
                .add_header(&auth[0].0, &auth[0].1)
                .await
                .assert_status(StatusCode::NO_CONTENT);
        }

        let favorites: Vec<PlantSummary> = app.get("/api/v1/favorites").add_header(&auth[0].0, &auth[0].1).await.json();
        assert_eq!(favorites.len(), 1);

        app.get("/api/v1/favorites").await.assert_status(StatusCode::UNAUTHORIZED);
    }
}
