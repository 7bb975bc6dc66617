//! Dashboard endpoints: the caller's study progress, and catalog health for admins.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        dashboard::{AdminDashboardResponse, DashboardResponse, MissedPlant, StudyTotals},
        sightings::SightingResponse,
        study::SessionSummary,
        users::CurrentUser,
    },
    auth::permissions,
    db::handlers::{Dashboard, Repository, SightingFilter, Sightings, StudySessions},
    errors::Error,
    types::abbrev_uuid,
};

/// How many entries each "recent" and "most missed" list shows
const DASHBOARD_LIST_LEN: i64 = 5;

/// Get the caller's dashboard
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "dashboard",
    responses(
        (status = 200, description = "Study totals, weakest plants and recent activity", body = DashboardResponse),
        (status = 401, description = "Not logged in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn get_dashboard(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<DashboardResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut dashboard = Dashboard::new(&mut conn);
    let stats = dashboard.user_stats(current_user.id).await?;
    let most_missed = dashboard.most_missed(current_user.id, DASHBOARD_LIST_LEN).await?;

    let recent_sessions = StudySessions::new(&mut conn)
        .list_for_user(current_user.id, 0, DASHBOARD_LIST_LEN)
        .await?;
    let recent_sightings = Sightings::new(&mut conn)
        .list(&SightingFilter::new(current_user.id, 0, DASHBOARD_LIST_LEN))
        .await?;

    Ok(Json(DashboardResponse {
        study: StudyTotals::from(&stats),
        favorites_count: stats.favorites_count,
        sightings_count: stats.sightings_count,
        most_missed: most_missed.into_iter().map(MissedPlant::from).collect(),
        recent_sessions: recent_sessions.iter().map(SessionSummary::from).collect(),
        recent_sightings: recent_sightings.into_iter().map(SightingResponse::from).collect(),
    }))
}

/// Get catalog-wide statistics
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "dashboard",
    responses(
        (status = 200, description = "Catalog and usage totals", body = AdminDashboardResponse),
        (status = 403, description = "Not an admin"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&current_user.id)))]
pub async fn get_admin_dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<AdminDashboardResponse>, Error> {
    permissions::require_admin(&current_user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let stats = Dashboard::new(&mut conn).admin_stats().await?;

    Ok(Json(stats.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::models::dashboard::{AdminDashboardResponse, DashboardResponse};
    use crate::api::models::study::SessionResponse;
    use crate::test_utils::{add_auth_headers, create_test_admin_user, create_test_app, create_test_plant, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_dashboard_reflects_study_and_sightings(pool: PgPool) {
        let (app, _storage) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool).await;
        let auth = add_auth_headers(&user);
        let plant = create_test_plant(&pool, user.id, "Digitalis purpurea", "Foxglove", true).await;

        let empty: DashboardResponse = app.get("/api/v1/dashboard").add_header(&auth[0].0, &auth[0].1).await.json();
        assert_eq!(empty.study.sessions, 0);
        assert_eq!(empty.study.accuracy, 0.0);
        assert!(empty.most_missed.is_empty());

        let session: SessionResponse = app
            .post("/api/v1/study/sessions")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"mode": "flashcards"}))
            .await
            .json();
        app.post(&format!("/api/v1/study/sessions/{}/answers", session.session.id))
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"card_index": 0, "response": {"type": "self_assessed", "correct": false}}))
            .await
            .assert_status_ok();
        app.post("/api/v1/sightings")
            .add_header(&auth[0].0, &auth[0].1)
            .json(&json!({"plant_id": plant}))
            .await
            .assert_status(StatusCode::CREATED);
        app.put(&format!("/api/v1/favorites/{plant}"))
            .add_header(&auth[0].0, &auth[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let dashboard: DashboardResponse = app.get("/api/v1/dashboard").add_header(&auth[0].0, &auth[0].1).await.json();
        assert_eq!(dashboard.study.sessions, 1);
        assert_eq!(dashboard.study.finished_sessions, 1);
        assert_eq!(dashboard.study.answers, 1);
        assert_eq!(dashboard.study.correct, 0);
        assert_eq!(dashboard.favorites_count, 1);
        assert_eq!(dashboard.sightings_count, 1);
        assert_eq!(dashboard.most_missed[0].common_name, "Foxglove");
        assert_eq!(dashboard.recent_sessions.len(), 1);
        assert_eq!(dashboard.recent_sightings[0].plant_id, plant);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_dashboard_requires_admin(pool: PgPool) {
        let (app, _storage) = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let user = create_test_user(&pool).await;
        create_test_plant(&pool, admin.id, "Hedera helix", "Ivy", true).await;
        create_test_plant(&pool, admin.id, "Viscum album", "Mistletoe", false).await;

        let user_auth = add_auth_headers(&user);
        app.get("/api/v1/admin/dashboard")
            .add_header(&user_auth[0].0, &user_auth[0].1)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let admin_auth = add_auth_headers(&admin);
        let stats: AdminDashboardResponse = app
            .get("/api/v1/admin/dashboard")
            .add_header(&admin_auth[0].0, &admin_auth[0].1)
            .await
            .json();
        assert_eq!(stats.total_plants, 2);
        assert_eq!(stats.unpublished_plants, 1);
        assert_eq!(stats.plants_without_images, 2);
        // Includes the configured initial admin
        assert_eq!(stats.total_users, 3);
    }
}
