//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`auth`]: Registration, login, logout and OAuth
//! - [`collections`]: Collections and their member plants
//! - [`config`]: Public client configuration
//! - [`dashboard`]: Personal and admin statistics
//! - [`favorites`]: Per-user favorite plants
//! - [`plant_images`]: Image upload, primary selection and deletion
//! - [`plants`]: The plant catalog, its filters and publishing
//! - [`profiles`]: The caller's profile and admin user management
//! - [`sightings`]: Logged observations
//! - [`storage`]: Serving stored image files
//! - [`study`]: Flashcard and quiz sessions
//!
//! # Authentication
//!
//! Handlers take [`CurrentUser`] when a login is required and `Option<CurrentUser>` when anonymous
//! callers get a reduced view. See [`crate::auth::current_user`].
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which converts to the appropriate HTTP status code and
//! JSON error response.

use sqlx::PgConnection;

use crate::{
    api::models::users::CurrentUser,
    auth::permissions,
    db::{
        handlers::{Collections, Plants, Repository, Visibility},
        models::{collections::CollectionDBResponse, plants::PlantDBResponse},
    },
    errors::Error,
    types::{CollectionId, PlantId},
};

pub mod auth;
pub mod collections;
pub mod config;
pub mod dashboard;
pub mod favorites;
pub mod plant_images;
pub mod plants;
pub mod profiles;
pub mod sightings;
pub mod storage;
pub mod study;

/// Row visibility for an optional caller
pub(crate) fn visibility(user: Option<&CurrentUser>) -> Visibility {
    match user {
        Some(user) => Visibility::for_user(user.id, user.is_admin),
        None => Visibility::anonymous(),
    }
}

pub(crate) fn not_found(resource: &str, id: impl ToString) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

/// Load a plant the caller may see. Drafts owned by someone else look missing rather than forbidden.
pub(crate) async fn visible_plant(conn: &mut PgConnection, user: Option<&CurrentUser>, id: PlantId) -> Result<PlantDBResponse, Error> {
    match Plants::new(conn).get_by_id(id).await? {
        Some(plant) if permissions::can_view_plant(user, &plant) => Ok(plant),
        _ => Err(not_found("Plant", id)),
    }
}

pub(crate) async fn visible_collection(
    conn: &mut PgConnection,
    user: Option<&CurrentUser>,
    id: CollectionId,
) -> Result<CollectionDBResponse, Error> {
    match Collections::new(conn).get_by_id(id).await? {
        Some(collection) if permissions::can_view_collection(user, &collection) => Ok(collection),
        _ => Err(not_found("Collection", id)),
    }
}
