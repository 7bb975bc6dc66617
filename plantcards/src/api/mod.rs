//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): Registration, login, logout and OAuth sign-in
//! - **Profile** (`/api/v1/profile`): The caller's display preferences
//! - **Plants** (`/api/v1/plants/*`): The catalog, publishing, and plant images
//! - **Collections** (`/api/v1/collections/*`): Named sets of plants
//! - **Favorites & Sightings** (`/api/v1/favorites/*`, `/api/v1/sightings/*`): Per-user records
//! - **Study** (`/api/v1/study/sessions/*`): Flashcard and quiz sessions
//! - **Dashboards** (`/api/v1/dashboard`, `/api/v1/admin/dashboard`)
//! - **Admin** (`/api/v1/admin/users/*`): User management
//! - **Storage** (`/storage/*`): Stored image files
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/api/docs` when the server is running.

pub mod handlers;
pub mod models;
