//! Base repository trait for database operations.

use std::collections::HashMap;

use crate::db::errors::Result;
use crate::types::UserId;

/// A data access layer for one table (plus whatever it joins for its responses).
///
/// Create and update requests, responses, ids and list filters are separate associated types so
/// that each repository can expose exactly the shape its callers need.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The request type for updating entities
    type UpdateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Get lots of entities by their IDs, keyed by ID. Missing IDs are simply absent.
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Returns whether a row was deleted
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Fails with [`crate::db::errors::DbError::NotFound`] when the entity does not exist
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}

/// Which rows a caller may see in tables with an owner and a published flag: admins see
/// everything, everyone else sees published rows plus their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct Visibility {
    pub viewer: Option<UserId>,
    pub is_admin: bool,
}

impl Visibility {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(viewer: UserId, is_admin: bool) -> Self {
        Self {
            viewer: Some(viewer),
            is_admin,
        }
    }
}
