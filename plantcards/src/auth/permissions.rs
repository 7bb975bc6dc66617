//! Access decisions for plants, collections and admin-only endpoints.
//!
//! Admins may do anything. Everyone else may see published content plus what they own, and may
//! only change what they own. Admin-flagged collections are curated by admins only, even when a
//! regular user created them before losing the flag.

use crate::{
    api::models::users::CurrentUser,
    db::models::{collections::CollectionDBResponse, plants::PlantDBResponse},
    errors::Error,
    types::{Operation, Permission, Resource},
};

fn is_owner(user: Option<&CurrentUser>, owner: Option<crate::types::UserId>) -> bool {
    matches!((user, owner), (Some(user), Some(owner)) if user.id == owner)
}

fn denied(resource: Resource, action: Operation, description: &str) -> Error {
    Error::InsufficientPermissions {
        required: Permission::Any(vec![Permission::Allow(resource, action), Permission::Owner]),
        action,
        resource: description.to_string(),
    }
}

/// Admin-only endpoints
pub fn require_admin(user: &CurrentUser) -> Result<(), Error> {
    if user.is_admin {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Users, Operation::UpdateAll),
            action: Operation::ReadAll,
            resource: "admin resource".to_string(),
        })
    }
}

/// Published plants are public; drafts are visible to their owner and admins
pub fn can_view_plant(user: Option<&CurrentUser>, plant: &PlantDBResponse) -> bool {
    plant.is_published || user.is_some_and(|u| u.is_admin) || is_owner(user, plant.created_by)
}

pub fn can_modify_plant(user: &CurrentUser, plant: &PlantDBResponse) -> bool {
    user.is_admin || is_owner(Some(user), plant.created_by)
}

pub fn require_modify_plant(user: &CurrentUser, plant: &PlantDBResponse, action: Operation) -> Result<(), Error> {
    if can_modify_plant(user, plant) {
        Ok(())
    } else {
        Err(denied(Resource::Plants, action, &format!("plant {}", plant.id)))
    }
}

pub fn can_view_collection(user: Option<&CurrentUser>, collection: &CollectionDBResponse) -> bool {
    collection.is_published || user.is_some_and(|u| u.is_admin) || is_owner(user, collection.owner_id)
}

pub fn can_modify_collection(user: &CurrentUser, collection: &CollectionDBResponse) -> bool {
    if user.is_admin {
        return true;
    }
    !collection.is_admin && is_owner(Some(user), collection.owner_id)
}

pub fn require_modify_collection(
    user: &CurrentUser,
    collection: &CollectionDBResponse,
    action: Operation,
) -> Result<(), Error> {
    if can_modify_collection(user, collection) {
        Ok(())
    } else {
        Err(denied(Resource::Collections, action, &format!("collection {}", collection.id)))
    }
}
