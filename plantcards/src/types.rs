//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, PlantId, etc.)
//! - Permission and authorization types used in error reporting
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier
//! - [`PlantId`]: Plant record identifier
//! - [`PlantImageId`]: Stored plant image identifier
//! - [`CollectionId`]: Collection identifier
//! - [`SightingId`]: Sighting identifier
//! - [`StudySessionId`]: Flashcard or quiz session identifier
//!
//! # Permission System
//!
//! Access decisions live in [`crate::auth::permissions`]. The types here only describe a
//! decision so that [`crate::errors::Error::InsufficientPermissions`] can report it:
//!
//! - [`Resource`]: What entity type is being accessed
//! - [`Operation`]: What action is being performed, either on all entities (`*All`) or only on
//!   the caller's own (`*Own`)
//! - [`Permission`]: The requirement that was not met

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type PlantId = Uuid;
pub type PlantImageId = Uuid;
pub type CollectionId = Uuid;
pub type SightingId = Uuid;
pub type StudySessionId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Plants,
    PlantImages,
    Collections,
    Sightings,
    StudySessions,
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// The caller must own the resource instance
    Owner,
    /// Logical combinator
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_operation_display_collapses_scope() {
        assert_eq!(Operation::UpdateAll.to_string(), "update");
        assert_eq!(Operation::UpdateOwn.to_string(), "update");
        assert_eq!(Operation::DeleteOwn.to_string(), "delete");
    }
}
