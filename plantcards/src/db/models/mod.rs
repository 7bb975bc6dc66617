//! Database record structures.
//!
//! `*CreateDBRequest` / `*UpdateDBRequest` types are the inputs of repository methods and
//! `*DBResponse` types are the rows they return. API handlers convert these to and from
//! [`crate::api::models`].

pub mod collections;
pub mod dashboard;
pub mod file_storage;
pub mod oauth_states;
pub mod plant_images;
pub mod plants;
pub mod profiles;
pub mod sightings;
pub mod study;
pub mod users;
