//! Repository implementations for database access.
//!
//! This module provides repository structs for each major entity in the system.
//! Repositories that map onto a single owned table implement the [`Repository`] trait; the rest
//! (join tables, aggregates, single-use tokens) expose just the methods their callers need.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed operations returning models from [`crate::db::models`]
//! - Handles query construction and parameter binding
//! - Opens its own nested transaction when an operation needs several statements to be atomic
//!
//! # Available Repositories
//!
//! - [`Users`]: User accounts, each created together with its profile
//! - [`Profiles`]: Display preferences and the admin flag
//! - [`Plants`]: The plant catalog
//! - [`PlantImages`]: Stored images and the primary-image invariant
//! - [`Collections`]: Collections and their member plants
//! - [`Favorites`]: Per-user favorite plants
//! - [`Sightings`]: Logged observations
//! - [`StudySessions`] and [`FlashcardAnswers`]: Study decks and their answers
//! - [`Dashboard`]: Aggregate statistics
//! - [`OAuthStates`]: Pending OAuth authorization flows
//! - [`file_storage`]: Image bytes, kept outside the database
//!
//! # Common Pattern
//!
//! ```ignore
//! use plantcards::db::handlers::{Plants, Repository, Visibility};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let plants = Plants::new(&mut conn).list(&Visibility::anonymous()).await?;
//!     println!("{} published plants", plants.len());
//!     Ok(())
//! }
//! ```

pub mod collections;
pub mod dashboard;
pub mod favorites;
pub mod file_storage;
pub mod oauth_states;
pub mod plant_images;
pub mod plants;
pub mod profiles;
pub mod repository;
pub mod sightings;
pub mod study;
pub mod users;

pub use collections::Collections;
pub use dashboard::Dashboard;
pub use favorites::Favorites;
pub use oauth_states::OAuthStates;
pub use plant_images::PlantImages;
pub use plants::Plants;
pub use profiles::Profiles;
pub use repository::{Repository, Visibility};
pub use sightings::{SightingFilter, Sightings};
pub use study::{FlashcardAnswers, StudySessions};
pub use users::{UserFilter, Users};
