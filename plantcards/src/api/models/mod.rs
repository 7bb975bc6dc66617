//! API request and response data models.
//!
//! This module contains the data structures used for HTTP request deserialization
//! and response serialization. These models define the public API contract.
//!
//! # Design Principles
//!
//! - **Separation of Concerns**: API models are distinct from database models,
//!   allowing independent evolution of API and storage representations
//! - **Validation**: Input checks that go beyond deserialization (non-empty names, timestamps
//!   not in the future) happen in the conversions to database requests
//! - **OpenAPI**: All models are annotated with `utoipa` for automatic API docs
//!
//! # Model Categories
//!
//! ## Catalog
//!
//! - [`plants`]: Plant records, list queries and summaries
//! - [`plant_images`]: Stored images and multipart upload reports
//! - [`collections`]: Collections and their member plants
//!
//! ## Per-user activity
//!
//! - [`sightings`]: Logged observations
//! - [`study`]: Flashcard and quiz sessions, cards and answers
//! - [`dashboard`]: Aggregated statistics
//! - [`profiles`]: Display preferences
//!
//! ## Accounts
//!
//! - [`users`]: Accounts and the authenticated caller
//! - [`auth`]: Login, registration and OAuth payloads
//! - [`config`]: Public client configuration
//!
//! # Example
//!
//! ```ignore
//! use plantcards::api::models::plants::{PlantCreate, PlantSummary};
//!
//! // Deserialize from JSON
//! let create_req: PlantCreate = serde_json::from_str(json_str)?;
//!
//! // Serialize to JSON
//! let json = serde_json::to_string(&summary)?;
//! ```

pub mod auth;
pub mod collections;
pub mod config;
pub mod dashboard;
pub mod pagination;
pub mod plant_images;
pub mod plants;
pub mod profiles;
pub mod sightings;
pub mod study;
pub mod users;
