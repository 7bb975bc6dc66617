//! Postgres persistence for plantcards.
//!
//! - [`handlers`]: one repository per entity, each borrowing a `&mut PgConnection`
//! - [`models`]: row structs and create/update requests
//! - [`errors`]: [`errors::DbError`], mapped onto HTTP errors by the API layer
//!
//! A repository never owns a pool. Callers hand it whatever connection they hold, so the same
//! `Plants::new(&mut conn)` works on a pooled connection or inside an open transaction.
//!
//! # Locking
//!
//! Two invariants are kept with row locks rather than application checks:
//!
//! - A plant has at most one primary image. [`handlers::PlantImages`] opens its own transaction
//!   and takes `FOR UPDATE` on the plant row before changing which image is primary, so
//!   concurrent uploads and deletions queue behind each other.
//! - A study card is answered once. The answer handler locks the session with
//!   [`handlers::StudySessions::get_for_update`] before recording the answer and bumping the score.
//!   Deleting a plant takes the same locks through
//!   [`handlers::StudySessions::remove_plant_from_open`], in id order, before shrinking the decks
//!   it appears in.
//!
//! Migrations live in `migrations/` and run through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
