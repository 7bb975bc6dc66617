//! Flashcard and quiz logic that does not touch the database.
//!
//! - [`deck`]: seeded shuffling and deck sizing
//! - [`quiz`]: deterministic multiple-choice options per card
//! - [`answer`]: typed-guess normalisation and matching
//! - [`scoring`]: accuracy and streak tracking

pub mod answer;
pub mod deck;
pub mod quiz;
pub mod scoring;
