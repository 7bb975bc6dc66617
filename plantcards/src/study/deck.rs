//! Deck construction: a seeded shuffle of candidate plants cut to the requested size.

use rand::prelude::{RngExt, SliceRandom};
use rand::rngs::StdRng;
use rand::{SeedableRng, rng};

use crate::types::PlantId;

/// Fresh random seed for a new session
pub fn new_seed() -> u64 {
    rng().random()
}

/// Shuffle `items` deterministically for `seed`
pub fn shuffled<T>(mut items: Vec<T>, seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    items
}

/// Number of cards to deal: the explicit request, else the profile default, never more than
/// the server maximum and never fewer than one.
pub fn resolve_card_count(requested: Option<u32>, profile_default: i32, max: u32) -> usize {
    let wanted = requested.unwrap_or(profile_default.max(1) as u32);
    wanted.clamp(1, max.max(1)) as usize
}

/// Shuffle the candidates and keep the first `card_count`. Duplicate ids are dropped first so a
/// plant appears at most once per deck.
pub fn build_deck(mut candidates: Vec<PlantId>, seed: u64, card_count: usize) -> Vec<PlantId> {
    candidates.sort_unstable();
    candidates.dedup();

    let mut deck = shuffled(candidates, seed);
    deck.truncate(card_count);
    deck
}
