//! Multiple-choice generation for quiz cards.
//!
//! Choices are recomputed on every read, so they must depend only on the session seed, the card
//! index and the candidate lists. Distractors come from the session's own deck first, since those
//! are the plants the user is studying, and only fall back to the wider catalog when the deck is
//! too small.

use crate::study::deck::shuffled;
use crate::types::PlantId;

const INDEX_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed for one card, derived from the session seed
fn card_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(INDEX_MIX)
}

/// Up to `count` plant ids for the card at `index`, always including `correct`, in a shuffled
/// order that is stable for a given seed and index.
pub fn choices_for_card(
    correct: PlantId,
    index: usize,
    seed: u64,
    deck: &[PlantId],
    catalog: &[PlantId],
    count: usize,
) -> Vec<PlantId> {
    let seed = card_seed(seed, index);
    let wanted = count.saturating_sub(1);

    let mut picked: Vec<PlantId> = Vec::with_capacity(count);
    for pool in [deck, catalog] {
        if picked.len() >= wanted {
            break;
        }
        let mut candidates: Vec<PlantId> = pool
            .iter()
            .copied()
            .filter(|id| *id != correct && !picked.contains(id))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        let needed = wanted - picked.len();
        picked.extend(shuffled(candidates, seed).into_iter().take(needed));
    }

    picked.push(correct);
    shuffled(picked, seed.rotate_left(17))
}
