//! Running score for a study session.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Percentage of `correct` out of `answered`, rounded to one decimal. Zero when nothing was answered.
pub fn accuracy_percent(correct: u32, answered: u32) -> f64 {
    if answered == 0 {
        return 0.0;
    }
    let percent = f64::from(correct) * 100.0 / f64::from(answered);
    (percent * 10.0).round() / 10.0
}

/// Score kept while cards are answered. Pure; persistence is the caller's business.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Scoreboard {
    pub correct: u32,
    pub answered: u32,
    /// Consecutive correct answers ending at the latest one
    pub streak: u32,
    pub best_streak: u32,
}

impl Scoreboard {
    /// Rebuild a scoreboard from answers in the order they were given
    pub fn from_results(results: impl IntoIterator<Item = bool>) -> Self {
        let mut board = Self::default();
        for correct in results {
            board.record(correct);
        }
        board
    }

    pub fn record(&mut self, correct: bool) {
        self.answered += 1;
        if correct {
            self.correct += 1;
            self.streak += 1;
            self.best_streak = self.best_streak.max(self.streak);
        } else {
            self.streak = 0;
        }
    }

    pub fn accuracy(&self) -> f64 {
        accuracy_percent(self.correct, self.answered)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
