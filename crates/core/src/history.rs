//! Rated-games history with optimistic removal.
//!
//! Ratings themselves live in the session-wide [`FeedbackBook`], which the
//! caller passes in, so a game re-rated on another screen and a row removed
//! here share one in-flight key.

use std::collections::HashMap;

use tracing::info;

use crate::{
    feedback::{FeedbackBook, FeedbackResolution, GestureOutcome},
    models::{Game, GameId, UserId},
    reconcile::Resolution,
};

/// The signed-in user's rated games.
#[derive(Debug, Clone, Default)]
pub struct HistoryView {
    games: Vec<Game>,
    // Rows hidden by a removal that has not settled yet, with their index.
    removed: HashMap<GameId, (usize, Game)>,
}

impl HistoryView {
    /// Empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows with a fresh `GET /user/history` answer.
    pub fn load(&mut self, book: &mut FeedbackBook, games: Vec<Game>) {
        self.games = games
            .into_iter()
            .filter(|game| !self.removed.contains_key(&game.game_id))
            .collect();
        book.track(&self.games);
        info!(rated = self.games.len(), "history loaded");
    }

    /// Visible rows.
    pub fn games(&self) -> &[Game] {
        &self.games
    }

    /// Row count.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// True when nothing is rated.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Delete a rating: the row disappears before the call settles.
    pub fn remove(
        &mut self,
        book: &mut FeedbackBook,
        user: Option<&UserId>,
        game_id: &GameId,
    ) -> GestureOutcome {
        let outcome = book.clear(user, game_id);
        if matches!(outcome, GestureOutcome::Submit(_)) {
            if let Some(index) = self.games.iter().position(|game| &game.game_id == game_id) {
                let game = self.games.remove(index);
                self.removed.insert(game_id.clone(), (index, game));
            }
        }
        outcome
    }

    /// Apply a settled rate, unrate or removal to the rows. The book must
    /// already have seen the resolution.
    pub fn resolve(&mut self, book: &mut FeedbackBook, resolution: &FeedbackResolution) {
        let game_id = &resolution.mutation().game_id;
        let hidden = self.removed.remove(game_id);
        match resolution {
            Resolution::Confirmed(mutation) => {
                // An undone rating leaves the rated list.
                if mutation.rating.is_none() {
                    self.games.retain(|game| &game.game_id != game_id);
                }
            }
            Resolution::Reconciled { snapshot, .. } => self.load(book, snapshot.clone()),
            Resolution::Unresolved { .. } => {
                if let Some((index, game)) = hidden {
                    let index = index.min(self.games.len());
                    self.games.insert(index, game);
                }
            }
        }
    }
}
