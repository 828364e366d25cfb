//! Like/dislike feedback: derived state, optimistic transitions, and
//! reconciliation against the backend's stored ratings.
//!
//! The authoritative value is the numeric `rating` the backend stores per
//! user and game. [`FeedbackBook`] keeps, per game, the last confirmed rating
//! and the rating currently shown. A gesture moves the shown rating
//! immediately and yields a [`Mutation`] for the caller to persist; while
//! that call is outstanding further gestures on the same game are coalesced.
//! When a call fails the book waits for a refetched snapshot of the user's
//! rated games and adopts it wholesale.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::{
    api::RecommenderApi,
    error::ApiResult,
    models::{Game, GameId, UserId},
    reconcile::{self, InFlight, MutationKey, Resolution},
};

/// Ratings at or above this value read as a like.
pub const LIKE_THRESHOLD: f64 = 4.0;
/// Rating sent for a like.
pub const LIKE_RATING: u8 = 5;
/// Rating sent for a dislike.
pub const DISLIKE_RATING: u8 = 1;

/// Derived per-game feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// No stored rating.
    Unrated,
    /// Rating >= 4.
    Liked,
    /// Rating < 4.
    Disliked,
}

impl Feedback {
    /// Derive from a stored rating.
    pub fn from_rating(rating: Option<f64>) -> Self {
        match rating {
            None => Feedback::Unrated,
            Some(value) if value >= LIKE_THRESHOLD => Feedback::Liked,
            Some(_) => Feedback::Disliked,
        }
    }

    /// Rating to persist for this state; `None` means delete.
    pub fn rating(self) -> Option<u8> {
        match self {
            Feedback::Unrated => None,
            Feedback::Liked => Some(LIKE_RATING),
            Feedback::Disliked => Some(DISLIKE_RATING),
        }
    }

    /// State after `gesture`: repeating the current gesture undoes it.
    pub fn after(self, gesture: Gesture) -> Self {
        match (self, gesture) {
            (Feedback::Liked, Gesture::Like) | (Feedback::Disliked, Gesture::Dislike) => {
                Feedback::Unrated
            }
            (_, Gesture::Like) => Feedback::Liked,
            (_, Gesture::Dislike) => Feedback::Disliked,
        }
    }

    /// Short badge text.
    pub fn label(self) -> &'static str {
        match self {
            Feedback::Unrated => "Unrated",
            Feedback::Liked => "Liked",
            Feedback::Disliked => "Disliked",
        }
    }
}

/// A user's rating gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Thumbs up.
    Like,
    /// Thumbs down.
    Dislike,
}

/// A rating change to persist. `rating == None` is a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Account the rating belongs to.
    pub user: UserId,
    /// Rated game.
    pub game_id: GameId,
    /// New rating, or `None` to remove it.
    pub rating: Option<u8>,
}

impl Mutation {
    fn key(&self) -> MutationKey {
        (self.user.clone(), self.game_id.clone())
    }
}

/// Result of offering a gesture to the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureOutcome {
    /// Nobody is signed in; nothing changed.
    LoginRequired,
    /// A call for this game is outstanding; the gesture was coalesced.
    Coalesced,
    /// Applied optimistically; persist this.
    Submit(Mutation),
}

/// Resolution of a feedback mutation; the snapshot is the user's full list
/// of rated games.
pub type FeedbackResolution = Resolution<Mutation, Vec<Game>>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    confirmed: Option<f64>,
    shown: Option<f64>,
}

/// Feedback for every game a view displays.
#[derive(Debug, Clone, Default)]
pub struct FeedbackBook {
    entries: HashMap<GameId, Entry>,
    in_flight: InFlight<MutationKey>,
}

impl FeedbackBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from freshly loaded games. Games with a call outstanding keep
    /// their optimistic value.
    pub fn track<'a>(&mut self, games: impl IntoIterator<Item = &'a Game>) {
        for game in games {
            if self.is_pending(&game.game_id) {
                continue;
            }
            self.entries.insert(
                game.game_id.clone(),
                Entry {
                    confirmed: game.rating,
                    shown: game.rating,
                },
            );
        }
    }

    /// Seed games this book has not seen yet; known ratings are kept. Used
    /// for records that may omit the viewer's rating, such as detail pages.
    pub fn track_new<'a>(&mut self, games: impl IntoIterator<Item = &'a Game>) {
        for game in games {
            self.entries
                .entry(game.game_id.clone())
                .or_insert(Entry {
                    confirmed: game.rating,
                    shown: game.rating,
                });
        }
    }

    /// Whether `game_id` is tracked.
    pub fn knows(&self, game_id: &GameId) -> bool {
        self.entries.contains_key(game_id)
    }

    /// Rating currently displayed for `game_id`.
    pub fn rating(&self, game_id: &GameId) -> Option<f64> {
        self.entries.get(game_id).and_then(|entry| entry.shown)
    }

    /// Feedback currently displayed for `game_id`.
    pub fn state(&self, game_id: &GameId) -> Feedback {
        Feedback::from_rating(self.rating(game_id))
    }

    /// Whether a call for `game_id` is outstanding.
    pub fn is_pending(&self, game_id: &GameId) -> bool {
        // One book serves one signed-in view, so the game alone identifies
        // the outstanding key.
        self.in_flight.iter().any(|(_, pending)| pending == game_id)
    }

    /// Number of outstanding calls.
    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Apply `gesture` optimistically and return the call to make.
    pub fn gesture(
        &mut self,
        user: Option<&UserId>,
        game_id: &GameId,
        gesture: Gesture,
    ) -> GestureOutcome {
        let next = self.state(game_id).after(gesture);
        self.begin(user, game_id, next.rating())
    }

    /// Optimistically clear the rating (history removal).
    pub fn clear(&mut self, user: Option<&UserId>, game_id: &GameId) -> GestureOutcome {
        self.begin(user, game_id, None)
    }

    fn begin(
        &mut self,
        user: Option<&UserId>,
        game_id: &GameId,
        rating: Option<u8>,
    ) -> GestureOutcome {
        let Some(user) = user else {
            return GestureOutcome::LoginRequired;
        };
        let mutation = Mutation {
            user: user.clone(),
            game_id: game_id.clone(),
            rating,
        };
        if !self.in_flight.try_begin(mutation.key()) {
            debug!(game_id = %game_id, "gesture coalesced with outstanding call");
            return GestureOutcome::Coalesced;
        }
        let entry = self.entries.entry(game_id.clone()).or_insert(Entry {
            confirmed: None,
            shown: None,
        });
        entry.shown = rating.map(f64::from);
        info!(game_id = %game_id, rating = ?rating, "optimistic feedback applied");
        GestureOutcome::Submit(mutation)
    }

    /// Fold a finished call back into the book.
    pub fn resolve(&mut self, resolution: &FeedbackResolution) {
        let mutation = resolution.mutation();
        self.in_flight.finish(&mutation.key());
        match resolution {
            Resolution::Confirmed(mutation) => {
                if let Some(entry) = self.entries.get_mut(&mutation.game_id) {
                    entry.confirmed = mutation.rating.map(f64::from);
                }
            }
            Resolution::Reconciled { snapshot, .. } => self.reconcile(snapshot),
            Resolution::Unresolved { mutation, .. } => {
                // No fresher server state is known; fall back to the last
                // confirmed rating.
                if let Some(entry) = self.entries.get_mut(&mutation.game_id) {
                    entry.shown = entry.confirmed;
                }
            }
        }
    }

    /// Adopt the authoritative list of rated games: every tracked game not
    /// in `rated` is unrated. Games with a call outstanding are left alone.
    pub fn reconcile(&mut self, rated: &[Game]) {
        let authoritative: HashMap<&GameId, Option<f64>> = rated
            .iter()
            .map(|game| (&game.game_id, game.rating))
            .collect();
        let pending: Vec<GameId> = self
            .entries
            .keys()
            .filter(|id| self.is_pending(id))
            .cloned()
            .collect();
        for (game_id, entry) in self.entries.iter_mut() {
            if pending.contains(game_id) {
                continue;
            }
            let rating = authoritative.get(game_id).copied().flatten();
            entry.confirmed = rating;
            entry.shown = rating;
        }
        info!(tracked = self.entries.len(), "feedback reconciled");
    }
}

/// Persists feedback mutations with a bounded timeout and refetches the
/// user's rated games when one fails.
#[derive(Clone)]
pub struct FeedbackReconciler {
    api: Arc<dyn RecommenderApi>,
    timeout: Duration,
}

impl FeedbackReconciler {
    /// New reconciler over `api`.
    pub fn new(api: Arc<dyn RecommenderApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// Submit (`/rate`) or delete (`/rate/delete`) depending on the rating.
    pub async fn persist(&self, mutation: &Mutation) -> ApiResult<()> {
        match mutation.rating {
            Some(rating) => {
                self.api
                    .rate(&mutation.user, &mutation.game_id, rating)
                    .await
            }
            None => self.api.unrate(&mutation.user, &mutation.game_id).await,
        }
    }

    /// Persist `mutation`, refetching authoritative ratings on failure.
    pub async fn run(&self, mutation: Mutation) -> FeedbackResolution {
        let persist_target = mutation.clone();
        let user = mutation.user.clone();
        reconcile::resolve(
            mutation,
            self.timeout,
            async move { self.persist(&persist_target).await },
            || async move { self.api.history(&user).await },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::testing::{Call, FakeApi},
        error::ApiError,
    };

    fn rated(id: i64, rating: Option<f64>) -> Game {
        let mut game = Game::new(id, format!("Game {id}"));
        game.rating = rating;
        game
    }

    fn ana() -> UserId {
        UserId::new("ana")
    }

    fn submitted(outcome: GestureOutcome) -> Mutation {
        match outcome {
            GestureOutcome::Submit(mutation) => mutation,
            other => panic!("expected a submission, got {other:?}"),
        }
    }

    #[test]
    fn derivation_follows_threshold() {
        assert_eq!(Feedback::from_rating(None), Feedback::Unrated);
        assert_eq!(Feedback::from_rating(Some(5.0)), Feedback::Liked);
        assert_eq!(Feedback::from_rating(Some(4.0)), Feedback::Liked);
        assert_eq!(Feedback::from_rating(Some(3.9)), Feedback::Disliked);
        assert_eq!(Feedback::from_rating(Some(1.0)), Feedback::Disliked);
        assert_eq!(Feedback::from_rating(Some(0.0)), Feedback::Disliked);
    }

    #[test]
    fn gestures_toggle() {
        assert_eq!(Feedback::Unrated.after(Gesture::Like), Feedback::Liked);
        assert_eq!(Feedback::Liked.after(Gesture::Like), Feedback::Unrated);
        assert_eq!(Feedback::Disliked.after(Gesture::Like), Feedback::Liked);
        assert_eq!(Feedback::Liked.after(Gesture::Dislike), Feedback::Disliked);
        assert_eq!(Feedback::Disliked.after(Gesture::Dislike), Feedback::Unrated);
        assert_eq!(Feedback::Liked.rating(), Some(5));
        assert_eq!(Feedback::Disliked.rating(), Some(1));
        assert_eq!(Feedback::Unrated.rating(), None);
    }

    #[test]
    fn guests_are_asked_to_log_in() {
        let mut book = FeedbackBook::new();
        book.track(&[rated(1, None)]);
        let outcome = book.gesture(None, &GameId::Numeric(1), Gesture::Like);
        assert_eq!(outcome, GestureOutcome::LoginRequired);
        assert_eq!(book.state(&GameId::Numeric(1)), Feedback::Unrated);
        assert_eq!(book.pending_count(), 0);
    }

    #[test]
    fn repeated_gesture_while_outstanding_is_coalesced() {
        let user = ana();
        let id = GameId::Numeric(1);
        let mut book = FeedbackBook::new();
        book.track(&[rated(1, None)]);

        let first = submitted(book.gesture(Some(&user), &id, Gesture::Dislike));
        assert_eq!(first.rating, Some(DISLIKE_RATING));
        assert_eq!(book.state(&id), Feedback::Disliked);

        assert_eq!(
            book.gesture(Some(&user), &id, Gesture::Dislike),
            GestureOutcome::Coalesced
        );
        assert_eq!(book.state(&id), Feedback::Disliked);

        // Another game is independent.
        submitted(book.gesture(Some(&user), &GameId::Numeric(2), Gesture::Like));
        assert_eq!(book.pending_count(), 2);
    }

    #[test]
    fn reconcile_skips_outstanding_games() {
        let user = ana();
        let mut book = FeedbackBook::new();
        book.track(&[rated(1, None), rated(2, Some(5.0)), rated(3, Some(2.0))]);
        submitted(book.gesture(Some(&user), &GameId::Numeric(1), Gesture::Like));

        book.reconcile(&[rated(3, Some(4.0))]);
        assert_eq!(book.state(&GameId::Numeric(1)), Feedback::Liked);
        assert_eq!(book.state(&GameId::Numeric(2)), Feedback::Unrated);
        assert_eq!(book.state(&GameId::Numeric(3)), Feedback::Liked);
    }

    #[test]
    fn track_new_keeps_known_ratings() {
        let mut book = FeedbackBook::new();
        book.track(&[rated(1, Some(5.0))]);
        book.track_new(&[rated(1, None), rated(2, Some(1.0))]);
        assert_eq!(book.state(&GameId::Numeric(1)), Feedback::Liked);
        assert_eq!(book.state(&GameId::Numeric(2)), Feedback::Disliked);
        assert!(book.knows(&GameId::Numeric(2)));
        assert!(!book.knows(&GameId::Numeric(3)));
    }

    #[tokio::test]
    async fn like_twice_toggles_with_two_calls() {
        let api = Arc::new(FakeApi::with_catalog(vec![rated(1, None)]));
        let reconciler = FeedbackReconciler::new(api.clone(), Duration::from_secs(5));
        let user = ana();
        let id = GameId::Numeric(1);
        let mut book = FeedbackBook::new();
        book.track(&[rated(1, None)]);

        let like = submitted(book.gesture(Some(&user), &id, Gesture::Like));
        let resolution = reconciler.run(like).await;
        assert!(resolution.is_confirmed());
        book.resolve(&resolution);
        assert_eq!(book.state(&id), Feedback::Liked);

        let undo = submitted(book.gesture(Some(&user), &id, Gesture::Like));
        assert_eq!(undo.rating, None);
        book.resolve(&reconciler.run(undo).await);
        assert_eq!(book.state(&id), Feedback::Unrated);

        assert_eq!(
            api.mutation_calls(),
            vec![Call::Rate(id.clone(), LIKE_RATING), Call::Unrate(id.clone())]
        );
        assert_eq!(api.rating(&id), None);
    }

    #[tokio::test]
    async fn rapid_dislikes_fire_one_call_until_settled() {
        let api = Arc::new(FakeApi::with_catalog(vec![rated(1, None)]).gated());
        let reconciler = FeedbackReconciler::new(api.clone(), Duration::from_secs(5));
        let user = ana();
        let id = GameId::Numeric(1);
        let mut book = FeedbackBook::new();
        book.track(&[rated(1, None)]);

        let first = submitted(book.gesture(Some(&user), &id, Gesture::Dislike));
        let task = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.run(first).await })
        };
        while api.mutation_calls().is_empty() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            book.gesture(Some(&user), &id, Gesture::Dislike),
            GestureOutcome::Coalesced
        );
        assert_eq!(api.mutation_calls(), vec![Call::Rate(id.clone(), DISLIKE_RATING)]);

        api.release(1);
        let resolution = task.await.expect("task panicked");
        book.resolve(&resolution);
        assert_eq!(book.state(&id), Feedback::Disliked);
        assert_eq!(book.pending_count(), 0);
        assert_eq!(api.mutation_calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_submit_reconverges_on_server_value() {
        let api = Arc::new(FakeApi::with_catalog(vec![rated(1, None)]));
        // Rated 2 elsewhere since this view loaded.
        api.set_rating(1, 2.0);
        api.fail("rate", ApiError::Rejected {
            status: 500,
            message: "boom".to_string(),
        });
        let reconciler = FeedbackReconciler::new(api.clone(), Duration::from_secs(5));
        let user = ana();
        let id = GameId::Numeric(1);
        let mut book = FeedbackBook::new();
        book.track(&[rated(1, None)]);

        let like = submitted(book.gesture(Some(&user), &id, Gesture::Like));
        assert_eq!(book.state(&id), Feedback::Liked);

        let resolution = reconciler.run(like).await;
        assert!(matches!(resolution, Resolution::Reconciled { .. }));
        book.resolve(&resolution);

        assert_eq!(book.rating(&id), Some(2.0));
        assert_eq!(book.state(&id), Feedback::Disliked);
        assert_eq!(api.calls().last(), Some(&Call::History));
    }

    #[tokio::test]
    async fn failed_undo_also_refetches() {
        let api = Arc::new(FakeApi::with_catalog(vec![rated(1, Some(5.0))]));
        api.set_rating(1, 5.0);
        api.fail("unrate", ApiError::Network("reset".to_string()));
        let reconciler = FeedbackReconciler::new(api.clone(), Duration::from_secs(5));
        let user = ana();
        let id = GameId::Numeric(1);
        let mut book = FeedbackBook::new();
        book.track(&[rated(1, Some(5.0))]);

        let undo = submitted(book.gesture(Some(&user), &id, Gesture::Like));
        assert_eq!(book.state(&id), Feedback::Unrated);
        book.resolve(&reconciler.run(undo).await);
        assert_eq!(book.state(&id), Feedback::Liked);
    }

    #[tokio::test]
    async fn unresolved_failure_restores_last_confirmed() {
        let api = Arc::new(FakeApi::with_catalog(vec![rated(1, Some(1.0))]));
        api.fail("rate", ApiError::Network("down".to_string()));
        api.fail("history", ApiError::Network("down".to_string()));
        let reconciler = FeedbackReconciler::new(api.clone(), Duration::from_secs(5));
        let user = ana();
        let id = GameId::Numeric(1);
        let mut book = FeedbackBook::new();
        book.track(&[rated(1, Some(1.0))]);

        let like = submitted(book.gesture(Some(&user), &id, Gesture::Like));
        let resolution = reconciler.run(like).await;
        assert!(matches!(resolution, Resolution::Unresolved { .. }));
        book.resolve(&resolution);
        assert_eq!(book.state(&id), Feedback::Disliked);
        assert_eq!(book.pending_count(), 0);
    }
}
