//! Game detail screen loads.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{
    api::RecommenderApi,
    error::ApiResult,
    feedback::FeedbackBook,
    models::{Game, GameDetail, GameId, LibraryEntry, UserId},
    recommend::{similar_games, ScoredGame},
};

/// The detail panels. `library` and `rated` are `None` for guests.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailData {
    /// Extended record.
    pub detail: ApiResult<GameDetail>,
    /// "More like this".
    pub similar: ApiResult<Vec<ScoredGame>>,
    /// The viewer's library, used for the status chooser.
    pub library: Option<ApiResult<Vec<LibraryEntry>>>,
    /// The viewer's rated games. Detail and similar payloads carry no
    /// per-user rating, so this is where the shown feedback comes from.
    pub rated: Option<ApiResult<Vec<Game>>>,
}

impl DetailData {
    /// Games displayed by the detail and similar panels.
    pub fn shown_games(&self) -> impl Iterator<Item = &Game> {
        self.detail
            .iter()
            .map(|detail| &detail.game)
            .chain(self.similar.iter().flatten().map(|scored| &scored.game))
    }

    /// Bring `book` in line with the server for every game on screen.
    /// Without a rated list (guest, or the fetch failed) only unknown games
    /// are seeded.
    pub fn seed_feedback(&self, book: &mut FeedbackBook) {
        let Some(Ok(rated)) = &self.rated else {
            book.track_new(self.shown_games());
            return;
        };
        let ratings: HashMap<&GameId, Option<f64>> = rated
            .iter()
            .map(|game| (&game.game_id, game.rating))
            .collect();
        let shown: Vec<Game> = self
            .shown_games()
            .map(|game| {
                let mut game = game.clone();
                game.rating = ratings.get(&game.game_id).copied().flatten();
                game
            })
            .collect();
        book.track(rated);
        book.track(&shown);
    }
}

/// Load every panel concurrently; failures stay confined to their panel.
pub async fn load_detail(
    api: &dyn RecommenderApi,
    user: Option<&UserId>,
    game_id: &GameId,
) -> DetailData {
    let library = async {
        match user {
            Some(user) => Some(api.library(user).await),
            None => None,
        }
    };
    let rated = async {
        match user {
            Some(user) => Some(api.history(user).await),
            None => None,
        }
    };
    let (detail, similar, library, rated) = tokio::join!(
        api.game_detail(game_id),
        similar_games(api, game_id),
        library,
        rated
    );
    if let Some(Err(err)) = &rated {
        warn!(game_id = %game_id, %err, "rated games unavailable for detail");
    }
    if let Err(err) = &detail {
        warn!(game_id = %game_id, %err, "detail unavailable");
    }
    if let Err(err) = &similar {
        warn!(game_id = %game_id, %err, "similar games unavailable");
    }
    debug!(game_id = %game_id, signed_in = user.is_some(), "detail panels loaded");
    DetailData {
        detail,
        similar,
        library,
        rated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::testing::{Call, FakeApi},
        error::ApiError,
        feedback::{Feedback, Gesture, GestureOutcome},
        models::LibraryStatus,
    };

    fn catalog() -> Vec<Game> {
        vec![Game::new(1, "Celeste"), Game::new(2, "Hades"), Game::new(3, "Inside")]
    }

    #[tokio::test]
    async fn guests_skip_the_library_panel() {
        let api = FakeApi::with_catalog(catalog());
        let data = load_detail(&api, None, &GameId::Numeric(2)).await;
        assert_eq!(data.detail.map(|d| d.game.title), Ok("Hades".to_string()));
        assert_eq!(data.similar.map(|games| games.len()), Ok(2));
        assert!(data.library.is_none());
        assert!(data.rated.is_none());
        assert!(!api.calls().contains(&Call::Library));
        assert!(!api.calls().contains(&Call::History));
    }

    #[tokio::test]
    async fn failed_similar_panel_degrades_alone() {
        let api = FakeApi::with_catalog(catalog());
        api.set_library(vec![LibraryEntry {
            game_id: GameId::Numeric(1),
            status: LibraryStatus::Playing,
            date: None,
            title: None,
            image: None,
        }]);
        api.fail("similar", ApiError::Network("reset".to_string()));
        let data = load_detail(&api, Some(&UserId::new("ana")), &GameId::Numeric(1)).await;
        assert!(data.detail.is_ok());
        assert_eq!(data.similar, Err(ApiError::Network("reset".to_string())));
        let library = data.library.expect("signed-in viewers load the library");
        assert_eq!(library.map(|entries| entries.len()), Ok(1));
    }

    #[tokio::test]
    async fn unknown_game_is_a_rejection() {
        let api = FakeApi::with_catalog(catalog());
        let data = load_detail(&api, None, &GameId::Numeric(99)).await;
        assert!(matches!(
            data.detail,
            Err(ApiError::Rejected { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn server_rating_shows_on_detail_and_undo_deletes_it() {
        let api = FakeApi::with_catalog(catalog());
        api.set_rating(1, 1.0);
        let user = UserId::new("ana");
        let mut book = FeedbackBook::new();

        let data = load_detail(&api, Some(&user), &GameId::Numeric(1)).await;
        data.seed_feedback(&mut book);
        assert_eq!(book.state(&GameId::Numeric(1)), Feedback::Disliked);
        assert_eq!(book.state(&GameId::Numeric(2)), Feedback::Unrated);

        let outcome = book.gesture(Some(&user), &GameId::Numeric(1), Gesture::Dislike);
        let GestureOutcome::Submit(mutation) = outcome else {
            panic!("expected a submission, got {outcome:?}");
        };
        assert_eq!(mutation.rating, None);
        assert_eq!(book.state(&GameId::Numeric(1)), Feedback::Unrated);
    }

    #[tokio::test]
    async fn stale_rating_is_replaced_by_the_server_list() {
        let api = FakeApi::with_catalog(catalog());
        let user = UserId::new("ana");
        let mut book = FeedbackBook::new();
        let mut liked = Game::new(3, "Inside");
        liked.rating = Some(5.0);
        book.track([&liked]);

        // Unrated elsewhere since the book last saw it.
        let data = load_detail(&api, Some(&user), &GameId::Numeric(3)).await;
        data.seed_feedback(&mut book);
        assert_eq!(book.state(&GameId::Numeric(3)), Feedback::Unrated);
    }

    #[tokio::test]
    async fn guests_only_seed_unknown_games() {
        let api = FakeApi::with_catalog(catalog());
        let mut book = FeedbackBook::new();
        let data = load_detail(&api, None, &GameId::Numeric(2)).await;
        data.seed_feedback(&mut book);
        assert!(book.knows(&GameId::Numeric(2)));
        assert!(book.knows(&GameId::Numeric(1)));
    }
}
