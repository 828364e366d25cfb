//! In-memory backend double for view tests, here and in the terminal
//! crate (`testing` feature).

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{AuthMode, RecommendRequest, RecommendResponse, RecommenderApi};
use crate::{
    error::{ApiError, ApiResult},
    models::{
        Credentials, Game, GameDetail, GameId, LibraryEntry, LibraryStatus, SurveyPreferences,
        UserId, UserStats,
    },
};

/// One recorded backend call.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Games,
    Recommend(RecommendRequest),
    Similar(GameId),
    Detail(GameId),
    Rate(GameId, u8),
    Unrate(GameId),
    History,
    Library,
    UpdateLibrary(GameId, LibraryStatus),
    RemoveFromLibrary(GameId),
    Survey(SurveyPreferences),
    Preferences,
    Stats,
    Authenticate(AuthMode, String),
    ResetProfile,
}

#[derive(Default)]
struct State {
    catalog: Vec<Game>,
    ratings: HashMap<GameId, f64>,
    library: Vec<LibraryEntry>,
    preferences: SurveyPreferences,
    stats: UserStats,
    recommend: Option<RecommendResponse>,
    failures: HashMap<&'static str, ApiError>,
    calls: Vec<Call>,
}

/// Server double: keeps ratings and library rows, records every call, and
/// can fail or hold chosen operations.
#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<State>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeApi {
    /// Backend serving `games` as its catalog.
    pub fn with_catalog(games: Vec<Game>) -> Self {
        let api = Self::default();
        api.state.lock().catalog = games;
        api
    }

    /// Mutations wait for [`FakeApi::release`] before answering.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `permits` held calls through.
    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    /// Store a rating as if the user had submitted it.
    pub fn set_rating(&self, game_id: impl Into<GameId>, rating: f64) {
        self.state.lock().ratings.insert(game_id.into(), rating);
    }

    /// Stored rating for `game_id`.
    pub fn rating(&self, game_id: &GameId) -> Option<f64> {
        self.state.lock().ratings.get(game_id).copied()
    }

    /// Replace the library rows.
    pub fn set_library(&self, entries: Vec<LibraryEntry>) {
        self.state.lock().library = entries;
    }

    /// Replace the stored survey answers.
    pub fn set_preferences(&self, preferences: SurveyPreferences) {
        self.state.lock().preferences = preferences;
    }

    /// Replace the taste stats.
    pub fn set_stats(&self, stats: UserStats) {
        self.state.lock().stats = stats;
    }

    /// Answer every `/recommend` with `response`.
    pub fn set_recommend(&self, response: RecommendResponse) {
        self.state.lock().recommend = Some(response);
    }

    /// Every later call of `operation` fails with `error`.
    pub fn fail(&self, operation: &'static str, error: ApiError) {
        self.state.lock().failures.insert(operation, error);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Recorded calls that change server state.
    pub fn mutation_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::Rate(..)
                        | Call::Unrate(_)
                        | Call::UpdateLibrary(..)
                        | Call::RemoveFromLibrary(_)
                        | Call::Survey(_)
                        | Call::ResetProfile
                )
            })
            .collect()
    }

    fn record(&self, operation: &'static str, call: Call) -> ApiResult<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn hold(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    fn rated_games(&self) -> Vec<Game> {
        let state = self.state.lock();
        state
            .ratings
            .iter()
            .map(|(id, rating)| {
                let mut game = state
                    .catalog
                    .iter()
                    .find(|game| &game.game_id == id)
                    .cloned()
                    .unwrap_or_else(|| Game::new(id.clone(), format!("Game {id}")));
                game.rating = Some(*rating);
                game
            })
            .collect()
    }
}

#[async_trait]
impl RecommenderApi for FakeApi {
    async fn games(&self) -> ApiResult<Vec<Game>> {
        self.record("games", Call::Games)?;
        Ok(self.state.lock().catalog.clone())
    }

    async fn recommend(&self, request: &RecommendRequest) -> ApiResult<RecommendResponse> {
        self.record("recommend", Call::Recommend(request.clone()))?;
        let state = self.state.lock();
        if let Some(response) = state.recommend.clone() {
            return Ok(response);
        }
        let games = state
            .catalog
            .iter()
            .cloned()
            .map(|mut game| {
                game.rating = state.ratings.get(&game.game_id).copied();
                game
            })
            .collect();
        Ok(RecommendResponse {
            status: Some("success".to_string()),
            recommendations: Some(games),
        })
    }

    async fn similar(&self, game_id: &GameId) -> ApiResult<RecommendResponse> {
        self.record("similar", Call::Similar(game_id.clone()))?;
        let games = self
            .state
            .lock()
            .catalog
            .iter()
            .filter(|game| &game.game_id != game_id)
            .cloned()
            .collect();
        Ok(RecommendResponse {
            status: None,
            recommendations: Some(games),
        })
    }

    async fn game_detail(&self, game_id: &GameId) -> ApiResult<GameDetail> {
        self.record("detail", Call::Detail(game_id.clone()))?;
        self.state
            .lock()
            .catalog
            .iter()
            .find(|game| &game.game_id == game_id)
            .cloned()
            .map(|game| GameDetail { game })
            .ok_or_else(|| ApiError::Rejected {
                status: 404,
                message: "Game not found".to_string(),
            })
    }

    async fn rate(&self, _user: &UserId, game_id: &GameId, rating: u8) -> ApiResult<()> {
        let outcome = self.record("rate", Call::Rate(game_id.clone(), rating));
        self.hold().await;
        outcome?;
        self.set_rating(game_id.clone(), f64::from(rating));
        Ok(())
    }

    async fn unrate(&self, _user: &UserId, game_id: &GameId) -> ApiResult<()> {
        let outcome = self.record("unrate", Call::Unrate(game_id.clone()));
        self.hold().await;
        outcome?;
        self.state.lock().ratings.remove(game_id);
        Ok(())
    }

    async fn history(&self, _user: &UserId) -> ApiResult<Vec<Game>> {
        self.record("history", Call::History)?;
        Ok(self.rated_games())
    }

    async fn library(&self, _user: &UserId) -> ApiResult<Vec<LibraryEntry>> {
        self.record("library", Call::Library)?;
        Ok(self.state.lock().library.clone())
    }

    async fn update_library(
        &self,
        _user: &UserId,
        game_id: &GameId,
        status: LibraryStatus,
    ) -> ApiResult<()> {
        let outcome = self.record("update_library", Call::UpdateLibrary(game_id.clone(), status));
        self.hold().await;
        outcome?;
        let mut state = self.state.lock();
        match state
            .library
            .iter_mut()
            .find(|entry| &entry.game_id == game_id)
        {
            Some(entry) => entry.status = status,
            None => state.library.push(LibraryEntry {
                game_id: game_id.clone(),
                status,
                date: None,
                title: None,
                image: None,
            }),
        }
        Ok(())
    }

    async fn remove_from_library(&self, _user: &UserId, game_id: &GameId) -> ApiResult<()> {
        let outcome = self.record("remove_from_library", Call::RemoveFromLibrary(game_id.clone()));
        self.hold().await;
        outcome?;
        self.state
            .lock()
            .library
            .retain(|entry| &entry.game_id != game_id);
        Ok(())
    }

    async fn submit_survey(
        &self,
        _user: &UserId,
        preferences: &SurveyPreferences,
    ) -> ApiResult<()> {
        self.record("survey", Call::Survey(preferences.clone()))?;
        self.set_preferences(preferences.clone());
        Ok(())
    }

    async fn preferences(&self, _user: &UserId) -> ApiResult<SurveyPreferences> {
        self.record("preferences", Call::Preferences)?;
        Ok(self.state.lock().preferences.clone())
    }

    async fn stats(&self, _user: &UserId) -> ApiResult<UserStats> {
        self.record("stats", Call::Stats)?;
        Ok(self.state.lock().stats.clone())
    }

    async fn authenticate(&self, mode: AuthMode, credentials: &Credentials) -> ApiResult<()> {
        self.record(
            "authenticate",
            Call::Authenticate(mode, credentials.username.clone()),
        )
    }

    async fn reset_profile(&self, _user: &UserId) -> ApiResult<()> {
        self.record("reset_profile", Call::ResetProfile)?;
        let mut state = self.state.lock();
        state.ratings.clear();
        state.preferences = SurveyPreferences::default();
        Ok(())
    }
}
