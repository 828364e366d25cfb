//! Backend seam.
//!
//! Every view talks to the recommendation service through
//! [`RecommenderApi`], so the state machines can be driven by the real
//! HTTP client or by an in-memory double in tests.

mod http;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiResult,
    models::{
        Credentials, Game, GameDetail, GameId, LibraryEntry, LibraryStatus, SurveyPreferences,
        UserId, UserStats,
    },
};

pub use http::HttpApi;

/// Body of `POST /recommend`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecommendRequest {
    /// Recommendations for a stored profile.
    User {
        /// Signed-in account.
        user_id: UserId,
    },
    /// Recommendations for an anonymous visitor's survey answers.
    Guest(SurveyPreferences),
}

/// Body of `POST /recommend` and `POST /recommend/game` responses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecommendResponse {
    /// `"cold_start"`, `"success"` or absent.
    #[serde(default)]
    pub status: Option<String>,
    /// Ranked games; absent on some cold-start payloads.
    #[serde(default)]
    pub recommendations: Option<Vec<Game>>,
}

/// Authentication endpoint selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// `POST /login`.
    Login,
    /// `POST /register`.
    Register,
}

impl AuthMode {
    /// Form title.
    pub fn label(self) -> &'static str {
        match self {
            AuthMode::Login => "Login",
            AuthMode::Register => "Register",
        }
    }

    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        }
    }
}

/// Operations the client needs from the recommendation service.
#[async_trait]
pub trait RecommenderApi: Send + Sync {
    /// `GET /games`.
    async fn games(&self) -> ApiResult<Vec<Game>>;

    /// `POST /recommend`.
    async fn recommend(&self, request: &RecommendRequest) -> ApiResult<RecommendResponse>;

    /// `POST /recommend/game`.
    async fn similar(&self, game_id: &GameId) -> ApiResult<RecommendResponse>;

    /// `GET /game/{id}`.
    async fn game_detail(&self, game_id: &GameId) -> ApiResult<GameDetail>;

    /// `POST /rate`.
    async fn rate(&self, user: &UserId, game_id: &GameId, rating: u8) -> ApiResult<()>;

    /// `POST /rate/delete`.
    async fn unrate(&self, user: &UserId, game_id: &GameId) -> ApiResult<()>;

    /// `GET /user/history/{user}`.
    async fn history(&self, user: &UserId) -> ApiResult<Vec<Game>>;

    /// `GET /library/{user}`.
    async fn library(&self, user: &UserId) -> ApiResult<Vec<LibraryEntry>>;

    /// `POST /library/update`.
    async fn update_library(
        &self,
        user: &UserId,
        game_id: &GameId,
        status: LibraryStatus,
    ) -> ApiResult<()>;

    /// `POST /library/delete`.
    async fn remove_from_library(&self, user: &UserId, game_id: &GameId) -> ApiResult<()>;

    /// `POST /survey`.
    async fn submit_survey(&self, user: &UserId, preferences: &SurveyPreferences)
        -> ApiResult<()>;

    /// `GET /user/preferences/{user}`.
    async fn preferences(&self, user: &UserId) -> ApiResult<SurveyPreferences>;

    /// `GET /user/stats/{user}`.
    async fn stats(&self, user: &UserId) -> ApiResult<UserStats>;

    /// `POST /login` or `POST /register`.
    async fn authenticate(&self, mode: AuthMode, credentials: &Credentials) -> ApiResult<()>;

    /// `POST /reset_profile`.
    async fn reset_profile(&self, user: &UserId) -> ApiResult<()>;
}
