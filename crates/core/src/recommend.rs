//! Recommendation requests, response classification and score normalization.

use tracing::{info, warn};

use crate::{
    api::{RecommendRequest, RecommendResponse, RecommenderApi},
    error::{ApiError, ApiResult},
    models::{Game, GameId},
};

/// `status` value signalling that the engine lacks data for this user.
pub const COLD_START: &str = "cold_start";

/// A recommended game with its score scaled into (0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredGame {
    /// The record as returned by the engine.
    pub game: Game,
    /// `weight / max(weight)` across the set.
    pub match_score: f64,
}

impl ScoredGame {
    /// Match as a whole percentage.
    pub fn match_percent(&self) -> u32 {
        (self.match_score * 100.0).round() as u32
    }
}

/// Renderable outcome of one recommendation request.
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationResult {
    /// Not enough history: send the user to the survey.
    ColdStart,
    /// The engine answered with no matches.
    Empty,
    /// Ranked, normalized games.
    Ready(Vec<ScoredGame>),
    /// Transport, rejection or parse failure. Not retried.
    Error(ApiError),
}

fn weight(game: &Game) -> f64 {
    match game.score {
        Some(score) if score.is_finite() && score > 0.0 => score,
        _ => 1.0,
    }
}

/// Scale scores by the set maximum. Missing, zero, negative and non-finite
/// scores weigh 1, so a set without scores normalizes to all 1.0.
pub fn normalize(games: Vec<Game>) -> Vec<ScoredGame> {
    let max = games.iter().map(weight).fold(0.0_f64, f64::max);
    games
        .into_iter()
        .map(|game| {
            let match_score = weight(&game) / max;
            ScoredGame { game, match_score }
        })
        .collect()
}

/// Map a decoded response onto the view states.
pub fn classify(response: RecommendResponse) -> RecommendationResult {
    if response.status.as_deref() == Some(COLD_START) {
        return RecommendationResult::ColdStart;
    }
    match response.recommendations {
        None => RecommendationResult::Error(ApiError::Malformed(
            "response has no recommendations list".to_string(),
        )),
        Some(games) if games.is_empty() => RecommendationResult::Empty,
        Some(games) => RecommendationResult::Ready(normalize(games)),
    }
}

/// Issue one `POST /recommend` and classify the answer.
pub async fn request_recommendations(
    api: &dyn RecommenderApi,
    request: &RecommendRequest,
) -> RecommendationResult {
    let guest = matches!(request, RecommendRequest::Guest(_));
    match api.recommend(request).await {
        Ok(response) => {
            let result = classify(response);
            match &result {
                RecommendationResult::Ready(games) => {
                    info!(guest, count = games.len(), "recommendations received")
                }
                RecommendationResult::ColdStart => info!(guest, "cold start"),
                RecommendationResult::Empty => info!(guest, "no recommendations"),
                RecommendationResult::Error(err) => warn!(guest, %err, "unusable recommendations"),
            }
            result
        }
        Err(err) => {
            warn!(guest, %err, "recommendation request failed");
            RecommendationResult::Error(err)
        }
    }
}

/// "More like this" for the detail screen.
pub async fn similar_games(api: &dyn RecommenderApi, game_id: &GameId) -> ApiResult<Vec<ScoredGame>> {
    let response = api.similar(game_id).await?;
    let games = response.recommendations.unwrap_or_default();
    Ok(normalize(
        games
            .into_iter()
            .filter(|game| &game.game_id != game_id)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::testing::{Call, FakeApi},
        models::{SurveyPreferences, UserId},
    };

    fn scored(id: i64, score: Option<f64>) -> Game {
        let mut game = Game::new(id, format!("Game {id}"));
        game.score = score;
        game
    }

    #[test]
    fn normalized_scores_stay_in_unit_interval() {
        let games = vec![
            scored(1, Some(0.8)),
            scored(2, Some(2.0)),
            scored(3, Some(0.1)),
            scored(4, None),
        ];
        let result = normalize(games);
        for game in &result {
            assert!(game.match_score > 0.0 && game.match_score <= 1.0);
        }
        assert_eq!(result[1].match_score, 1.0);
        assert!((result[0].match_score - 0.4).abs() < 1e-9);
        assert!((result[3].match_score - 0.5).abs() < 1e-9);
        assert_eq!(result[1].match_percent(), 100);
    }

    #[test]
    fn all_absent_scores_are_uniformly_one() {
        let result = normalize(vec![scored(1, None), scored(2, None)]);
        assert!(result.iter().all(|game| game.match_score == 1.0));
    }

    #[test]
    fn degenerate_scores_weigh_one() {
        let result = normalize(vec![
            scored(1, Some(0.0)),
            scored(2, Some(-3.0)),
            scored(3, Some(f64::NAN)),
            scored(4, Some(0.5)),
        ]);
        assert_eq!(result[0].match_score, 1.0);
        assert_eq!(result[1].match_score, 1.0);
        assert_eq!(result[2].match_score, 1.0);
        assert_eq!(result[3].match_score, 0.5);
    }

    #[test]
    fn cold_start_wins_over_list_contents() {
        let response = RecommendResponse {
            status: Some("cold_start".to_string()),
            recommendations: Some(vec![scored(1, Some(1.0))]),
        };
        assert_eq!(classify(response), RecommendationResult::ColdStart);

        let bare = RecommendResponse {
            status: Some("cold_start".to_string()),
            recommendations: None,
        };
        assert_eq!(classify(bare), RecommendationResult::ColdStart);
    }

    #[test]
    fn empty_success_is_not_cold_start() {
        let response = RecommendResponse {
            status: Some("success".to_string()),
            recommendations: Some(vec![]),
        };
        assert_eq!(classify(response), RecommendationResult::Empty);
    }

    #[test]
    fn missing_list_is_malformed() {
        let response = RecommendResponse {
            status: Some("success".to_string()),
            recommendations: None,
        };
        assert!(matches!(
            classify(response),
            RecommendationResult::Error(ApiError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn transport_failure_becomes_error_state() {
        let api = FakeApi::default();
        api.fail("recommend", ApiError::Network("connection refused".to_string()));
        let request = RecommendRequest::User {
            user_id: UserId::new("ana"),
        };
        let result = request_recommendations(&api, &request).await;
        assert_eq!(
            result,
            RecommendationResult::Error(ApiError::Network("connection refused".to_string()))
        );
        assert_eq!(api.calls(), vec![Call::Recommend(request)]);
    }

    #[tokio::test]
    async fn server_cold_start_reaches_the_call_to_action() {
        let api = FakeApi::with_catalog(vec![scored(1, Some(2.0))]);
        api.set_recommend(RecommendResponse {
            status: Some("cold_start".to_string()),
            recommendations: Some(vec![scored(1, Some(2.0))]),
        });
        let request = RecommendRequest::User {
            user_id: UserId::new("ana"),
        };
        assert_eq!(
            request_recommendations(&api, &request).await,
            RecommendationResult::ColdStart
        );
    }

    #[tokio::test]
    async fn server_success_without_games_is_empty() {
        let api = FakeApi::default();
        api.set_recommend(RecommendResponse {
            status: Some("success".to_string()),
            recommendations: Some(vec![]),
        });
        let request = RecommendRequest::Guest(SurveyPreferences {
            genres: vec!["Horror".to_string()],
            ..SurveyPreferences::default()
        });
        assert_eq!(
            request_recommendations(&api, &request).await,
            RecommendationResult::Empty
        );
        assert_eq!(api.mutation_calls(), vec![]);
    }

    #[tokio::test]
    async fn guest_preferences_are_sent_inline() {
        let api = FakeApi::with_catalog(vec![scored(1, Some(3.0)), scored(2, Some(1.5))]);
        let request = RecommendRequest::Guest(SurveyPreferences {
            genres: vec!["RPG".to_string()],
            ..SurveyPreferences::default()
        });
        let RecommendationResult::Ready(games) = request_recommendations(&api, &request).await
        else {
            panic!("expected recommendations");
        };
        assert_eq!(games.len(), 2);
        assert_eq!(games[1].match_score, 0.5);
        assert_eq!(api.calls(), vec![Call::Recommend(request)]);
    }

    #[tokio::test]
    async fn similar_games_exclude_the_source() -> ApiResult<()> {
        let api = FakeApi::with_catalog(vec![scored(1, None), scored(2, Some(4.0)), scored(3, Some(2.0))]);
        let games = similar_games(&api, &GameId::Numeric(1)).await?;
        let ids: Vec<_> = games.iter().map(|g| g.game.game_id.clone()).collect();
        assert_eq!(ids, vec![GameId::Numeric(2), GameId::Numeric(3)]);
        assert_eq!(games[1].match_score, 0.5);
        Ok(())
    }
}
