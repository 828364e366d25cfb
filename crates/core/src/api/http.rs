use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{AuthMode, RecommendRequest, RecommendResponse, RecommenderApi};
use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    models::{
        Credentials, Game, GameDetail, GameId, LibraryEntry, LibraryStatus, SurveyPreferences,
        UserId, UserStats,
    },
};

/// [`RecommenderApi`] over HTTP/JSON with one shared connection pool.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl HttpApi {
    /// Build a client for `base_url`, bounding every request by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|err| anyhow::anyhow!("invalid api_base_url {base_url:?}: {err}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("api_base_url {base_url:?} cannot carry paths");
        }
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    /// Build a client from the loaded configuration.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    /// Base address requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> ApiResult<Response> {
        let url = self.url(segments);
        debug!(%method, %url, "backend request");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(|err| self.transport(err))
    }

    fn transport(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout.as_secs())
        } else {
            ApiError::from(err)
        }
    }

    async fn read<T: DeserializeOwned>(&self, response: Response) -> ApiResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(|err| self.transport(err))?;
        if !status.is_success() {
            return Err(rejection(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn accept(&self, response: Response) -> ApiResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.map_err(|err| self.transport(err))?;
        Err(rejection(status, &body))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        let response = self.send::<()>(Method::GET, segments, None).await?;
        self.read(response).await
    }

    async fn post<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> ApiResult<()> {
        let response = self.send(Method::POST, segments, Some(body)).await?;
        self.accept(response).await
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

fn rejection(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .unwrap_or_else(|| body.trim().chars().take(200).collect());
    warn!(status = status.as_u16(), %message, "backend rejected request");
    ApiError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl RecommenderApi for HttpApi {
    async fn games(&self) -> ApiResult<Vec<Game>> {
        self.get(&["games"]).await
    }

    async fn recommend(&self, request: &RecommendRequest) -> ApiResult<RecommendResponse> {
        let response = self
            .send(Method::POST, &["recommend"], Some(request))
            .await?;
        self.read(response).await
    }

    async fn similar(&self, game_id: &GameId) -> ApiResult<RecommendResponse> {
        let body = json!({ "game_id": game_id });
        let response = self
            .send(Method::POST, &["recommend", "game"], Some(&body))
            .await?;
        self.read(response).await
    }

    async fn game_detail(&self, game_id: &GameId) -> ApiResult<GameDetail> {
        let id = game_id.to_string();
        self.get(&["game", &id]).await
    }

    async fn rate(&self, user: &UserId, game_id: &GameId, rating: u8) -> ApiResult<()> {
        let body = json!({ "user_id": user, "game_id": game_id, "rating": rating });
        self.post(&["rate"], &body).await
    }

    async fn unrate(&self, user: &UserId, game_id: &GameId) -> ApiResult<()> {
        let body = json!({ "user_id": user, "game_id": game_id });
        self.post(&["rate", "delete"], &body).await
    }

    async fn history(&self, user: &UserId) -> ApiResult<Vec<Game>> {
        self.get(&["user", "history", user.as_str()]).await
    }

    async fn library(&self, user: &UserId) -> ApiResult<Vec<LibraryEntry>> {
        self.get(&["library", user.as_str()]).await
    }

    async fn update_library(
        &self,
        user: &UserId,
        game_id: &GameId,
        status: LibraryStatus,
    ) -> ApiResult<()> {
        let body = json!({ "user_id": user, "game_id": game_id, "status": status });
        self.post(&["library", "update"], &body).await
    }

    async fn remove_from_library(&self, user: &UserId, game_id: &GameId) -> ApiResult<()> {
        let body = json!({ "user_id": user, "game_id": game_id });
        self.post(&["library", "delete"], &body).await
    }

    async fn submit_survey(
        &self,
        user: &UserId,
        preferences: &SurveyPreferences,
    ) -> ApiResult<()> {
        let body = json!({
            "user_id": user,
            "genres": preferences.genres,
            "platforms": preferences.platforms,
            "modes": preferences.modes,
        });
        self.post(&["survey"], &body).await
    }

    async fn preferences(&self, user: &UserId) -> ApiResult<SurveyPreferences> {
        self.get(&["user", "preferences", user.as_str()]).await
    }

    async fn stats(&self, user: &UserId) -> ApiResult<UserStats> {
        self.get(&["user", "stats", user.as_str()]).await
    }

    async fn authenticate(&self, mode: AuthMode, credentials: &Credentials) -> ApiResult<()> {
        let path = match mode {
            AuthMode::Login => "login",
            AuthMode::Register => "register",
        };
        self.post(&[path], credentials).await
    }

    async fn reset_profile(&self, user: &UserId) -> ApiResult<()> {
        let body = json!({ "user_id": user });
        self.post(&["reset_profile"], &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_and_encode_segments() -> anyhow::Result<()> {
        let api = HttpApi::new("http://127.0.0.1:5000", Duration::from_secs(10))?;
        assert_eq!(
            api.url(&["user", "history", "ana maria"]).as_str(),
            "http://127.0.0.1:5000/user/history/ana%20maria"
        );

        let nested = HttpApi::new("http://example.com/api/", Duration::from_secs(10))?;
        assert_eq!(
            nested.url(&["recommend", "game"]).as_str(),
            "http://example.com/api/recommend/game"
        );
        Ok(())
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(HttpApi::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpApi::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    }

    // Answers one request with a 500 whose body is cut short.
    fn truncated_rejection_server() -> anyhow::Result<String> {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let address = format!("http://{}", listener.local_addr()?);
        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while let Ok(read) = stream.read(&mut buf) {
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|line| {
                            line.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .and_then(|value| value.trim().parse::<usize>().ok())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let _ = stream.write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 200\r\n\r\n{\"error\"",
            );
            let _ = stream.flush();
        });
        Ok(address)
    }

    #[tokio::test]
    async fn unreadable_rejection_body_is_a_transport_failure() -> anyhow::Result<()> {
        let api = HttpApi::new(&truncated_rejection_server()?, Duration::from_secs(5))?;
        let result = api
            .rate(&UserId::new("ana"), &GameId::Numeric(7), 5)
            .await;
        assert!(
            matches!(result, Err(ApiError::Network(_) | ApiError::Malformed(_))),
            "got {result:?}"
        );
        Ok(())
    }

    #[test]
    fn rejection_prefers_error_field() {
        let err = rejection(StatusCode::UNAUTHORIZED, r#"{"error": "Invalid credentials"}"#);
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 401,
                message: "Invalid credentials".to_string()
            }
        );

        let raw = rejection(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(
            raw,
            ApiError::Rejected {
                status: 502,
                message: "upstream down".to_string()
            }
        );
    }
}
