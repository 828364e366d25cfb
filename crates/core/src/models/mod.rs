//! Shared domain models exchanged with the backend.

mod dates;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque game identifier. The wire form (number or string) is preserved so
/// ids sent back to the backend compare equal to the ones it issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GameId {
    /// Integer id, as emitted by the reference backend.
    Numeric(i64),
    /// Any other textual id.
    Text(String),
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameId::Numeric(value) => write!(f, "{value}"),
            GameId::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for GameId {
    fn from(value: i64) -> Self {
        GameId::Numeric(value)
    }
}

impl From<&str> for GameId {
    fn from(value: &str) -> Self {
        GameId::Text(value.to_string())
    }
}

/// Username of the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a username.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the raw username.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog, recommendation or history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Backend identifier.
    pub game_id: GameId,
    /// Display title.
    pub title: String,
    /// Cover image URL used by recommendation payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Cover image URL used by the catalog payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Literal genre label, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Release date; unparseable values are dropped.
    #[serde(
        default,
        deserialize_with = "dates::lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub release_date: Option<NaiveDate>,
    /// The current user's stored rating (1..=5).
    #[serde(default)]
    pub rating: Option<f64>,
    /// Engine-provided reason for the recommendation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Raw engine score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Long-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Remaining columns, including per-genre feature flags.
    #[serde(flatten)]
    pub features: Map<String, Value>,
}

impl Game {
    /// Minimal record, mostly useful for fixtures.
    pub fn new(game_id: impl Into<GameId>, title: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            title: title.into(),
            image: None,
            image_url: None,
            genre: None,
            release_date: None,
            rating: None,
            explanation: None,
            score: None,
            description: None,
            features: Map::new(),
        }
    }

    /// Whichever image field the payload carried.
    pub fn cover(&self) -> Option<&str> {
        self.image
            .as_deref()
            .or(self.image_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// True when the named feature column is set (non-zero number, `true`,
    /// or a non-empty string other than `"0"`).
    pub fn has_feature(&self, flag: &str) -> bool {
        match self.features.get(flag) {
            Some(Value::Bool(value)) => *value,
            Some(Value::Number(value)) => value.as_f64().map(|v| v > 0.0).unwrap_or(false),
            Some(Value::String(value)) => {
                let value = value.trim();
                !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
            }
            _ => false,
        }
    }
}

/// Extended record returned by `GET /game/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDetail {
    /// Common game fields.
    #[serde(flatten)]
    pub game: Game,
}

impl GameDetail {
    fn text(&self, key: &str) -> Option<&str> {
        self.game
            .features
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Studio credit.
    pub fn developer(&self) -> Option<&str> {
        self.text("developer")
    }

    /// Publisher credit.
    pub fn publisher(&self) -> Option<&str> {
        self.text("publisher")
    }

    /// Platforms, split from the backend's `;`-separated column.
    pub fn platforms(&self) -> Vec<String> {
        self.text("platform")
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Play status stored per (user, game).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LibraryStatus {
    /// Tracked but not yet classified.
    #[serde(rename = "Add to Library")]
    AddToLibrary,
    /// Backlog.
    #[serde(rename = "Plan to Play")]
    PlanToPlay,
    /// Currently playing.
    #[serde(rename = "Playing")]
    Playing,
    /// Finished.
    #[serde(rename = "Completed")]
    Completed,
    /// Abandoned.
    #[serde(rename = "Dropped")]
    Dropped,
}

impl LibraryStatus {
    /// Every status in chooser order.
    pub const ALL: [LibraryStatus; 5] = [
        LibraryStatus::AddToLibrary,
        LibraryStatus::PlanToPlay,
        LibraryStatus::Playing,
        LibraryStatus::Completed,
        LibraryStatus::Dropped,
    ];

    /// Wire/display label.
    pub fn label(self) -> &'static str {
        match self {
            LibraryStatus::AddToLibrary => "Add to Library",
            LibraryStatus::PlanToPlay => "Plan to Play",
            LibraryStatus::Playing => "Playing",
            LibraryStatus::Completed => "Completed",
            LibraryStatus::Dropped => "Dropped",
        }
    }
}

impl fmt::Display for LibraryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of `GET /library/{user}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Backend identifier.
    pub game_id: GameId,
    /// Current play status.
    pub status: LibraryStatus,
    /// Date the entry was last changed, as sent by the backend.
    #[serde(default)]
    pub date: Option<String>,
    /// Title, when the backend joins it in.
    #[serde(default)]
    pub title: Option<String>,
    /// Cover image, when the backend joins it in.
    #[serde(default, alias = "image_url")]
    pub image: Option<String>,
}

/// Category-selection survey answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyPreferences {
    /// Selected genres.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Selected platforms; empty means any.
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Selected play modes; empty means any.
    #[serde(default)]
    pub modes: Vec<String>,
}

/// Per-genre affinity in the stats payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreStat {
    /// Genre label.
    pub name: String,
    /// Affinity strength; the profile scales bars against 20.
    pub value: f64,
}

/// `GET /user/stats/{user}` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    /// Match accuracy percentage (0..=100).
    #[serde(default)]
    pub accuracy: f64,
    /// Genre affinity breakdown.
    #[serde(default)]
    pub genre_data: Vec<GenreStat>,
}

/// Login/register form body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Plain-text password; only ever sent to the backend.
    pub password: String,
}
