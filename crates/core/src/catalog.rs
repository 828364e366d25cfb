//! Catalog fetching and the pure search/filter/sort views over it.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use crate::{api::RecommenderApi, error::ApiResult, models::Game};

/// Feature columns that count as a match for each survey genre label.
static GENRE_FLAGS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("action", &["action"][..]),
        ("adventure", &["adventure"][..]),
        ("rpg", &["rpg", "role_playing"][..]),
        ("strategy", &["strategy", "turn_based", "rts"][..]),
        ("simulation", &["simulation"][..]),
        ("sports", &["sports"][..]),
        ("racing", &["racing"][..]),
        ("puzzle", &["puzzle"][..]),
        ("shooter", &["shooter", "fps"][..]),
        ("platformer", &["platformer"][..]),
        ("fighting", &["fighting"][..]),
        ("stealth", &["stealth"][..]),
        ("survival", &["survival"][..]),
        ("horror", &["horror"][..]),
    ])
});

/// Ordering applied to a catalog view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Case-insensitive title order.
    #[default]
    Title,
    /// Newest first; undated games sort as the oldest.
    ReleaseDate,
}

impl SortKey {
    /// Label for the status bar.
    pub fn label(self) -> &'static str {
        match self {
            SortKey::Title => "Title",
            SortKey::ReleaseDate => "Newest",
        }
    }

    /// The other ordering.
    pub fn toggled(self) -> Self {
        match self {
            SortKey::Title => SortKey::ReleaseDate,
            SortKey::ReleaseDate => SortKey::Title,
        }
    }
}

/// Search text, genre and ordering for one catalog view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Case-insensitive title substring.
    pub search: String,
    /// Survey genre label, e.g. `"RPG"`.
    pub genre: Option<String>,
    /// Ordering.
    pub sort: SortKey,
}

impl CatalogQuery {
    /// Run the query against `games` without touching the network.
    pub fn apply(&self, games: &[Game]) -> Vec<Game> {
        let needle = self.search.trim().to_lowercase();
        let mut matched: Vec<Game> = games
            .iter()
            .filter(|game| needle.is_empty() || game.title.to_lowercase().contains(&needle))
            .filter(|game| {
                self.genre
                    .as_deref()
                    .map(|label| matches_genre(game, label))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        sort_games(&mut matched, self.sort);
        matched
    }
}

/// Feature flags a genre label maps to.
pub fn genre_flags(label: &str) -> Vec<String> {
    let key = label.trim().to_lowercase();
    match GENRE_FLAGS.get(key.as_str()) {
        Some(flags) => flags.iter().map(|flag| flag.to_string()).collect(),
        None => vec![key.replace([' ', '-'], "_")],
    }
}

/// True when any mapped feature flag is set, or the literal `genre` field
/// names the label.
pub fn matches_genre(game: &Game, label: &str) -> bool {
    let label = label.trim();
    if label.is_empty() {
        return true;
    }
    if genre_flags(label).iter().any(|flag| game.has_feature(flag)) {
        return true;
    }
    game.genre
        .as_deref()
        .map(|genres| {
            genres
                .split([';', ',', '|'])
                .any(|part| part.trim().eq_ignore_ascii_case(label))
        })
        .unwrap_or(false)
}

/// Sort in place by `key`, with title as the tie-breaker.
pub fn sort_games(games: &mut [Game], key: SortKey) {
    match key {
        SortKey::Title => games.sort_by(compare_titles),
        SortKey::ReleaseDate => games.sort_by(|a, b| {
            release_or_epoch(b)
                .cmp(&release_or_epoch(a))
                .then_with(|| compare_titles(a, b))
        }),
    }
}

fn compare_titles(a: &Game, b: &Game) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

fn release_or_epoch(game: &Game) -> NaiveDate {
    game.release_date.unwrap_or_default()
}

/// Fetches `GET /games` once and serves later reads from memory until
/// [`CatalogLoader::invalidate`] is called.
#[derive(Clone)]
pub struct CatalogLoader {
    api: Arc<dyn RecommenderApi>,
    cache: Arc<RwLock<Option<Vec<Game>>>>,
}

impl CatalogLoader {
    /// New loader with an empty cache.
    pub fn new(api: Arc<dyn RecommenderApi>) -> Self {
        Self {
            api,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Drop the cached list so the next read refetches.
    pub fn invalidate(&self) {
        self.cache.write().take();
    }

    /// The full catalog, fetched on first use.
    pub async fn games(&self) -> ApiResult<Vec<Game>> {
        let cached = self.cache.read().clone();
        if let Some(games) = cached {
            return Ok(games);
        }
        let mut games = self.api.games().await?;
        sort_games(&mut games, SortKey::Title);
        info!(total = games.len(), "catalog loaded");
        *self.cache.write() = Some(games.clone());
        Ok(games)
    }

    /// The catalog filtered and ordered by `query`.
    pub async fn games_matching(&self, query: &CatalogQuery) -> ApiResult<Vec<Game>> {
        let games = self.games().await?;
        Ok(query.apply(&games))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Call, FakeApi};
    use serde_json::Value;

    fn game(id: i64, title: &str, date: Option<(i32, u32, u32)>) -> Game {
        let mut game = Game::new(id, title);
        game.release_date = date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        game
    }

    fn sample() -> Vec<Game> {
        let mut witcher = game(1, "The Witcher 3", Some((2015, 5, 18)));
        witcher.features.insert("rpg".to_string(), Value::from(1));
        let mut doom = game(2, "DOOM", Some((2016, 5, 13)));
        doom.features.insert("fps".to_string(), Value::from(1));
        let mut tetris = game(3, "tetris", None);
        tetris.genre = Some("Puzzle; Arcade".to_string());
        let mut baldur = game(4, "Baldur's Gate 3", Some((2023, 8, 3)));
        baldur.genre = Some("RPG".to_string());
        vec![witcher, doom, tetris, baldur]
    }

    fn titles(games: &[Game]) -> Vec<&str> {
        games.iter().map(|game| game.title.as_str()).collect()
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let query = CatalogQuery {
            search: "  wItCh ".to_string(),
            ..CatalogQuery::default()
        };
        assert_eq!(titles(&query.apply(&sample())), vec!["The Witcher 3"]);
    }

    #[test]
    fn genre_matches_flags_or_literal_field() {
        let rpg = CatalogQuery {
            genre: Some("RPG".to_string()),
            ..CatalogQuery::default()
        };
        assert_eq!(
            titles(&rpg.apply(&sample())),
            vec!["Baldur's Gate 3", "The Witcher 3"]
        );

        let shooter = CatalogQuery {
            genre: Some("Shooter".to_string()),
            ..CatalogQuery::default()
        };
        assert_eq!(titles(&shooter.apply(&sample())), vec!["DOOM"]);

        let puzzle = CatalogQuery {
            genre: Some("puzzle".to_string()),
            ..CatalogQuery::default()
        };
        assert_eq!(titles(&puzzle.apply(&sample())), vec!["tetris"]);
    }

    #[test]
    fn unknown_labels_fall_back_to_snake_case_flag() {
        assert_eq!(genre_flags("Open World"), vec!["open_world"]);
        assert_eq!(genre_flags("rpg"), vec!["rpg", "role_playing"]);
    }

    #[test]
    fn title_sort_ignores_case() {
        let query = CatalogQuery::default();
        assert_eq!(
            titles(&query.apply(&sample())),
            vec!["Baldur's Gate 3", "DOOM", "tetris", "The Witcher 3"]
        );
    }

    #[test]
    fn release_sort_is_newest_first_with_undated_last() {
        let query = CatalogQuery {
            sort: SortKey::ReleaseDate,
            ..CatalogQuery::default()
        };
        assert_eq!(
            titles(&query.apply(&sample())),
            vec!["Baldur's Gate 3", "DOOM", "The Witcher 3", "tetris"]
        );
    }

    #[tokio::test]
    async fn loader_fetches_once_until_invalidated() -> ApiResult<()> {
        let api = Arc::new(FakeApi::with_catalog(sample()));
        let loader = CatalogLoader::new(api.clone());

        let first = loader.games().await?;
        assert_eq!(first.len(), 4);
        let filtered = loader
            .games_matching(&CatalogQuery {
                search: "doom".to_string(),
                ..CatalogQuery::default()
            })
            .await?;
        assert_eq!(titles(&filtered), vec!["DOOM"]);
        assert_eq!(api.calls(), vec![Call::Games]);

        loader.invalidate();
        loader.games().await?;
        assert_eq!(api.calls(), vec![Call::Games, Call::Games]);
        Ok(())
    }
}
