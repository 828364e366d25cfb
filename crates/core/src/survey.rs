//! Taste survey: toggle selections, validation, and routing on submit.

use thiserror::Error;
use tracing::info;

use crate::{
    api::{RecommendRequest, RecommenderApi},
    error::ApiError,
    models::{SurveyPreferences, UserId},
};

/// Genre options, in display order.
pub const GENRES: [&str; 14] = [
    "Action",
    "Adventure",
    "RPG",
    "Strategy",
    "Simulation",
    "Sports",
    "Racing",
    "Puzzle",
    "Shooter",
    "Platformer",
    "Fighting",
    "Stealth",
    "Survival",
    "Horror",
];

/// Platform options.
pub const PLATFORMS: [&str; 3] = ["PC", "Console", "Mobile"];

/// Play-mode options.
pub const MODES: [&str; 2] = ["Singleplayer", "Multiplayer"];

/// One of the three independent option lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Favourite genres (at least one required).
    Genre,
    /// Devices.
    Platform,
    /// Play style.
    Mode,
}

impl Category {
    /// Sections in form order.
    pub const ALL: [Category; 3] = [Category::Genre, Category::Platform, Category::Mode];

    /// Section heading.
    pub fn title(self) -> &'static str {
        match self {
            Category::Genre => "Favorite Genres",
            Category::Platform => "Select Device",
            Category::Mode => "Play Style",
        }
    }

    /// Options offered in this section.
    pub fn options(self) -> &'static [&'static str] {
        match self {
            Category::Genre => &GENRES,
            Category::Platform => &PLATFORMS,
            Category::Mode => &MODES,
        }
    }
}

/// Why a survey cannot be submitted yet.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SurveyError {
    /// No genre selected.
    #[error("Please select at least one genre")]
    NoGenre,
    /// Persisting the answers failed.
    #[error("Could not save preferences: {}", .0.user_message())]
    Api(#[from] ApiError),
}

/// Selection state of the survey form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyForm {
    genres: Vec<String>,
    platforms: Vec<String>,
    modes: Vec<String>,
}

impl SurveyForm {
    /// Empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Form pre-filled from stored preferences; unknown options are kept.
    pub fn from_preferences(preferences: &SurveyPreferences) -> Self {
        Self {
            genres: preferences.genres.clone(),
            platforms: preferences.platforms.clone(),
            modes: preferences.modes.clone(),
        }
    }

    fn list_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Genre => &mut self.genres,
            Category::Platform => &mut self.platforms,
            Category::Mode => &mut self.modes,
        }
    }

    fn list(&self, category: Category) -> &[String] {
        match category {
            Category::Genre => &self.genres,
            Category::Platform => &self.platforms,
            Category::Mode => &self.modes,
        }
    }

    /// Select `item` if unselected, deselect it otherwise.
    pub fn toggle(&mut self, category: Category, item: &str) {
        let list = self.list_mut(category);
        if let Some(pos) = list.iter().position(|existing| existing == item) {
            list.remove(pos);
        } else {
            list.push(item.to_string());
        }
    }

    /// Whether `item` is currently selected.
    pub fn is_selected(&self, category: Category, item: &str) -> bool {
        self.list(category).iter().any(|existing| existing == item)
    }

    /// Number of selections in `category`.
    pub fn count(&self, category: Category) -> usize {
        self.list(category).len()
    }

    /// The payload, if the form is submittable.
    pub fn validate(&self) -> Result<SurveyPreferences, SurveyError> {
        if self.genres.is_empty() {
            return Err(SurveyError::NoGenre);
        }
        Ok(SurveyPreferences {
            genres: self.genres.clone(),
            platforms: self.platforms.clone(),
            modes: self.modes.clone(),
        })
    }
}

/// Where to go after a successful submission.
pub type SurveyOutcome = RecommendRequest;

/// Validate, persist for signed-in users, and return the recommendation
/// request to navigate with. Guests are never persisted.
pub async fn submit(
    api: &dyn RecommenderApi,
    user: Option<&UserId>,
    form: &SurveyForm,
) -> Result<SurveyOutcome, SurveyError> {
    let preferences = form.validate()?;
    match user {
        Some(user) => {
            api.submit_survey(user, &preferences).await?;
            info!(user = %user, genres = preferences.genres.len(), "survey saved");
            Ok(RecommendRequest::User {
                user_id: user.clone(),
            })
        }
        None => {
            info!(genres = preferences.genres.len(), "guest survey");
            Ok(RecommendRequest::Guest(preferences))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Call, FakeApi};

    #[test]
    fn toggling_twice_deselects() {
        let mut form = SurveyForm::new();
        form.toggle(Category::Genre, "RPG");
        form.toggle(Category::Platform, "PC");
        form.toggle(Category::Genre, "Horror");
        assert!(form.is_selected(Category::Genre, "RPG"));
        assert_eq!(form.count(Category::Genre), 2);

        form.toggle(Category::Genre, "RPG");
        assert!(!form.is_selected(Category::Genre, "RPG"));
        assert!(form.is_selected(Category::Platform, "PC"));
        assert_eq!(form.count(Category::Mode), 0);
    }

    #[test]
    fn genre_is_required_but_platforms_are_optional() {
        let mut form = SurveyForm::new();
        form.toggle(Category::Platform, "PC");
        assert_eq!(form.validate(), Err(SurveyError::NoGenre));

        form.toggle(Category::Genre, "Strategy");
        let preferences = form.validate().expect("valid form");
        assert_eq!(preferences.genres, vec!["Strategy"]);
        assert_eq!(preferences.platforms, vec!["PC"]);
        assert!(preferences.modes.is_empty());
    }

    #[tokio::test]
    async fn guest_submission_skips_persistence() -> Result<(), SurveyError> {
        let api = FakeApi::default();
        let mut form = SurveyForm::new();
        form.toggle(Category::Genre, "RPG");

        let outcome = submit(&api, None, &form).await?;
        assert_eq!(
            outcome,
            RecommendRequest::Guest(SurveyPreferences {
                genres: vec!["RPG".to_string()],
                platforms: vec![],
                modes: vec![],
            })
        );
        assert!(api.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn signed_in_submission_persists_then_routes_by_user() -> Result<(), SurveyError> {
        let api = FakeApi::default();
        let user = UserId::new("ana");
        let mut form = SurveyForm::new();
        form.toggle(Category::Genre, "Racing");
        form.toggle(Category::Mode, "Multiplayer");

        let outcome = submit(&api, Some(&user), &form).await?;
        assert_eq!(outcome, RecommendRequest::User { user_id: user });
        assert_eq!(
            api.calls(),
            vec![Call::Survey(SurveyPreferences {
                genres: vec!["Racing".to_string()],
                platforms: vec![],
                modes: vec!["Multiplayer".to_string()],
            })]
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_form_never_submits() {
        let api = FakeApi::default();
        let user = UserId::new("ana");
        let result = submit(&api, Some(&user), &SurveyForm::new()).await;
        assert_eq!(result, Err(SurveyError::NoGenre));
        assert!(api.calls().is_empty());
    }
}
