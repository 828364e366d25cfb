//! Profile screen data: stored preferences, taste stats and reset.

use tracing::{info, warn};

use crate::{
    api::RecommenderApi,
    error::ApiResult,
    models::{GenreStat, SurveyPreferences, UserId, UserStats},
};

/// Genre affinity that fills a whole bar.
pub const BAR_SCALE: f64 = 20.0;

/// Preferences and stats, each loaded independently.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileData {
    /// `GET /user/preferences/{user}`.
    pub preferences: ApiResult<SurveyPreferences>,
    /// `GET /user/stats/{user}`.
    pub stats: ApiResult<UserStats>,
}

/// Fetch both panels concurrently; one failing leaves the other usable.
pub async fn load_profile(api: &dyn RecommenderApi, user: &UserId) -> ProfileData {
    let (preferences, stats) = tokio::join!(api.preferences(user), api.stats(user));
    if let Err(err) = &preferences {
        warn!(user = %user, %err, "preferences unavailable");
    }
    if let Err(err) = &stats {
        warn!(user = %user, %err, "stats unavailable");
    }
    ProfileData { preferences, stats }
}

/// Accuracy as a whole percentage clamped to 0..=100.
pub fn accuracy_percent(stats: &UserStats) -> u16 {
    if !stats.accuracy.is_finite() {
        return 0;
    }
    stats.accuracy.clamp(0.0, 100.0).round() as u16
}

/// Bar fill for one genre, in 0..=1.
pub fn bar_fraction(stat: &GenreStat) -> f64 {
    if !stat.value.is_finite() {
        return 0.0;
    }
    (stat.value / BAR_SCALE).clamp(0.0, 1.0)
}

/// Wipe ratings and preferences for `user`.
pub async fn reset_profile(api: &dyn RecommenderApi, user: &UserId) -> ApiResult<()> {
    api.reset_profile(user).await?;
    info!(user = %user, "profile reset");
    Ok(())
}
