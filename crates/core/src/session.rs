//! Signed-in identity and the login/register flow.

use thiserror::Error;
use tracing::info;

use crate::{
    api::{AuthMode, RecommenderApi},
    error::ApiError,
    models::{Credentials, UserId},
};

/// Who is using the client right now. Views receive it explicitly instead of
/// reaching into global state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<UserId>,
}

impl Session {
    /// Anonymous session.
    pub fn guest() -> Self {
        Self::default()
    }

    /// Signed-in account, if any.
    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// True once [`Session::login`] has been called.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Adopt `user` as the current identity.
    pub fn login(&mut self, user: UserId) {
        info!(user = %user, "session started");
        self.user = Some(user);
    }

    /// Forget the current identity.
    pub fn logout(&mut self) {
        if let Some(user) = self.user.take() {
            info!(user = %user, "session ended");
        }
    }
}

/// Reasons a login/register form submission did not produce a session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    /// Username or password left blank.
    #[error("Username and password are required")]
    MissingFields,
    /// The backend refused or could not be reached.
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
}

/// Submit credentials and return the identity to log in with.
pub async fn authenticate(
    api: &dyn RecommenderApi,
    mode: AuthMode,
    username: &str,
    password: &str,
) -> Result<UserId, AuthError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::MissingFields);
    }
    let credentials = Credentials {
        username: username.to_string(),
        password: password.to_string(),
    };
    api.authenticate(mode, &credentials).await?;
    info!(user = %username, mode = mode.label(), "authenticated");
    Ok(UserId::new(username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Call, FakeApi};

    #[test]
    fn login_and_logout_toggle_identity() {
        let mut session = Session::guest();
        assert!(!session.is_authenticated());
        session.login(UserId::new("ana"));
        assert_eq!(session.user().map(UserId::as_str), Some("ana"));
        session.logout();
        assert_eq!(session.user(), None);
    }

    #[tokio::test]
    async fn blank_fields_never_reach_the_backend() {
        let api = FakeApi::default();
        let result = authenticate(&api, AuthMode::Login, "   ", "secret").await;
        assert_eq!(result, Err(AuthError::MissingFields));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn rejection_message_surfaces_inline() {
        let api = FakeApi::default();
        api.fail(
            "authenticate",
            ApiError::Rejected {
                status: 401,
                message: "Invalid credentials".to_string(),
            },
        );
        let err = authenticate(&api, AuthMode::Login, "ana", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn successful_register_yields_trimmed_identity() -> Result<(), AuthError> {
        let api = FakeApi::default();
        let user = authenticate(&api, AuthMode::Register, " ana ", "pw").await?;
        assert_eq!(user, UserId::new("ana"));
        assert_eq!(
            api.calls(),
            vec![Call::Authenticate(AuthMode::Register, "ana".to_string())]
        );
        Ok(())
    }
}
