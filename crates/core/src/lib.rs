#![warn(clippy::all, missing_docs)]

//! Core domain logic for the GameRec terminal client.
//!
//! This crate hosts the backend seam and HTTP client, the data models,
//! configuration handling, and the view state machines (catalog, survey,
//! recommendations, feedback, library, history, profile) used by the
//! terminal UI and any future frontends.

pub mod api;
pub mod catalog;
pub mod config;
pub mod detail;
pub mod error;
pub mod feedback;
pub mod history;
pub mod library;
pub mod models;
pub mod profile;
pub mod reconcile;
pub mod recommend;
pub mod session;
pub mod survey;

pub use api::{AuthMode, HttpApi, RecommendRequest, RecommenderApi};
pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use models::{Game, GameId, LibraryEntry, LibraryStatus, UserId};
pub use session::Session;
