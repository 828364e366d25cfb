//! Personal library: status tabs, optimistic status changes and the
//! `Remove` choice.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::{
    api::RecommenderApi,
    error::ApiResult,
    models::{GameId, LibraryEntry, LibraryStatus, UserId},
    reconcile::{self, InFlight, MutationKey, Resolution},
};

/// Label of the pseudo-status that deletes an entry.
pub const REMOVE_LABEL: &str = "Remove";

/// A pick from the status chooser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryChoice {
    /// Store this status.
    Set(LibraryStatus),
    /// Delete the entry altogether.
    Remove,
}

impl LibraryChoice {
    /// Chooser entries: every status, plus `Remove` once the game is in the
    /// library.
    pub fn options(in_library: bool) -> Vec<LibraryChoice> {
        let mut options: Vec<LibraryChoice> =
            LibraryStatus::ALL.iter().copied().map(LibraryChoice::Set).collect();
        if in_library {
            options.push(LibraryChoice::Remove);
        }
        options
    }

    /// Chooser label.
    pub fn label(self) -> &'static str {
        match self {
            LibraryChoice::Set(status) => status.label(),
            LibraryChoice::Remove => REMOVE_LABEL,
        }
    }

    /// Parse a chooser label.
    pub fn from_label(label: &str) -> Option<Self> {
        if label == REMOVE_LABEL {
            return Some(LibraryChoice::Remove);
        }
        LibraryStatus::ALL
            .iter()
            .copied()
            .find(|status| status.label() == label)
            .map(LibraryChoice::Set)
    }
}

/// Status filter tabs on the library screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibraryTab {
    /// Every entry.
    #[default]
    All,
    /// Entries with one status.
    Only(LibraryStatus),
}

impl LibraryTab {
    /// Tabs in display order.
    pub const ALL: [LibraryTab; 5] = [
        LibraryTab::All,
        LibraryTab::Only(LibraryStatus::Playing),
        LibraryTab::Only(LibraryStatus::Completed),
        LibraryTab::Only(LibraryStatus::PlanToPlay),
        LibraryTab::Only(LibraryStatus::Dropped),
    ];

    /// Tab title.
    pub fn label(self) -> &'static str {
        match self {
            LibraryTab::All => "All",
            LibraryTab::Only(status) => status.label(),
        }
    }

    /// Whether `entry` belongs under this tab.
    pub fn admits(self, entry: &LibraryEntry) -> bool {
        match self {
            LibraryTab::All => true,
            LibraryTab::Only(status) => entry.status == status,
        }
    }
}

/// A library change to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryMutation {
    /// Account owning the library.
    pub user: UserId,
    /// Affected game.
    pub game_id: GameId,
    /// What to store.
    pub choice: LibraryChoice,
}

impl LibraryMutation {
    fn key(&self) -> MutationKey {
        (self.user.clone(), self.game_id.clone())
    }
}

/// Result of offering a chooser pick to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryOutcome {
    /// Nobody is signed in; nothing changed.
    LoginRequired,
    /// A call for this game is outstanding; the pick was coalesced.
    Coalesced,
    /// The pick matches the current state; nothing to send.
    Unchanged,
    /// Applied optimistically; persist this.
    Submit(LibraryMutation),
}

/// Resolution of a library mutation; the snapshot is the full library.
pub type LibraryResolution = Resolution<LibraryMutation, Vec<LibraryEntry>>;

/// Library rows as displayed, with the last confirmed rows kept aside for
/// the no-snapshot failure path.
#[derive(Debug, Clone, Default)]
pub struct LibraryView {
    entries: Vec<LibraryEntry>,
    confirmed: Vec<LibraryEntry>,
    in_flight: InFlight<MutationKey>,
}

impl LibraryView {
    /// Empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all rows with `GET /library/{user}`. Games with a call
    /// outstanding keep their optimistic row.
    pub fn load(&mut self, entries: Vec<LibraryEntry>) {
        let mut merged: Vec<LibraryEntry> = entries
            .iter()
            .filter(|entry| !self.is_pending(&entry.game_id))
            .cloned()
            .collect();
        merged.extend(
            self.entries
                .iter()
                .filter(|entry| self.is_pending(&entry.game_id))
                .cloned(),
        );
        self.confirmed = entries;
        self.entries = merged;
        info!(entries = self.entries.len(), "library loaded");
    }

    /// Rows under `tab`.
    pub fn visible(&self, tab: LibraryTab) -> Vec<&LibraryEntry> {
        self.entries.iter().filter(|entry| tab.admits(entry)).collect()
    }

    /// Row count under `tab`.
    pub fn count(&self, tab: LibraryTab) -> usize {
        self.entries.iter().filter(|entry| tab.admits(entry)).count()
    }

    /// Current row for `game_id`.
    pub fn entry(&self, game_id: &GameId) -> Option<&LibraryEntry> {
        self.entries.iter().find(|entry| &entry.game_id == game_id)
    }

    /// Displayed status; absent games read as `Add to Library`.
    pub fn status_of(&self, game_id: &GameId) -> LibraryStatus {
        self.entry(game_id)
            .map(|entry| entry.status)
            .unwrap_or(LibraryStatus::AddToLibrary)
    }

    /// Whether `game_id` has a row.
    pub fn contains(&self, game_id: &GameId) -> bool {
        self.entry(game_id).is_some()
    }

    /// Whether a call for `game_id` is outstanding.
    pub fn is_pending(&self, game_id: &GameId) -> bool {
        self.in_flight.iter().any(|(_, pending)| pending == game_id)
    }

    /// Apply `choice` optimistically and return the call to make.
    pub fn choose(
        &mut self,
        user: Option<&UserId>,
        game_id: &GameId,
        choice: LibraryChoice,
    ) -> LibraryOutcome {
        let Some(user) = user else {
            return LibraryOutcome::LoginRequired;
        };
        let unchanged = match choice {
            LibraryChoice::Remove => !self.contains(game_id),
            LibraryChoice::Set(status) => {
                self.entry(game_id).map(|entry| entry.status) == Some(status)
            }
        };
        if unchanged {
            return LibraryOutcome::Unchanged;
        }
        let mutation = LibraryMutation {
            user: user.clone(),
            game_id: game_id.clone(),
            choice,
        };
        if !self.in_flight.try_begin(mutation.key()) {
            debug!(game_id = %game_id, "library change coalesced with outstanding call");
            return LibraryOutcome::Coalesced;
        }
        apply(&mut self.entries, game_id, choice);
        info!(game_id = %game_id, choice = choice.label(), "optimistic library change applied");
        LibraryOutcome::Submit(mutation)
    }

    /// Fold a finished call back into the view.
    pub fn resolve(&mut self, resolution: &LibraryResolution) {
        let mutation = resolution.mutation();
        self.in_flight.finish(&mutation.key());
        match resolution {
            Resolution::Confirmed(mutation) => {
                apply(&mut self.confirmed, &mutation.game_id, mutation.choice);
            }
            Resolution::Reconciled { snapshot, .. } => self.load(snapshot.clone()),
            Resolution::Unresolved { mutation, .. } => {
                let previous = self
                    .confirmed
                    .iter()
                    .find(|entry| entry.game_id == mutation.game_id)
                    .cloned();
                let position = self
                    .entries
                    .iter()
                    .position(|entry| entry.game_id == mutation.game_id);
                match (position, previous) {
                    (Some(index), Some(entry)) => self.entries[index] = entry,
                    (Some(index), None) => {
                        self.entries.remove(index);
                    }
                    (None, Some(entry)) => self.entries.push(entry),
                    (None, None) => {}
                }
            }
        }
    }
}

fn apply(entries: &mut Vec<LibraryEntry>, game_id: &GameId, choice: LibraryChoice) {
    match choice {
        LibraryChoice::Remove => entries.retain(|entry| &entry.game_id != game_id),
        LibraryChoice::Set(status) => {
            match entries.iter_mut().find(|entry| &entry.game_id == game_id) {
                Some(entry) => entry.status = status,
                None => entries.push(LibraryEntry {
                    game_id: game_id.clone(),
                    status,
                    date: None,
                    title: None,
                    image: None,
                }),
            }
        }
    }
}

/// Persists library mutations and refetches the library when one fails.
#[derive(Clone)]
pub struct LibraryReconciler {
    api: Arc<dyn RecommenderApi>,
    timeout: Duration,
}

impl LibraryReconciler {
    /// New reconciler over `api`.
    pub fn new(api: Arc<dyn RecommenderApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// `/library/update` for a status, `/library/delete` for `Remove`.
    pub async fn persist(&self, mutation: &LibraryMutation) -> ApiResult<()> {
        match mutation.choice {
            LibraryChoice::Set(status) => {
                self.api
                    .update_library(&mutation.user, &mutation.game_id, status)
                    .await
            }
            LibraryChoice::Remove => {
                self.api
                    .remove_from_library(&mutation.user, &mutation.game_id)
                    .await
            }
        }
    }

    /// Persist `mutation`, refetching the library on failure.
    pub async fn run(&self, mutation: LibraryMutation) -> LibraryResolution {
        let target = mutation.clone();
        let user = mutation.user.clone();
        reconcile::resolve(
            mutation,
            self.timeout,
            async move { self.persist(&target).await },
            || async move { self.api.library(&user).await },
        )
        .await
    }
}
