//! Shared plumbing for optimistic mutations: per-key in-flight tracking,
//! bounded calls, and refetch-on-failure resolution.

use std::{collections::HashSet, future::Future, hash::Hash, time::Duration};

use tracing::{debug, warn};

use crate::{
    error::{ApiError, ApiResult},
    models::{GameId, UserId},
};

/// Key serializing mutations: one outstanding call per user and game.
pub type MutationKey = (UserId, GameId);

/// Keys with a mutating call outstanding.
#[derive(Debug, Clone)]
pub struct InFlight<K> {
    keys: HashSet<K>,
}

impl<K> Default for InFlight<K> {
    fn default() -> Self {
        Self {
            keys: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash> InFlight<K> {
    /// Claim `key`; `false` when a call for it is already outstanding.
    pub fn try_begin(&mut self, key: K) -> bool {
        self.keys.insert(key)
    }

    /// Release `key` once its call has settled.
    pub fn finish(&mut self, key: &K) -> bool {
        self.keys.remove(key)
    }

    /// Whether `key` is outstanding.
    pub fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Outstanding keys, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }
}

/// How an optimistic mutation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<M, S> {
    /// The backend accepted the change; the optimistic state stands.
    Confirmed(M),
    /// The change failed and a fresh authoritative snapshot was fetched.
    Reconciled {
        /// The failed mutation.
        mutation: M,
        /// Why it failed.
        error: ApiError,
        /// Server state to reconverge on.
        snapshot: S,
    },
    /// The change failed and so did the refetch.
    Unresolved {
        /// The failed mutation.
        mutation: M,
        /// Why it failed.
        error: ApiError,
        /// Why the refetch failed.
        refetch_error: ApiError,
    },
}

impl<M, S> Resolution<M, S> {
    /// The mutation this resolution settles.
    pub fn mutation(&self) -> &M {
        match self {
            Resolution::Confirmed(mutation)
            | Resolution::Reconciled { mutation, .. }
            | Resolution::Unresolved { mutation, .. } => mutation,
        }
    }

    /// True when the backend accepted the change.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Resolution::Confirmed(_))
    }
}

/// Run `call`, failing with [`ApiError::Timeout`] once `limit` elapses.
pub async fn bounded<T, F>(limit: Duration, call: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(limit.as_secs())),
    }
}

/// Await `persist`; on failure fetch the authoritative snapshot instead of
/// inverting the optimistic change locally.
pub async fn resolve<M, S, P, R, RF>(
    mutation: M,
    limit: Duration,
    persist: P,
    refetch: R,
) -> Resolution<M, S>
where
    P: Future<Output = ApiResult<()>>,
    R: FnOnce() -> RF,
    RF: Future<Output = ApiResult<S>>,
{
    let error = match bounded(limit, persist).await {
        Ok(()) => return Resolution::Confirmed(mutation),
        Err(error) => error,
    };
    warn!(%error, "mutation failed; refetching authoritative state");
    match bounded(limit, refetch()).await {
        Ok(snapshot) => {
            debug!("authoritative state refetched");
            Resolution::Reconciled {
                mutation,
                error,
                snapshot,
            }
        }
        Err(refetch_error) => {
            warn!(%refetch_error, "refetch after failed mutation also failed");
            Resolution::Unresolved {
                mutation,
                error,
                refetch_error,
            }
        }
    }
}
