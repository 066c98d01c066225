//! Freshness state of cache entries and the read result handed to
//! presentation.

use chrono::Utc;
use quire_core::{QuireError, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Freshness of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Freshness {
    /// Trusted: matches the store as of the last round trip.
    Fresh,
    /// Known outdated; a refetch is pending.
    Stale,
    /// Exactly one refetch is in flight.
    Fetching,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self, Self::Fetching)
    }
}

/// Snapshot of one cache entry as seen by a reader.
///
/// This is the `{data, isLoading, isError}` triple exposed upward, plus the
/// freshness metadata behind it. It is a transient copy; holding it does not
/// keep anything alive in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    data: Option<T>,
    freshness: Option<Freshness>,
    fetched_at: Option<Timestamp>,
    error: Option<QuireError>,
    enabled: bool,
}

impl<T> QueryState<T> {
    pub(crate) fn new(
        data: Option<T>,
        freshness: Option<Freshness>,
        fetched_at: Option<Timestamp>,
        error: Option<QuireError>,
    ) -> Self {
        Self {
            data,
            freshness,
            fetched_at,
            error,
            enabled: true,
        }
    }

    /// State of a read that is switched off (identity-scoped key while
    /// anonymous). Never loading, never an error.
    pub fn disabled() -> Self {
        Self {
            data: None,
            freshness: None,
            fetched_at: None,
            error: None,
            enabled: false,
        }
    }

    /// Get a reference to the last known value.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Consume the wrapper and return the last known value.
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// A fetch is in flight and there is nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching()
    }

    /// A fetch is in flight (with or without a value to show meanwhile).
    pub fn is_fetching(&self) -> bool {
        self.freshness.is_some_and(|f| f.is_fetching())
    }

    /// The last fetch failed. Any previous value is still in `data`.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&QuireError> {
        self.error.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `None` when the key has never been read.
    pub fn freshness(&self) -> Option<Freshness> {
        self.freshness
    }

    pub fn fetched_at(&self) -> Option<Timestamp> {
        self.fetched_at
    }

    /// Time since the value was last fetched from the store.
    pub fn staleness(&self) -> Option<Duration> {
        let fetched_at = self.fetched_at?;
        Some((Utc::now() - fetched_at).to_std().unwrap_or(Duration::ZERO))
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> QueryState<U>
    where
        F: FnOnce(T) -> U,
    {
        QueryState {
            data: self.data.map(f),
            freshness: self.freshness,
            fetched_at: self.fetched_at,
            error: self.error,
            enabled: self.enabled,
        }
    }

    /// Map the inner value, dropping it when `f` yields `None`.
    pub fn filter_map<U, F>(self, f: F) -> QueryState<U>
    where
        F: FnOnce(T) -> Option<U>,
    {
        QueryState {
            data: self.data.and_then(f),
            freshness: self.freshness,
            fetched_at: self.fetched_at,
            error: self.error,
            enabled: self.enabled,
        }
    }
}
