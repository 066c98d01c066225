//! Cached value types, the fetcher seam, and cache statistics.

use async_trait::async_trait;
use quire_core::{
    Comment, ProfileState, QuireResult, ReadingMetrics, Review, TrackedBook,
};

use super::key::EntityKey;
use crate::remote::RemoteHandle;

/// Value stored under an [`EntityKey`]. One variant per key class.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityValue {
    Reviews(Vec<Review>),
    /// `None` when the store has no such review.
    Review(Option<Review>),
    Comments(Vec<Comment>),
    TrackedBooks(Vec<TrackedBook>),
    ReadingMetrics(Option<ReadingMetrics>),
    CallerProfile(ProfileState),
}

/// Types that can be pulled out of an [`EntityValue`].
///
/// Typed readers on the session go through this so a key and the type read
/// from it cannot drift apart silently.
pub trait CachedEntity: Clone + Send + Sync + 'static {
    fn from_value(value: EntityValue) -> Option<Self>;
}

impl CachedEntity for Vec<Review> {
    fn from_value(value: EntityValue) -> Option<Self> {
        match value {
            EntityValue::Reviews(reviews) => Some(reviews),
            _ => None,
        }
    }
}

impl CachedEntity for Option<Review> {
    fn from_value(value: EntityValue) -> Option<Self> {
        match value {
            EntityValue::Review(review) => Some(review),
            _ => None,
        }
    }
}

impl CachedEntity for Vec<Comment> {
    fn from_value(value: EntityValue) -> Option<Self> {
        match value {
            EntityValue::Comments(comments) => Some(comments),
            _ => None,
        }
    }
}

impl CachedEntity for Vec<TrackedBook> {
    fn from_value(value: EntityValue) -> Option<Self> {
        match value {
            EntityValue::TrackedBooks(books) => Some(books),
            _ => None,
        }
    }
}

impl CachedEntity for Option<ReadingMetrics> {
    fn from_value(value: EntityValue) -> Option<Self> {
        match value {
            EntityValue::ReadingMetrics(metrics) => Some(metrics),
            _ => None,
        }
    }
}

impl CachedEntity for ProfileState {
    fn from_value(value: EntityValue) -> Option<Self> {
        match value {
            EntityValue::CallerProfile(profile) => Some(profile),
            _ => None,
        }
    }
}

/// Fetcher for retrieving entity values from the source of truth.
///
/// This trait abstracts over the remote store so the cache can be driven by
/// any backend, including test doubles that count or stall calls.
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    async fn fetch(&self, key: &EntityKey) -> QuireResult<EntityValue>;
}

/// [`EntityFetcher`] that maps each key class onto its remote read.
#[derive(Clone)]
pub struct RemoteFetcher {
    remote: RemoteHandle,
}

impl RemoteFetcher {
    pub fn new(remote: RemoteHandle) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl EntityFetcher for RemoteFetcher {
    async fn fetch(&self, key: &EntityKey) -> QuireResult<EntityValue> {
        let value = match *key {
            EntityKey::LatestReviews { limit } => {
                EntityValue::Reviews(self.remote.get_latest_reviews(limit).await?)
            }
            EntityKey::Review(id) => EntityValue::Review(self.remote.get_review(id).await?),
            EntityKey::Comments(id) => EntityValue::Comments(self.remote.get_comments(id).await?),
            EntityKey::TrackedBooks => {
                EntityValue::TrackedBooks(self.remote.get_tracked_books().await?)
            }
            EntityKey::ReadingMetrics => {
                EntityValue::ReadingMetrics(self.remote.get_reading_metrics().await?)
            }
            EntityKey::CallerProfile => {
                EntityValue::CallerProfile(self.remote.get_caller_profile().await?)
            }
        };
        Ok(value)
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from a fresh entry.
    pub hits: u64,
    /// Reads that found the entry absent or stale.
    pub misses: u64,
    /// Round trips actually issued to the fetcher.
    pub network_fetches: u64,
    /// Entries marked stale by mutations.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{ReadingMetrics, UserProfile};

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_cache_stats_empty() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_cached_entity_extracts_matching_variant() {
        let metrics = ReadingMetrics {
            total_hours: 2,
            total_pages: 40,
            total_books: 0,
        };
        let value = EntityValue::ReadingMetrics(Some(metrics));
        assert_eq!(
            <Option<ReadingMetrics>>::from_value(value.clone()),
            Some(Some(metrics))
        );
        assert_eq!(<Vec<Review>>::from_value(value), None);
    }

    #[test]
    fn test_cached_entity_profile() {
        let profile = ProfileState::Present(UserProfile {
            name: "Ada".to_string(),
            avatar: None,
        });
        let value = EntityValue::CallerProfile(profile.clone());
        assert_eq!(ProfileState::from_value(value), Some(profile));
    }
}
