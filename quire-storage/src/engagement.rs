//! Engagement Toggle: like/unlike driven by last observed liker membership.
//!
//! "Currently liked" is always read from the liker set as last fetched from
//! the store, never from a local prediction. The toggle only chooses which
//! of the two operations to send; repeats are left to the store's own
//! idempotency.

use quire_core::{QuireResult, RemoteError, Review, ReviewId, ValidationError};
use serde::{Deserialize, Serialize};

use crate::cache::{EntityCache, EntityKey, EntityValue, Freshness};
use crate::mutation::{Mutation, MutationCoordinator, MutationKind};

/// Which operation a toggle sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LikeAction {
    Liked,
    Unliked,
}

/// The review as last observed in the cache: the single-review entry first,
/// then any cached latest-reviews list. Only Fresh entries count; a Stale or
/// Fetching entry may predate a like the caller just sent.
pub fn last_observed_review(cache: &EntityCache, id: ReviewId) -> Option<Review> {
    if let Some(EntityValue::Review(Some(review))) = fresh_value(cache, &EntityKey::Review(id)) {
        return Some(review);
    }
    cache
        .keys()
        .into_iter()
        .filter(|key| matches!(key, EntityKey::LatestReviews { .. }))
        .filter_map(|key| match fresh_value(cache, &key) {
            Some(EntityValue::Reviews(reviews)) => reviews.into_iter().find(|r| r.id == id),
            _ => None,
        })
        .next()
}

fn fresh_value(cache: &EntityCache, key: &EntityKey) -> Option<EntityValue> {
    match cache.freshness(key) {
        Some(Freshness::Fresh) => cache.peek(key),
        _ => None,
    }
}

/// Send like or unlike for `id` depending on whether the caller is in the
/// review's last observed liker set. Fetches the review first (joining any
/// in-flight refetch) if nothing Fresh about it is cached.
pub async fn toggle_like(
    cache: &EntityCache,
    coordinator: &MutationCoordinator,
    id: ReviewId,
) -> QuireResult<LikeAction> {
    let Some(identity) = coordinator.identity() else {
        return Err(ValidationError::IdentityRequired {
            operation: MutationKind::LikeReview.to_string(),
        }
        .into());
    };

    let review = match last_observed_review(cache, id) {
        Some(review) => review,
        None => cache
            .fetch_as::<Option<Review>>(&EntityKey::Review(id))
            .await?
            .ok_or_else(|| RemoteError::NotFound {
                entity: "Review".to_string(),
                id: id.get(),
            })?,
    };

    let (mutation, action) = if review.is_liked_by(identity.principal()) {
        (Mutation::UnlikeReview(id), LikeAction::Unliked)
    } else {
        (Mutation::LikeReview(id), LikeAction::Liked)
    };
    tracing::debug!(review = %id, action = ?action, "Toggling like");
    coordinator.perform(mutation).await?;
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, RemoteFetcher};
    use crate::mock::MockRemoteStore;
    use crate::remote::RemoteConnector;
    use quire_core::{Identity, NewReview, Principal, QuireError};
    use std::sync::Arc;

    struct Harness {
        store: MockRemoteStore,
        cache: EntityCache,
        coordinator: MutationCoordinator,
    }

    fn harness(principal: Option<&str>) -> Harness {
        let store = MockRemoteStore::new();
        let identity = principal.map(|p| Identity::new(Principal::new(p)));
        let remote = store.connect(identity.as_ref());
        let cache = EntityCache::new(
            Arc::new(RemoteFetcher::new(remote.clone())),
            CacheConfig::new(),
        );
        let coordinator = MutationCoordinator::new(remote, cache.clone(), identity);
        Harness {
            store,
            cache,
            coordinator,
        }
    }

    fn seed_review(store: &MockRemoteStore) -> ReviewId {
        store.seed_review(NewReview {
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            isbn: None,
            rating: 5,
            body: "Spice".to_string(),
            cover: None,
        })
    }

    #[tokio::test]
    async fn test_toggle_likes_then_unlikes() {
        let h = harness(Some("reader-1"));
        let id = seed_review(&h.store);

        let first = toggle_like(&h.cache, &h.coordinator, id).await.unwrap();
        assert_eq!(first, LikeAction::Liked);
        let review: Option<Review> = h.cache.fetch_as(&EntityKey::Review(id)).await.unwrap();
        let review = review.unwrap();
        assert_eq!(review.like_count, 1);
        assert!(review.is_liked_by(&Principal::new("reader-1")));

        let second = toggle_like(&h.cache, &h.coordinator, id).await.unwrap();
        assert_eq!(second, LikeAction::Unliked);
        let review: Option<Review> = h.cache.fetch_as(&EntityKey::Review(id)).await.unwrap();
        assert_eq!(review.unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn test_consecutive_toggles_alternate_without_reload() {
        let h = harness(Some("reader-1"));
        let id = seed_review(&h.store);
        h.cache.fetch(&EntityKey::Review(id)).await.unwrap();
        h.cache
            .fetch(&EntityKey::LatestReviews { limit: 50 })
            .await
            .unwrap();

        let first = toggle_like(&h.cache, &h.coordinator, id).await.unwrap();
        assert_eq!(first, LikeAction::Liked);
        assert_eq!(h.cache.freshness(&EntityKey::Review(id)), Some(Freshness::Stale));

        let second = toggle_like(&h.cache, &h.coordinator, id).await.unwrap();
        assert_eq!(second, LikeAction::Unliked);
        assert_eq!(h.store.call_count("likeReview"), 1);
        assert_eq!(h.store.call_count("unlikeReview"), 1);
        assert_eq!(h.store.review(id).unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn test_toggle_joins_observed_refetch() {
        let h = harness(Some("reader-1"));
        let id = seed_review(&h.store);
        let key = EntityKey::Review(id);
        let mut observer = h.cache.observe(&key);
        observer.settled().await;

        assert_eq!(toggle_like(&h.cache, &h.coordinator, id).await.unwrap(), LikeAction::Liked);
        assert_eq!(toggle_like(&h.cache, &h.coordinator, id).await.unwrap(), LikeAction::Unliked);
        assert_eq!(toggle_like(&h.cache, &h.coordinator, id).await.unwrap(), LikeAction::Liked);
        assert_eq!(h.store.call_count("likeReview"), 2);
        assert_eq!(h.store.call_count("unlikeReview"), 1);
    }

    #[tokio::test]
    async fn test_decision_uses_last_observed_membership() {
        let h = harness(Some("reader-1"));
        let id = seed_review(&h.store);
        h.cache.fetch(&EntityKey::Review(id)).await.unwrap();

        // Liked behind the cache's back: the cached entry still says "not liked".
        h.store.like_as(id, &Principal::new("reader-1"));
        let action = toggle_like(&h.cache, &h.coordinator, id).await.unwrap();
        assert_eq!(action, LikeAction::Liked);
        assert_eq!(h.store.call_count("likeReview"), 1);

        let review: Option<Review> = h.cache.fetch_as(&EntityKey::Review(id)).await.unwrap();
        assert_eq!(review.unwrap().like_count, 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_latest_list() {
        let h = harness(Some("reader-1"));
        let id = seed_review(&h.store);
        h.cache
            .fetch(&EntityKey::LatestReviews { limit: 50 })
            .await
            .unwrap();

        let observed = last_observed_review(&h.cache, id).unwrap();
        assert_eq!(observed.title, "Dune");
        toggle_like(&h.cache, &h.coordinator, id).await.unwrap();
        assert_eq!(h.store.call_count("getReview"), 0);
    }

    #[tokio::test]
    async fn test_missing_review_is_not_found() {
        let h = harness(Some("reader-1"));
        let err = toggle_like(&h.cache, &h.coordinator, ReviewId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, QuireError::Remote(RemoteError::NotFound { id: 404, .. })));
        assert_eq!(h.store.call_count("likeReview"), 0);
    }

    #[tokio::test]
    async fn test_anonymous_toggle_rejected() {
        let h = harness(None);
        let id = seed_review(&h.store);
        let err = toggle_like(&h.cache, &h.coordinator, id).await.unwrap_err();
        assert!(err.is_validation());
    }
}
