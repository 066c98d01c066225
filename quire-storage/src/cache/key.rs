//! Entity keys for the client cache.
//!
//! An [`EntityKey`] names one cacheable piece of remote state: a key class
//! plus an optional identity. Singleton keys (tracked books, metrics,
//! caller profile) are implicitly scoped to the session's caller, because a
//! cache never outlives the identity it was created for.

use quire_core::ReviewId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key class discriminator, shared by cache keys and the invalidation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyClass {
    LatestReviews,
    Review,
    Comments,
    TrackedBooks,
    ReadingMetrics,
    CallerProfile,
}

impl KeyClass {
    /// Classes whose reads require an authenticated caller.
    pub fn is_identity_scoped(&self) -> bool {
        matches!(
            self,
            KeyClass::TrackedBooks | KeyClass::ReadingMetrics | KeyClass::CallerProfile
        )
    }
}

impl fmt::Display for KeyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            KeyClass::LatestReviews => "latest-reviews",
            KeyClass::Review => "review",
            KeyClass::Comments => "comments",
            KeyClass::TrackedBooks => "tracked-books",
            KeyClass::ReadingMetrics => "reading-metrics",
            KeyClass::CallerProfile => "caller-profile",
        };
        f.write_str(value)
    }
}

/// Identifier of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKey {
    /// The latest-reviews feed. Each limit is its own entry.
    LatestReviews { limit: u32 },
    Review(ReviewId),
    Comments(ReviewId),
    TrackedBooks,
    ReadingMetrics,
    CallerProfile,
}

impl EntityKey {
    pub fn class(&self) -> KeyClass {
        match self {
            EntityKey::LatestReviews { .. } => KeyClass::LatestReviews,
            EntityKey::Review(_) => KeyClass::Review,
            EntityKey::Comments(_) => KeyClass::Comments,
            EntityKey::TrackedBooks => KeyClass::TrackedBooks,
            EntityKey::ReadingMetrics => KeyClass::ReadingMetrics,
            EntityKey::CallerProfile => KeyClass::CallerProfile,
        }
    }

    /// The review this key belongs to, if any.
    pub fn review_id(&self) -> Option<ReviewId> {
        match self {
            EntityKey::Review(id) | EntityKey::Comments(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_identity_scoped(&self) -> bool {
        self.class().is_identity_scoped()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::LatestReviews { limit } => write!(f, "latest-reviews[{limit}]"),
            EntityKey::Review(id) => write!(f, "review[{id}]"),
            EntityKey::Comments(id) => write!(f, "comments[{id}]"),
            other => write!(f, "{}", other.class()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_class_round_trip() {
        assert_eq!(EntityKey::LatestReviews { limit: 50 }.class(), KeyClass::LatestReviews);
        assert_eq!(EntityKey::Review(ReviewId::new(1)).class(), KeyClass::Review);
        assert_eq!(EntityKey::Comments(ReviewId::new(1)).class(), KeyClass::Comments);
        assert_eq!(EntityKey::TrackedBooks.class(), KeyClass::TrackedBooks);
        assert_eq!(EntityKey::ReadingMetrics.class(), KeyClass::ReadingMetrics);
        assert_eq!(EntityKey::CallerProfile.class(), KeyClass::CallerProfile);
    }

    #[test]
    fn test_identity_scoped_keys() {
        assert!(EntityKey::TrackedBooks.is_identity_scoped());
        assert!(EntityKey::ReadingMetrics.is_identity_scoped());
        assert!(EntityKey::CallerProfile.is_identity_scoped());
        assert!(!EntityKey::LatestReviews { limit: 10 }.is_identity_scoped());
        assert!(!EntityKey::Review(ReviewId::new(3)).is_identity_scoped());
    }

    #[test]
    fn test_keys_are_unique_per_identity() {
        let keys: HashSet<EntityKey> = [
            EntityKey::Review(ReviewId::new(1)),
            EntityKey::Review(ReviewId::new(1)),
            EntityKey::Review(ReviewId::new(2)),
            EntityKey::Comments(ReviewId::new(1)),
            EntityKey::LatestReviews { limit: 10 },
            EntityKey::LatestReviews { limit: 50 },
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn test_display() {
        assert_eq!(EntityKey::Review(ReviewId::new(7)).to_string(), "review[7]");
        assert_eq!(EntityKey::ReadingMetrics.to_string(), "reading-metrics");
        assert_eq!(EntityKey::LatestReviews { limit: 50 }.to_string(), "latest-reviews[50]");
    }
}
