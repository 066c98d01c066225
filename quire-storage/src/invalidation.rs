//! Invalidation Graph: which cached views a successful mutation stales.
//!
//! The table is static and exhaustive. A [`KeyClass`] on its own is not a
//! cache key; it is bound to the mutation's subject to produce an
//! [`InvalidationTarget`], which may match several entries (every cached
//! latest-reviews limit, for instance).

use quire_core::ReviewId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cache::{EntityKey, KeyClass};
use crate::mutation::MutationKind;

/// Key classes each mutation kind invalidates.
pub const fn invalidated_classes(kind: MutationKind) -> &'static [KeyClass] {
    match kind {
        MutationKind::AddReview => &[KeyClass::LatestReviews],
        MutationKind::LikeReview | MutationKind::UnlikeReview => {
            &[KeyClass::LatestReviews, KeyClass::Review]
        }
        MutationKind::AddComment => &[KeyClass::Comments],
        MutationKind::AddTrackedBook | MutationKind::UpdateBookProgress => {
            &[KeyClass::TrackedBooks]
        }
        MutationKind::RemoveTrackedBook | MutationKind::FinishReadingSession => {
            &[KeyClass::TrackedBooks, KeyClass::ReadingMetrics]
        }
        MutationKind::FinishBook => &[KeyClass::ReadingMetrics],
        MutationKind::SaveCallerProfile => &[KeyClass::CallerProfile],
        MutationKind::StartReadingSession => &[],
    }
}

/// A key class bound to a concrete subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationTarget {
    /// Every cached latest-reviews entry, whatever its limit.
    AllLatestReviews,
    Review(ReviewId),
    Comments(ReviewId),
    TrackedBooks,
    ReadingMetrics,
    CallerProfile,
}

impl InvalidationTarget {
    /// Bind a class to the mutation subject. Returns `None` for a
    /// review-keyed class without a review id.
    pub fn bind(class: KeyClass, subject: Option<ReviewId>) -> Option<Self> {
        let target = match class {
            KeyClass::LatestReviews => Self::AllLatestReviews,
            KeyClass::Review => Self::Review(subject?),
            KeyClass::Comments => Self::Comments(subject?),
            KeyClass::TrackedBooks => Self::TrackedBooks,
            KeyClass::ReadingMetrics => Self::ReadingMetrics,
            KeyClass::CallerProfile => Self::CallerProfile,
        };
        Some(target)
    }

    pub fn matches(&self, key: &EntityKey) -> bool {
        match (self, key) {
            (Self::AllLatestReviews, EntityKey::LatestReviews { .. }) => true,
            (Self::Review(a), EntityKey::Review(b)) => a == b,
            (Self::Comments(a), EntityKey::Comments(b)) => a == b,
            (Self::TrackedBooks, EntityKey::TrackedBooks) => true,
            (Self::ReadingMetrics, EntityKey::ReadingMetrics) => true,
            (Self::CallerProfile, EntityKey::CallerProfile) => true,
            _ => false,
        }
    }
}

impl fmt::Display for InvalidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllLatestReviews => f.write_str("latest-reviews[*]"),
            Self::Review(id) => write!(f, "review[{id}]"),
            Self::Comments(id) => write!(f, "comments[{id}]"),
            Self::TrackedBooks => f.write_str("tracked-books"),
            Self::ReadingMetrics => f.write_str("reading-metrics"),
            Self::CallerProfile => f.write_str("caller-profile"),
        }
    }
}

/// Targets a successful mutation of `kind` on `subject` must stale.
pub fn targets_for(kind: MutationKind, subject: Option<ReviewId>) -> Vec<InvalidationTarget> {
    invalidated_classes(kind)
        .iter()
        .filter_map(|class| InvalidationTarget::bind(*class, subject))
        .collect()
}
