//! Entity records as returned by the remote store, plus the payloads the
//! client submits for writes.

use crate::enums::ReadingStatus;
use crate::error::ValidationError;
use crate::identity::{BookId, CommentId, Principal, ReviewId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// BINARY RESOURCES
// ============================================================================

/// Opaque handle to an image-like payload held by the binary resource
/// collaborator. Never dereferenced directly; see the resource resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// REVIEWS
// ============================================================================

/// Star rating of a review, always within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(raw: i64) -> Result<Self, ValidationError> {
        if raw < i64::from(Self::MIN) || raw > i64::from(Self::MAX) {
            return Err(ValidationError::invalid(
                "rating",
                format!("{raw} is outside {}..={}", Self::MIN, Self::MAX),
            ));
        }
        Ok(Self(raw as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = ValidationError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        i64::from(rating.0)
    }
}

/// A book review.
///
/// `like_count` mirrors the size of `liked_by`; the store maintains both and
/// the client never adjusts either locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub created_at: Timestamp,
    pub body: String,
    pub rating: Rating,
    pub like_count: u64,
    pub liked_by: BTreeSet<Principal>,
    pub cover: Option<BlobRef>,
}

impl Review {
    /// Whether `principal` is in the liker set as last fetched.
    pub fn is_liked_by(&self, principal: &Principal) -> bool {
        self.liked_by.contains(principal)
    }

    /// `true` when the like count agrees with the liker set.
    pub fn like_count_consistent(&self) -> bool {
        self.like_count == self.liked_by.len() as u64
    }
}

/// A comment on a review. Append-only from the client's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub review_id: ReviewId,
    pub author: String,
    pub text: String,
    pub created_at: Timestamp,
}

// ============================================================================
// READING TRACKER
// ============================================================================

/// Reading progress of a tracked book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub status: ReadingStatus,
    pub percentage: u8,
}

/// A book on the caller's personal tracking list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBook {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub progress: Progress,
}

/// A single reading session. Finishing it folds pages and hours into the
/// caller's aggregate metrics; the client does not cache sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingSession {
    pub book_id: BookId,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub pages_read: u64,
}

/// Caller-only reading totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadingMetrics {
    pub total_hours: u64,
    pub total_pages: u64,
    pub total_books: u64,
}

// ============================================================================
// PROFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub avatar: Option<BlobRef>,
}

/// Caller profile as known to the store. `Absent` means the caller has not
/// completed profile setup yet; it is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "profile", rename_all = "snake_case")]
pub enum ProfileState {
    Absent,
    Present(UserProfile),
}

impl ProfileState {
    pub fn as_profile(&self) -> Option<&UserProfile> {
        match self {
            ProfileState::Absent => None,
            ProfileState::Present(profile) => Some(profile),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ProfileState::Absent)
    }
}

impl From<Option<UserProfile>> for ProfileState {
    fn from(profile: Option<UserProfile>) -> Self {
        profile.map_or(ProfileState::Absent, ProfileState::Present)
    }
}

// ============================================================================
// WRITE PAYLOADS
// ============================================================================

/// Raw input for a new review. `rating` is unchecked until validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub rating: i64,
    pub body: String,
    pub cover: Option<BlobRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub review_id: ReviewId,
    pub author: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrackedBook {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub name: String,
    pub avatar: Option<BlobRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review(likers: &[&str]) -> Review {
        let liked_by: BTreeSet<Principal> = likers.iter().map(|p| Principal::new(*p)).collect();
        Review {
            id: ReviewId::new(1),
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            isbn: None,
            created_at: Utc::now(),
            body: "Spice".to_string(),
            rating: Rating::new(5).unwrap(),
            like_count: liked_by.len() as u64,
            liked_by,
            cover: None,
        }
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert!(Rating::new(-3).is_err());
        assert_eq!(Rating::new(1).unwrap().get(), 1);
        assert_eq!(Rating::new(5).unwrap().get(), 5);
    }

    #[test]
    fn test_rating_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Rating>("9").is_err());
        assert_eq!(serde_json::from_str::<Rating>("4").unwrap().get(), 4);
    }

    #[test]
    fn test_review_membership() {
        let review = review(&["alice", "bob"]);
        assert!(review.is_liked_by(&Principal::new("alice")));
        assert!(!review.is_liked_by(&Principal::new("carol")));
        assert!(review.like_count_consistent());
    }

    #[test]
    fn test_like_count_inconsistency_detected() {
        let mut review = review(&["alice"]);
        review.like_count = 3;
        assert!(!review.like_count_consistent());
    }

    #[test]
    fn test_profile_state_from_option() {
        assert!(ProfileState::from(None).is_absent());
        let state = ProfileState::from(Some(UserProfile {
            name: "Ada".to_string(),
            avatar: None,
        }));
        assert_eq!(state.as_profile().map(|p| p.name.as_str()), Some("Ada"));
    }

    #[test]
    fn test_profile_state_serializes_absence_explicitly() {
        let json = serde_json::to_string(&ProfileState::Absent).unwrap();
        assert_eq!(json, r#"{"state":"absent"}"#);
    }
}
