//! Quire Test Utilities
//!
//! Shared test infrastructure for the Quire workspace:
//! - Proptest generators for entity types and raw user input
//! - Re-exported in-memory collaborators
//! - Fixtures for common scenarios
//! - Assertions for Quire-specific error shapes

// Re-export mock collaborators from their source crate
pub use quire_storage::{MockBlobSource, MockIdentityProvider, MockRemoteStore};

// Re-export core types for convenience
pub use quire_core::{
    BlobRef, BookId, Comment, CommentId, Identity, NewComment, NewReview, NewTrackedBook,
    Principal, ProfileDraft, ProfileState, Progress, QuireConfig, QuireError, QuireResult,
    Rating, ReadingMetrics, ReadingStatus, RemoteError, Review, ReviewId, Timestamp,
    TrackedBook, UserProfile, ValidationError,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Quire types.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use quire_storage::MutationKind;

    // === Identity Generators ===

    pub fn arb_review_id() -> impl Strategy<Value = ReviewId> {
        (1u64..10_000).prop_map(ReviewId::new)
    }

    pub fn arb_book_id() -> impl Strategy<Value = BookId> {
        (1u64..10_000).prop_map(BookId::new)
    }

    /// Generate a principal from a small pool so sets overlap.
    pub fn arb_principal() -> impl Strategy<Value = Principal> {
        (0u8..8).prop_map(|n| Principal::new(format!("reader-{n}")))
    }

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-2030
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    // === Enum Generators ===

    pub fn arb_reading_status() -> impl Strategy<Value = ReadingStatus> {
        prop_oneof![
            Just(ReadingStatus::NotStarted),
            Just(ReadingStatus::InProgress),
            Just(ReadingStatus::Finished),
        ]
    }

    pub fn arb_mutation_kind() -> impl Strategy<Value = MutationKind> {
        prop::sample::select(MutationKind::ALL.to_vec())
    }

    // === Raw Input Generators ===

    /// Generate text a user might type into a numeric field.
    pub fn arb_raw_numeric_input() -> impl Strategy<Value = String> {
        prop_oneof![
            any::<i64>().prop_map(|n| n.to_string()),
            (-1000i64..1000).prop_map(|n| n.to_string()),
            (-1.0e6f64..1.0e6).prop_map(|f| f.to_string()),
            Just(String::new()),
            Just("NaN".to_string()),
            Just("inf".to_string()),
            "[a-z ]{0,8}",
            " *-?[0-9]{1,4} *",
        ]
    }

    /// Generate a valid rating value.
    pub fn arb_rating_value() -> impl Strategy<Value = i64> {
        1i64..=5
    }

    /// Generate an out-of-range rating value.
    pub fn arb_invalid_rating_value() -> impl Strategy<Value = i64> {
        prop_oneof![i64::MIN..1i64, 6i64..i64::MAX]
    }

    /// Generate non-blank text.
    pub fn arb_text() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,24}"
    }

    /// Generate whitespace-only text.
    pub fn arb_blank() -> impl Strategy<Value = String> {
        "[ \t\n]{0,4}"
    }

    // === Entity Generators ===

    pub fn arb_new_review() -> impl Strategy<Value = NewReview> {
        (
            arb_text(),
            arb_text(),
            prop::option::of("[0-9]{10,13}"),
            arb_rating_value(),
            arb_text(),
        )
            .prop_map(|(title, author, isbn, rating, body)| NewReview {
                title,
                author,
                isbn,
                rating,
                body,
                cover: None,
            })
    }

    /// Generate a store-shaped review whose like count matches its liker set.
    pub fn arb_review() -> impl Strategy<Value = Review> {
        (
            arb_review_id(),
            arb_new_review(),
            arb_timestamp(),
            prop::collection::btree_set(arb_principal(), 0..6),
        )
            .prop_map(|(id, draft, created_at, liked_by)| {
                Review {
                    id,
                    title: draft.title,
                    author: draft.author,
                    isbn: draft.isbn,
                    created_at,
                    body: draft.body,
                    rating: Rating::new(draft.rating).unwrap_or_else(|e| panic!("{e}")),
                    like_count: liked_by.len() as u64,
                    liked_by,
                    cover: None,
                }
            })
    }

    pub fn arb_tracked_book() -> impl Strategy<Value = TrackedBook> {
        (arb_book_id(), arb_text(), arb_text(), arb_reading_status(), 0u8..=100).prop_map(
            |(id, title, author, status, percentage)| TrackedBook {
                id,
                title,
                author,
                isbn: None,
                progress: Progress { status, percentage },
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use quire_storage::Session;
    use std::sync::Arc;

    /// The review used throughout the scenario tests.
    pub fn dune_review() -> NewReview {
        NewReview {
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            isbn: None,
            rating: 5,
            body: "The spice must flow.".to_string(),
            cover: None,
        }
    }

    pub fn dune_book() -> NewTrackedBook {
        NewTrackedBook {
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            isbn: Some("9780441013593".to_string()),
        }
    }

    pub fn reader(principal: &str) -> Identity {
        Identity::new(Principal::new(principal))
    }

    pub fn profile(name: &str) -> UserProfile {
        UserProfile {
            name: name.to_string(),
            avatar: None,
        }
    }

    /// A session against `store` for the anonymous caller.
    pub fn anonymous_session(store: &MockRemoteStore) -> Session {
        Session::new(
            QuireConfig::default(),
            Arc::new(store.clone()),
            Arc::new(MockBlobSource::new()),
            None,
        )
    }

    /// A session against `store` signed in as `principal`.
    pub fn signed_in_session(store: &MockRemoteStore, principal: &str) -> Session {
        Session::new(
            QuireConfig::default(),
            Arc::new(store.clone()),
            Arc::new(MockBlobSource::new()),
            Some(reader(principal)),
        )
    }

    /// A signed-in session whose caller already has a saved profile.
    pub fn session_with_profile(store: &MockRemoteStore, principal: &str, name: &str) -> Session {
        store.set_profile(&Principal::new(principal), profile(name));
        signed_in_session(store, principal)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Quire-specific validation.

    use super::*;

    /// Assert that a QuireResult is a validation failure.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &QuireResult<T>) {
        match result {
            Err(QuireError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a QuireResult is a remote call failure.
    #[track_caller]
    pub fn assert_remote_error<T: std::fmt::Debug>(result: &QuireResult<T>) {
        match result {
            Err(QuireError::Remote(_)) => {}
            other => panic!("Expected Remote error, got: {:?}", other),
        }
    }

    /// Assert that a review's like count equals its liker-set size.
    #[track_caller]
    pub fn assert_like_count_consistent(review: &Review) {
        assert_eq!(
            review.like_count,
            review.liked_by.len() as u64,
            "like count {} disagrees with liker set {:?}",
            review.like_count,
            review.liked_by
        );
    }
}
