use proptest::prelude::*;
use quire_core::{BookId, NewComment, ProfileDraft, ReviewId};
use quire_storage::{
    invalidated_classes, parse_numeric_input, sanitize_count, sanitize_percentage, EntityKey,
    Freshness, Mutation, MutationKind, MockRemoteStore, Session,
};
use quire_test_utils::assertions::assert_like_count_consistent;
use quire_test_utils::fixtures::{dune_book, dune_review, session_with_profile, signed_in_session};
use quire_test_utils::generators::{
    arb_blank, arb_invalid_rating_value, arb_mutation_kind, arb_new_review, arb_principal,
    arb_raw_numeric_input, arb_review,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

/// A valid mutation of `kind` against the seeded review and book.
fn mutation_for(kind: MutationKind, review: ReviewId, book: BookId) -> Mutation {
    match kind {
        MutationKind::AddReview => Mutation::AddReview(dune_review()),
        MutationKind::LikeReview => Mutation::LikeReview(review),
        MutationKind::UnlikeReview => Mutation::UnlikeReview(review),
        MutationKind::AddComment => Mutation::AddComment(NewComment {
            review_id: review,
            author: "Ada".to_string(),
            text: "Loved it".to_string(),
        }),
        MutationKind::AddTrackedBook => Mutation::AddTrackedBook(dune_book()),
        MutationKind::UpdateBookProgress => Mutation::UpdateBookProgress {
            book_id: book,
            status: quire_core::ReadingStatus::InProgress,
            percentage: 50,
        },
        MutationKind::RemoveTrackedBook => Mutation::RemoveTrackedBook(book),
        MutationKind::StartReadingSession => Mutation::StartReadingSession(book),
        MutationKind::FinishReadingSession => Mutation::FinishReadingSession {
            book_id: book,
            pages_read: 10,
            hours_spent: 1,
        },
        MutationKind::FinishBook => Mutation::FinishBook,
        MutationKind::SaveCallerProfile => Mutation::SaveCallerProfile(ProfileDraft {
            name: "Ada".to_string(),
            avatar: None,
        }),
    }
}

async fn seeded(store: &MockRemoteStore) -> (Session, ReviewId, BookId) {
    let review = store.seed_review(dune_review());
    let session = session_with_profile(store, "reader-1", "Ada");
    let book = session.add_tracked_book(dune_book()).await.unwrap();
    (session, review, book)
}

fn all_keys(session: &Session, review: ReviewId) -> Vec<EntityKey> {
    vec![
        session.latest_reviews_key(),
        EntityKey::LatestReviews { limit: 5 },
        EntityKey::Review(review),
        EntityKey::Comments(review),
        EntityKey::TrackedBooks,
        EntityKey::ReadingMetrics,
        EntityKey::CallerProfile,
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ========================================================================
    // Progress sanitation
    // ========================================================================

    #[test]
    fn percentage_always_in_range(raw in arb_raw_numeric_input()) {
        let pct = sanitize_percentage(&raw);
        prop_assert!(pct <= 100);
        let parsed = parse_numeric_input(&raw);
        prop_assert_eq!(i64::from(pct), parsed.clamp(0, 100));
    }

    #[test]
    fn counts_never_negative(raw in arb_raw_numeric_input()) {
        let count = sanitize_count(&raw);
        let parsed = parse_numeric_input(&raw);
        prop_assert_eq!(count, parsed.max(0) as u64);
    }

    #[test]
    fn whole_numbers_parse_exactly(n in 0u32..1_000_000) {
        prop_assert_eq!(sanitize_count(&n.to_string()), u64::from(n));
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn blank_titles_rejected_without_remote_call(title in arb_blank(), review in arb_new_review()) {
        let store = MockRemoteStore::new();
        let session = signed_in_session(&store, "reader-1");
        let mut review = review;
        review.title = title;
        let result = runtime().block_on(session.add_review(review));
        prop_assert!(result.unwrap_err().is_validation());
        prop_assert_eq!(store.total_calls(), 0);
    }

    #[test]
    fn out_of_range_ratings_rejected(rating in arb_invalid_rating_value(), review in arb_new_review()) {
        let store = MockRemoteStore::new();
        let session = signed_in_session(&store, "reader-1");
        let mut review = review;
        review.rating = rating;
        let result = runtime().block_on(session.add_review(review));
        prop_assert!(result.unwrap_err().is_validation());
        prop_assert_eq!(store.call_count("addReview"), 0);
    }

    // ========================================================================
    // Invalidation Graph
    // ========================================================================

    #[test]
    fn successful_mutation_stales_exactly_its_keys(kind in arb_mutation_kind()) {
        let store = MockRemoteStore::new();
        runtime().block_on(async {
            let (session, review, book) = seeded(&store).await;
            let keys = all_keys(&session, review);
            for key in &keys {
                session.cache().fetch(key).await.unwrap();
            }

            session.perform(mutation_for(kind, review, book)).await.unwrap();

            let classes = invalidated_classes(kind);
            for key in &keys {
                let expected = if classes.contains(&key.class()) {
                    Freshness::Stale
                } else {
                    Freshness::Fresh
                };
                assert_eq!(session.cache().freshness(key), Some(expected), "{kind} / {key}");
            }

            // Stale keys come back Fresh on the next read.
            for key in &keys {
                session.cache().fetch(key).await.unwrap();
                assert_eq!(session.cache().freshness(key), Some(Freshness::Fresh));
            }
        });
    }

    #[test]
    fn failed_mutation_stales_nothing(kind in arb_mutation_kind()) {
        let store = MockRemoteStore::new();
        runtime().block_on(async {
            let (session, review, book) = seeded(&store).await;
            let keys = all_keys(&session, review);
            for key in &keys {
                session.cache().fetch(key).await.unwrap();
            }
            store.fail_next(
                kind.as_str(),
                quire_core::RemoteError::call_failed(kind.as_str(), "offline"),
            );

            assert!(session.perform(mutation_for(kind, review, book)).await.is_err());
            for key in &keys {
                assert_eq!(session.cache().freshness(key), Some(Freshness::Fresh));
            }
        });
    }

    // ========================================================================
    // Engagement
    // ========================================================================

    #[test]
    fn like_count_matches_liker_set(ops in prop::collection::vec((arb_principal(), any::<bool>()), 1..16)) {
        let store = MockRemoteStore::new();
        let review = store.seed_review(dune_review());
        runtime().block_on(async {
            let mut expected = std::collections::BTreeSet::new();
            for (principal, like) in &ops {
                let session = signed_in_session(&store, principal.as_str());
                let mutation = if *like {
                    expected.insert(principal.clone());
                    Mutation::LikeReview(review)
                } else {
                    expected.remove(principal);
                    Mutation::UnlikeReview(review)
                };
                session.perform(mutation).await.unwrap();
            }
            let observer = signed_in_session(&store, "observer");
            let loaded = observer.load_review(review).await.unwrap().unwrap();
            assert_like_count_consistent(&loaded);
            assert_eq!(loaded.liked_by, expected);
        });
    }

    #[test]
    fn generated_reviews_are_consistent(review in arb_review()) {
        prop_assert!(review.like_count_consistent());
        prop_assert!((1..=5).contains(&review.rating.get()));
    }
}

