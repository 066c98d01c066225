//! Mutation Coordinator.
//!
//! Sequence for every write: validate the payload locally, issue the remote
//! call, and only on success apply the Invalidation Graph. Failures are
//! returned untouched; nothing is retried and nothing is invalidated. This
//! is the only place that calls [`EntityCache::invalidate`].

use quire_core::{
    BookId, CommentId, Identity, NewComment, NewReview, NewTrackedBook, ProfileDraft,
    QuireResult, Rating, ReadingStatus, ReviewId, UserProfile, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cache::{EntityCache, EntityKey};
use crate::invalidation::targets_for;
use crate::progress::clamp_percentage;
use crate::remote::RemoteHandle;

// ============================================================================
// MUTATION TYPES
// ============================================================================

/// Fieldless discriminant of [`Mutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    AddReview,
    LikeReview,
    UnlikeReview,
    AddComment,
    AddTrackedBook,
    UpdateBookProgress,
    RemoveTrackedBook,
    StartReadingSession,
    FinishReadingSession,
    FinishBook,
    SaveCallerProfile,
}

impl MutationKind {
    pub const ALL: [MutationKind; 11] = [
        MutationKind::AddReview,
        MutationKind::LikeReview,
        MutationKind::UnlikeReview,
        MutationKind::AddComment,
        MutationKind::AddTrackedBook,
        MutationKind::UpdateBookProgress,
        MutationKind::RemoveTrackedBook,
        MutationKind::StartReadingSession,
        MutationKind::FinishReadingSession,
        MutationKind::FinishBook,
        MutationKind::SaveCallerProfile,
    ];

    /// Operation name as the remote store spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::AddReview => "addReview",
            MutationKind::LikeReview => "likeReview",
            MutationKind::UnlikeReview => "unlikeReview",
            MutationKind::AddComment => "addComment",
            MutationKind::AddTrackedBook => "addTrackedBook",
            MutationKind::UpdateBookProgress => "updateBookProgress",
            MutationKind::RemoveTrackedBook => "removeTrackedBook",
            MutationKind::StartReadingSession => "startReadingSession",
            MutationKind::FinishReadingSession => "finishReadingSession",
            MutationKind::FinishBook => "finishBook",
            MutationKind::SaveCallerProfile => "saveCallerUserProfile",
        }
    }

    pub fn is_tracker_operation(&self) -> bool {
        matches!(
            self,
            MutationKind::AddTrackedBook
                | MutationKind::UpdateBookProgress
                | MutationKind::RemoveTrackedBook
                | MutationKind::StartReadingSession
                | MutationKind::FinishReadingSession
                | MutationKind::FinishBook
        )
    }

    /// Mutations that act on behalf of the caller and are refused locally
    /// for the anonymous caller.
    pub fn requires_identity(&self) -> bool {
        self.is_tracker_operation()
            || matches!(
                self,
                MutationKind::SaveCallerProfile
                    | MutationKind::LikeReview
                    | MutationKind::UnlikeReview
            )
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write against the remote store, with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    AddReview(NewReview),
    LikeReview(ReviewId),
    UnlikeReview(ReviewId),
    AddComment(NewComment),
    AddTrackedBook(NewTrackedBook),
    UpdateBookProgress {
        book_id: BookId,
        status: ReadingStatus,
        percentage: u8,
    },
    RemoveTrackedBook(BookId),
    StartReadingSession(BookId),
    FinishReadingSession {
        book_id: BookId,
        pages_read: u64,
        hours_spent: u64,
    },
    FinishBook,
    SaveCallerProfile(ProfileDraft),
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::AddReview(_) => MutationKind::AddReview,
            Mutation::LikeReview(_) => MutationKind::LikeReview,
            Mutation::UnlikeReview(_) => MutationKind::UnlikeReview,
            Mutation::AddComment(_) => MutationKind::AddComment,
            Mutation::AddTrackedBook(_) => MutationKind::AddTrackedBook,
            Mutation::UpdateBookProgress { .. } => MutationKind::UpdateBookProgress,
            Mutation::RemoveTrackedBook(_) => MutationKind::RemoveTrackedBook,
            Mutation::StartReadingSession(_) => MutationKind::StartReadingSession,
            Mutation::FinishReadingSession { .. } => MutationKind::FinishReadingSession,
            Mutation::FinishBook => MutationKind::FinishBook,
            Mutation::SaveCallerProfile(_) => MutationKind::SaveCallerProfile,
        }
    }

    /// The review a review-keyed invalidation binds to.
    pub fn review_subject(&self) -> Option<ReviewId> {
        match self {
            Mutation::LikeReview(id) | Mutation::UnlikeReview(id) => Some(*id),
            Mutation::AddComment(comment) => Some(comment.review_id),
            _ => None,
        }
    }

    /// Check the payload shape and return it normalized: text trimmed, an
    /// empty ISBN dropped, the percentage clamped.
    pub fn validate(self) -> Result<Mutation, ValidationError> {
        let validated = match self {
            Mutation::AddReview(review) => {
                Rating::new(review.rating)?;
                Mutation::AddReview(NewReview {
                    title: required("title", &review.title)?,
                    author: required("author", &review.author)?,
                    isbn: optional(review.isbn.as_deref()),
                    rating: review.rating,
                    body: required("body", &review.body)?,
                    cover: review.cover,
                })
            }
            Mutation::AddComment(comment) => Mutation::AddComment(NewComment {
                review_id: comment.review_id,
                author: required("author", &comment.author)?,
                text: required("text", &comment.text)?,
            }),
            Mutation::AddTrackedBook(book) => Mutation::AddTrackedBook(NewTrackedBook {
                title: required("title", &book.title)?,
                author: required("author", &book.author)?,
                isbn: optional(book.isbn.as_deref()),
            }),
            Mutation::UpdateBookProgress {
                book_id,
                status,
                percentage,
            } => Mutation::UpdateBookProgress {
                book_id,
                status,
                percentage: clamp_percentage(i64::from(percentage)),
            },
            Mutation::SaveCallerProfile(draft) => Mutation::SaveCallerProfile(ProfileDraft {
                name: required("name", &draft.name)?,
                avatar: draft.avatar,
            }),
            other => other,
        };
        Ok(validated)
    }
}

fn required(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// What a successful mutation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationOutput {
    Review(ReviewId),
    Comment(CommentId),
    Book(BookId),
    Unit,
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Sequences writes and applies their invalidations.
#[derive(Clone)]
pub struct MutationCoordinator {
    remote: RemoteHandle,
    cache: EntityCache,
    identity: Option<Identity>,
}

impl MutationCoordinator {
    pub fn new(remote: RemoteHandle, cache: EntityCache, identity: Option<Identity>) -> Self {
        Self {
            remote,
            cache,
            identity,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Validate, perform, and on success invalidate.
    pub async fn perform(&self, mutation: Mutation) -> QuireResult<MutationOutput> {
        let kind = mutation.kind();
        if kind.requires_identity() && self.identity.is_none() {
            return Err(ValidationError::IdentityRequired {
                operation: kind.to_string(),
            }
            .into());
        }
        let mutation = mutation.validate()?;
        let subject = mutation.review_subject();

        let output = match self.dispatch(mutation).await {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "Mutation failed; cache untouched");
                return Err(err);
            }
        };

        let invalidated: Vec<EntityKey> = targets_for(kind, subject)
            .iter()
            .flat_map(|target| self.cache.invalidate(target))
            .collect();
        tracing::info!(
            kind = %kind,
            invalidated = invalidated.len(),
            "Mutation applied"
        );
        Ok(output)
    }

    async fn dispatch(&self, mutation: Mutation) -> QuireResult<MutationOutput> {
        let remote = &self.remote;
        let output = match mutation {
            Mutation::AddReview(review) => MutationOutput::Review(remote.add_review(&review).await?),
            Mutation::LikeReview(id) => {
                remote.like_review(id).await?;
                MutationOutput::Unit
            }
            Mutation::UnlikeReview(id) => {
                remote.unlike_review(id).await?;
                MutationOutput::Unit
            }
            Mutation::AddComment(comment) => MutationOutput::Comment(
                remote
                    .add_comment(comment.review_id, &comment.author, &comment.text)
                    .await?,
            ),
            Mutation::AddTrackedBook(book) => MutationOutput::Book(
                remote
                    .add_tracked_book(&book.title, &book.author, book.isbn.as_deref())
                    .await?,
            ),
            Mutation::UpdateBookProgress {
                book_id,
                status,
                percentage,
            } => {
                remote.update_book_progress(book_id, status, percentage).await?;
                MutationOutput::Unit
            }
            Mutation::RemoveTrackedBook(book_id) => {
                remote.remove_tracked_book(book_id).await?;
                MutationOutput::Unit
            }
            Mutation::StartReadingSession(book_id) => {
                remote.start_reading_session(book_id).await?;
                MutationOutput::Unit
            }
            Mutation::FinishReadingSession {
                book_id,
                pages_read,
                hours_spent,
            } => {
                remote
                    .finish_reading_session(book_id, pages_read, hours_spent)
                    .await?;
                MutationOutput::Unit
            }
            Mutation::FinishBook => {
                remote.finish_book().await?;
                MutationOutput::Unit
            }
            Mutation::SaveCallerProfile(draft) => {
                let profile = UserProfile {
                    name: draft.name,
                    avatar: draft.avatar,
                };
                remote.save_caller_profile(&profile).await?;
                MutationOutput::Unit
            }
        };
        Ok(output)
    }
}
