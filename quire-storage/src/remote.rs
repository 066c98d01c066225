//! Collaborator interfaces consumed by the consistency layer.
//!
//! The remote store is the single source of truth. Every call is an
//! asynchronous request/response round trip; this crate never decides
//! whether a write is valid beyond local input shape.

use async_trait::async_trait;
use quire_core::{
    BlobRef, BookId, Comment, CommentId, Identity, NewReview, ProfileState, QuireResult,
    ReadingMetrics, ReadingStatus, ResolveError, Review, ReviewId, TrackedBook, UserProfile,
};
use std::sync::Arc;

/// Shared handle to a remote store bound to one caller.
pub type RemoteHandle = Arc<dyn RemoteStore>;

/// Request/response surface of the remote store.
///
/// A `RemoteStore` is bound to a caller when it is created (see
/// [`RemoteConnector`]); identity-scoped operations act on that caller.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // ========================================================================
    // REVIEW OPERATIONS
    // ========================================================================

    /// Create a review. The store starts it with no likes.
    async fn add_review(&self, review: &NewReview) -> QuireResult<ReviewId>;

    /// Get a review by ID.
    async fn get_review(&self, id: ReviewId) -> QuireResult<Option<Review>>;

    /// Newest reviews first, at most `limit`.
    async fn get_latest_reviews(&self, limit: u32) -> QuireResult<Vec<Review>>;

    /// Add the caller to the review's liker set. Idempotent on the store.
    async fn like_review(&self, id: ReviewId) -> QuireResult<()>;

    /// Remove the caller from the review's liker set. Idempotent on the store.
    async fn unlike_review(&self, id: ReviewId) -> QuireResult<()>;

    async fn add_comment(
        &self,
        review_id: ReviewId,
        author: &str,
        text: &str,
    ) -> QuireResult<CommentId>;

    async fn get_comments(&self, review_id: ReviewId) -> QuireResult<Vec<Comment>>;

    // ========================================================================
    // TRACKER OPERATIONS (identity-scoped)
    // ========================================================================

    async fn add_tracked_book(
        &self,
        title: &str,
        author: &str,
        isbn: Option<&str>,
    ) -> QuireResult<BookId>;

    async fn update_book_progress(
        &self,
        book_id: BookId,
        status: ReadingStatus,
        percentage: u8,
    ) -> QuireResult<()>;

    async fn remove_tracked_book(&self, book_id: BookId) -> QuireResult<()>;

    async fn start_reading_session(&self, book_id: BookId) -> QuireResult<()>;

    /// Fold a session's pages and hours into the caller's metrics.
    async fn finish_reading_session(
        &self,
        book_id: BookId,
        pages_read: u64,
        hours_spent: u64,
    ) -> QuireResult<()>;

    /// Count one more finished book for the caller.
    async fn finish_book(&self) -> QuireResult<()>;

    async fn get_tracked_books(&self) -> QuireResult<Vec<TrackedBook>>;

    /// `None` until the caller has any recorded activity.
    async fn get_reading_metrics(&self) -> QuireResult<Option<ReadingMetrics>>;

    // ========================================================================
    // PROFILE OPERATIONS (identity-scoped)
    // ========================================================================

    async fn get_caller_profile(&self) -> QuireResult<ProfileState>;

    async fn save_caller_profile(&self, profile: &UserProfile) -> QuireResult<()>;
}

/// Produces remote store handles bound to a caller, or to the anonymous
/// caller when `identity` is `None`.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, identity: Option<&Identity>) -> RemoteHandle;
}

/// Binary resource collaborator.
///
/// A reference either exposes a direct URL (probed synchronously) or has its
/// raw bytes fetched on demand.
#[async_trait]
pub trait BlobSource: Send + Sync {
    fn direct_url(&self, blob: &BlobRef) -> Option<String>;

    async fn fetch_bytes(&self, blob: &BlobRef) -> Result<Vec<u8>, ResolveError>;
}

/// Identity collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Identity>;

    /// Resolves to the authenticated identity, or `None` if the user backed
    /// out and the caller stays anonymous.
    async fn login(&self) -> QuireResult<Option<Identity>>;

    async fn logout(&self) -> QuireResult<()>;
}
