//! In-memory collaborators for testing and the CLI walkthrough.
//!
//! [`MockRemoteStore`] keeps the authoritative state behind an `RwLock` and
//! applies the store-side business rules the consistency layer relies on:
//! likes are a set (so repeats are idempotent and the count is the set size),
//! the latest feed is newest first, tracker state is per caller, and metrics
//! are absent until the caller records any activity. Every call yields once
//! to the scheduler so concurrent flows interleave the way real round trips
//! do. It is not intended for production use.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use quire_core::{
    BlobRef, BookId, Comment, CommentId, Identity, NewReview, Principal, ProfileState, Progress,
    QuireResult, Rating, ReadingMetrics, ReadingSession, ReadingStatus, RemoteError, ResolveError,
    Review, ReviewId, TrackedBook, UserProfile,
};
use tokio::sync::watch;

use crate::remote::{BlobSource, IdentityProvider, RemoteConnector, RemoteHandle, RemoteStore};

// ============================================================================
// REMOTE STORE
// ============================================================================

#[derive(Default)]
struct StoreState {
    next_review_id: u64,
    next_comment_id: u64,
    next_book_id: u64,
    reviews: BTreeMap<ReviewId, Review>,
    comments: BTreeMap<ReviewId, Vec<Comment>>,
    books: HashMap<Principal, BTreeMap<BookId, TrackedBook>>,
    open_sessions: HashMap<(Principal, BookId), ReadingSession>,
    metrics: HashMap<Principal, ReadingMetrics>,
    profiles: HashMap<Principal, UserProfile>,
    calls: HashMap<&'static str, u64>,
    failures: HashMap<&'static str, VecDeque<RemoteError>>,
}

impl StoreState {
    fn insert_review(&mut self, review: NewReview, rating: Rating) -> ReviewId {
        self.next_review_id += 1;
        let id = ReviewId::new(self.next_review_id);
        self.reviews.insert(
            id,
            Review {
                id,
                title: review.title,
                author: review.author,
                isbn: review.isbn,
                created_at: Utc::now(),
                body: review.body,
                rating,
                like_count: 0,
                liked_by: BTreeSet::new(),
                cover: review.cover,
            },
        );
        id
    }

    fn set_like(&mut self, id: ReviewId, principal: &Principal, liked: bool) -> bool {
        let Some(review) = self.reviews.get_mut(&id) else {
            return false;
        };
        if liked {
            review.liked_by.insert(principal.clone());
        } else {
            review.liked_by.remove(principal);
        }
        review.like_count = review.liked_by.len() as u64;
        true
    }

    fn metrics_mut(&mut self, principal: &Principal) -> &mut ReadingMetrics {
        self.metrics.entry(principal.clone()).or_default()
    }
}

/// In-memory remote store shared by every caller connected to it.
///
/// Cloning is cheap and yields a handle to the same store.
#[derive(Clone, Default)]
pub struct MockRemoteStore {
    state: Arc<RwLock<StoreState>>,
}

impl MockRemoteStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a review directly, bypassing the call log.
    ///
    /// Panics if the rating is out of range.
    pub fn seed_review(&self, review: NewReview) -> ReviewId {
        let rating = Rating::new(review.rating).unwrap_or_else(|e| panic!("bad seed rating: {e}"));
        self.write().insert_review(review, rating)
    }

    /// Add `principal` to a review's liker set without going through a
    /// connected caller.
    pub fn like_as(&self, id: ReviewId, principal: &Principal) {
        self.write().set_like(id, principal, true);
    }

    /// Store a profile for `principal` directly.
    pub fn set_profile(&self, principal: &Principal, profile: UserProfile) {
        self.write().profiles.insert(principal.clone(), profile);
    }

    /// Current store-side state of a review.
    pub fn review(&self, id: ReviewId) -> Option<Review> {
        self.write().reviews.get(&id).cloned()
    }

    /// Current store-side metrics of `principal`.
    pub fn metrics_for(&self, principal: &Principal) -> Option<ReadingMetrics> {
        self.write().metrics.get(principal).copied()
    }

    /// Number of calls made to `operation` (store spelling, e.g. `"getReview"`).
    pub fn call_count(&self, operation: &str) -> u64 {
        self.write().calls.get(operation).copied().unwrap_or(0)
    }

    /// Total number of calls made to the store.
    pub fn total_calls(&self) -> u64 {
        self.write().calls.values().sum()
    }

    /// Make the next call to `operation` fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: RemoteError) {
        self.write()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Record a call and pop any injected failure for it.
    async fn begin(&self, operation: &'static str) -> Result<(), RemoteError> {
        let injected = {
            let mut state = self.write();
            *state.calls.entry(operation).or_insert(0) += 1;
            state
                .failures
                .get_mut(operation)
                .and_then(VecDeque::pop_front)
        };
        tokio::task::yield_now().await;
        match injected {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl RemoteConnector for MockRemoteStore {
    fn connect(&self, identity: Option<&Identity>) -> RemoteHandle {
        Arc::new(MockActor {
            store: self.clone(),
            caller: identity.map(|identity| identity.principal().clone()),
        })
    }
}

/// A [`MockRemoteStore`] bound to one caller.
struct MockActor {
    store: MockRemoteStore,
    caller: Option<Principal>,
}

impl MockActor {
    fn caller(&self, operation: &str) -> Result<&Principal, RemoteError> {
        self.caller.as_ref().ok_or_else(|| RemoteError::Unauthorized {
            operation: operation.to_string(),
        })
    }
}

fn not_found(entity: &str, id: u64) -> RemoteError {
    RemoteError::NotFound {
        entity: entity.to_string(),
        id,
    }
}

#[async_trait]
impl RemoteStore for MockActor {
    async fn add_review(&self, review: &NewReview) -> QuireResult<ReviewId> {
        self.store.begin("addReview").await?;
        let rating = Rating::new(review.rating)
            .map_err(|e| RemoteError::call_failed("addReview", e.to_string()))?;
        Ok(self.store.write().insert_review(review.clone(), rating))
    }

    async fn get_review(&self, id: ReviewId) -> QuireResult<Option<Review>> {
        self.store.begin("getReview").await?;
        Ok(self.store.write().reviews.get(&id).cloned())
    }

    async fn get_latest_reviews(&self, limit: u32) -> QuireResult<Vec<Review>> {
        self.store.begin("getLatestReviews").await?;
        let state = self.store.write();
        Ok(state
            .reviews
            .values()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn like_review(&self, id: ReviewId) -> QuireResult<()> {
        self.store.begin("likeReview").await?;
        let caller = self.caller("likeReview")?;
        if !self.store.write().set_like(id, caller, true) {
            return Err(not_found("Review", id.get()).into());
        }
        Ok(())
    }

    async fn unlike_review(&self, id: ReviewId) -> QuireResult<()> {
        self.store.begin("unlikeReview").await?;
        let caller = self.caller("unlikeReview")?;
        if !self.store.write().set_like(id, caller, false) {
            return Err(not_found("Review", id.get()).into());
        }
        Ok(())
    }

    async fn add_comment(
        &self,
        review_id: ReviewId,
        author: &str,
        text: &str,
    ) -> QuireResult<CommentId> {
        self.store.begin("addComment").await?;
        let mut state = self.store.write();
        if !state.reviews.contains_key(&review_id) {
            return Err(not_found("Review", review_id.get()).into());
        }
        state.next_comment_id += 1;
        let id = CommentId::new(state.next_comment_id);
        state.comments.entry(review_id).or_default().push(Comment {
            id,
            review_id,
            author: author.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get_comments(&self, review_id: ReviewId) -> QuireResult<Vec<Comment>> {
        self.store.begin("getComments").await?;
        Ok(self
            .store
            .write()
            .comments
            .get(&review_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_tracked_book(
        &self,
        title: &str,
        author: &str,
        isbn: Option<&str>,
    ) -> QuireResult<BookId> {
        self.store.begin("addTrackedBook").await?;
        let caller = self.caller("addTrackedBook")?.clone();
        let mut state = self.store.write();
        state.next_book_id += 1;
        let id = BookId::new(state.next_book_id);
        state.books.entry(caller).or_default().insert(
            id,
            TrackedBook {
                id,
                title: title.to_string(),
                author: author.to_string(),
                isbn: isbn.map(str::to_string),
                progress: Progress::default(),
            },
        );
        Ok(id)
    }

    async fn update_book_progress(
        &self,
        book_id: BookId,
        status: ReadingStatus,
        percentage: u8,
    ) -> QuireResult<()> {
        self.store.begin("updateBookProgress").await?;
        let caller = self.caller("updateBookProgress")?;
        let mut state = self.store.write();
        let book = state
            .books
            .get_mut(caller)
            .and_then(|books| books.get_mut(&book_id))
            .ok_or_else(|| not_found("TrackedBook", book_id.get()))?;
        book.progress = Progress { status, percentage };
        Ok(())
    }

    async fn remove_tracked_book(&self, book_id: BookId) -> QuireResult<()> {
        self.store.begin("removeTrackedBook").await?;
        let caller = self.caller("removeTrackedBook")?;
        let mut state = self.store.write();
        state
            .books
            .get_mut(caller)
            .and_then(|books| books.remove(&book_id))
            .ok_or_else(|| not_found("TrackedBook", book_id.get()))?;
        state.open_sessions.remove(&(caller.clone(), book_id));
        Ok(())
    }

    async fn start_reading_session(&self, book_id: BookId) -> QuireResult<()> {
        self.store.begin("startReadingSession").await?;
        let caller = self.caller("startReadingSession")?;
        let mut state = self.store.write();
        let owned = state
            .books
            .get(caller)
            .is_some_and(|books| books.contains_key(&book_id));
        if !owned {
            return Err(not_found("TrackedBook", book_id.get()).into());
        }
        state.open_sessions.insert(
            (caller.clone(), book_id),
            ReadingSession {
                book_id,
                start_time: Utc::now(),
                end_time: None,
                pages_read: 0,
            },
        );
        Ok(())
    }

    async fn finish_reading_session(
        &self,
        book_id: BookId,
        pages_read: u64,
        hours_spent: u64,
    ) -> QuireResult<()> {
        self.store.begin("finishReadingSession").await?;
        let caller = self.caller("finishReadingSession")?;
        let mut state = self.store.write();
        state.open_sessions.remove(&(caller.clone(), book_id));
        let metrics = state.metrics_mut(caller);
        metrics.total_pages = metrics.total_pages.saturating_add(pages_read);
        metrics.total_hours = metrics.total_hours.saturating_add(hours_spent);
        Ok(())
    }

    async fn finish_book(&self) -> QuireResult<()> {
        self.store.begin("finishBook").await?;
        let caller = self.caller("finishBook")?;
        let mut state = self.store.write();
        let metrics = state.metrics_mut(caller);
        metrics.total_books = metrics.total_books.saturating_add(1);
        Ok(())
    }

    async fn get_tracked_books(&self) -> QuireResult<Vec<TrackedBook>> {
        self.store.begin("getTrackedBooks").await?;
        let caller = self.caller("getTrackedBooks")?;
        Ok(self
            .store
            .write()
            .books
            .get(caller)
            .map(|books| books.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_reading_metrics(&self) -> QuireResult<Option<ReadingMetrics>> {
        self.store.begin("getReadingMetrics").await?;
        let caller = self.caller("getReadingMetrics")?;
        Ok(self.store.write().metrics.get(caller).copied())
    }

    async fn get_caller_profile(&self) -> QuireResult<ProfileState> {
        self.store.begin("getCallerUserProfile").await?;
        let caller = self.caller("getCallerUserProfile")?;
        Ok(self.store.write().profiles.get(caller).cloned().into())
    }

    async fn save_caller_profile(&self, profile: &UserProfile) -> QuireResult<()> {
        self.store.begin("saveCallerUserProfile").await?;
        let caller = self.caller("saveCallerUserProfile")?.clone();
        self.store.write().profiles.insert(caller, profile.clone());
        Ok(())
    }
}

// ============================================================================
// BLOB SOURCE
// ============================================================================

#[derive(Default)]
struct BlobState {
    direct: HashMap<String, String>,
    bytes: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    fetches: u64,
}

/// In-memory binary resource collaborator.
///
/// A reference registered with [`with_direct_url`](Self::with_direct_url)
/// resolves without any fetch; one registered with
/// [`with_bytes`](Self::with_bytes) is fetched. Byte fetches can be held
/// open with [`hold`](Self::hold) to test detachment mid-flight.
#[derive(Clone)]
pub struct MockBlobSource {
    state: Arc<RwLock<BlobState>>,
    open: Arc<watch::Sender<bool>>,
}

impl Default for MockBlobSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBlobSource {
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self {
            state: Arc::new(RwLock::new(BlobState::default())),
            open: Arc::new(open),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BlobState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_direct_url(self, blob: &BlobRef, url: impl Into<String>) -> Self {
        self.write().direct.insert(blob.as_str().to_string(), url.into());
        self
    }

    pub fn with_bytes(self, blob: &BlobRef, bytes: Vec<u8>) -> Self {
        self.write().bytes.insert(blob.as_str().to_string(), bytes);
        self
    }

    /// Make byte fetches of `blob` fail.
    pub fn with_failure(self, blob: &BlobRef) -> Self {
        self.write().failing.insert(blob.as_str().to_string());
        self
    }

    /// Suspend byte fetches until [`release`](Self::release).
    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    /// Number of byte fetches started.
    pub fn fetch_count(&self) -> u64 {
        self.write().fetches
    }
}

#[async_trait]
impl BlobSource for MockBlobSource {
    fn direct_url(&self, blob: &BlobRef) -> Option<String> {
        self.write().direct.get(blob.as_str()).cloned()
    }

    async fn fetch_bytes(&self, blob: &BlobRef) -> Result<Vec<u8>, ResolveError> {
        self.write().fetches += 1;
        let mut open = self.open.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = open.wait_for(|open| *open).await;
        tokio::task::yield_now().await;

        let state = self.write();
        if state.failing.contains(blob.as_str()) {
            return Err(ResolveError::FetchFailed {
                reference: blob.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        match state.bytes.get(blob.as_str()) {
            Some(bytes) if !bytes.is_empty() => Ok(bytes.clone()),
            Some(_) => Err(ResolveError::Empty {
                reference: blob.to_string(),
            }),
            None => Err(ResolveError::FetchFailed {
                reference: blob.to_string(),
                reason: "unknown reference".to_string(),
            }),
        }
    }
}

// ============================================================================
// IDENTITY PROVIDER
// ============================================================================

/// Identity provider that logs in as a fixed principal.
pub struct MockIdentityProvider {
    login_as: Option<Identity>,
    current: RwLock<Option<Identity>>,
}

impl MockIdentityProvider {
    /// Provider whose login succeeds as `principal`.
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            login_as: Some(Identity::new(Principal::new(principal))),
            current: RwLock::new(None),
        }
    }

    /// Provider whose login is always backed out of.
    pub fn declining() -> Self {
        Self {
            login_as: None,
            current: RwLock::new(None),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn current(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn login(&self) -> QuireResult<Option<Identity>> {
        tokio::task::yield_now().await;
        let identity = self.login_as.clone();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = identity.clone();
        Ok(identity)
    }

    async fn logout(&self) -> QuireResult<()> {
        tokio::task::yield_now().await;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
