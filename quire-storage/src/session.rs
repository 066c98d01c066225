//! Session facade: the boundary exposed to presentation.
//!
//! A session owns the caller's identity together with the Entity Cache,
//! Mutation Coordinator and Resource Resolver built for it. The cache never
//! outlives its identity: login and logout rebuild it from scratch, so one
//! caller's identity-scoped data can never be shown to another.

use std::sync::Arc;

use quire_core::{
    BookId, Comment, CommentId, Identity, NewComment, NewReview, NewTrackedBook, ProfileDraft,
    ProfileState, QuireConfig, QuireResult, ReadingMetrics, ReadingStatus, Review, ReviewId,
    TrackedBook, ValidationError,
};

use crate::cache::{
    CacheConfig, CacheStats, CachedEntity, EntityCache, EntityKey, EntityValue, Observer,
    QueryState, RemoteFetcher,
};
use crate::engagement::{self, LikeAction};
use crate::mutation::{Mutation, MutationCoordinator, MutationKind, MutationOutput};
use crate::progress::{ProgressUpdate, SessionTotals};
use crate::remote::{BlobSource, IdentityProvider, RemoteConnector};
use crate::resolver::{ImageSlot, ResourceResolver};

/// Per-identity state: everything that is rebuilt on login and logout.
struct Bound {
    identity: Option<Identity>,
    cache: EntityCache,
    coordinator: MutationCoordinator,
}

pub struct Session {
    config: QuireConfig,
    connector: Arc<dyn RemoteConnector>,
    resolver: ResourceResolver,
    bound: Bound,
}

impl Session {
    pub fn new(
        config: QuireConfig,
        connector: Arc<dyn RemoteConnector>,
        blobs: Arc<dyn BlobSource>,
        identity: Option<Identity>,
    ) -> Self {
        let resolver = ResourceResolver::new(blobs, &config.images);
        let bound = Self::bind(&config, connector.as_ref(), identity);
        Self {
            config,
            connector,
            resolver,
            bound,
        }
    }

    /// Start a session for whoever `provider` currently has signed in.
    pub fn from_provider(
        config: QuireConfig,
        connector: Arc<dyn RemoteConnector>,
        blobs: Arc<dyn BlobSource>,
        provider: &dyn IdentityProvider,
    ) -> Self {
        Self::new(config, connector, blobs, provider.current())
    }

    fn bind(config: &QuireConfig, connector: &dyn RemoteConnector, identity: Option<Identity>) -> Bound {
        let remote = connector.connect(identity.as_ref());
        let cache = EntityCache::new(
            Arc::new(RemoteFetcher::new(Arc::clone(&remote))),
            CacheConfig::from(&config.cache),
        );
        let coordinator = MutationCoordinator::new(remote, cache.clone(), identity.clone());
        tracing::debug!(
            principal = identity.as_ref().map(|i| i.principal().as_str()),
            "Session bound"
        );
        Bound {
            identity,
            cache,
            coordinator,
        }
    }

    fn rebind(&mut self, identity: Option<Identity>) {
        self.bound.cache.clear();
        self.bound = Self::bind(&self.config, self.connector.as_ref(), identity);
    }

    pub fn config(&self) -> &QuireConfig {
        &self.config
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.bound.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.bound.identity.is_some()
    }

    pub fn cache(&self) -> &EntityCache {
        &self.bound.cache
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.bound.cache.stats()
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    /// Run the provider's login flow. On success the session switches to the
    /// new identity with an empty cache; if the user backs out nothing
    /// changes.
    pub async fn login(&mut self, provider: &dyn IdentityProvider) -> QuireResult<Option<Identity>> {
        let identity = provider.login().await?;
        if let Some(identity) = &identity {
            tracing::info!(principal = %identity.principal(), "Logged in");
            self.rebind(Some(identity.clone()));
        }
        Ok(identity)
    }

    /// Log out and drop every cached entry.
    pub async fn logout(&mut self, provider: &dyn IdentityProvider) -> QuireResult<()> {
        provider.logout().await?;
        tracing::info!("Logged out");
        self.rebind(None);
        Ok(())
    }

    // ========================================================================
    // READS
    // ========================================================================

    fn read<T: CachedEntity>(&self, key: EntityKey) -> QueryState<T> {
        if key.is_identity_scoped() && !self.is_authenticated() {
            return QueryState::disabled();
        }
        self.bound.cache.read_as(&key)
    }

    async fn load<T: CachedEntity>(&self, key: EntityKey) -> QuireResult<T> {
        if key.is_identity_scoped() && !self.is_authenticated() {
            return Err(ValidationError::IdentityRequired {
                operation: key.to_string(),
            }
            .into());
        }
        self.bound.cache.fetch_as(&key).await
    }

    pub fn latest_reviews_key(&self) -> EntityKey {
        EntityKey::LatestReviews {
            limit: self.config.latest_reviews_limit,
        }
    }

    pub fn latest_reviews(&self) -> QueryState<Vec<Review>> {
        self.read(self.latest_reviews_key())
    }

    pub fn review(&self, id: ReviewId) -> QueryState<Option<Review>> {
        self.read(EntityKey::Review(id))
    }

    pub fn comments(&self, review_id: ReviewId) -> QueryState<Vec<Comment>> {
        self.read(EntityKey::Comments(review_id))
    }

    pub fn tracked_books(&self) -> QueryState<Vec<TrackedBook>> {
        self.read(EntityKey::TrackedBooks)
    }

    pub fn reading_metrics(&self) -> QueryState<Option<ReadingMetrics>> {
        self.read(EntityKey::ReadingMetrics)
    }

    pub fn caller_profile(&self) -> QueryState<ProfileState> {
        self.read(EntityKey::CallerProfile)
    }

    pub async fn load_latest_reviews(&self) -> QuireResult<Vec<Review>> {
        self.load(self.latest_reviews_key()).await
    }

    pub async fn load_review(&self, id: ReviewId) -> QuireResult<Option<Review>> {
        self.load(EntityKey::Review(id)).await
    }

    pub async fn load_comments(&self, review_id: ReviewId) -> QuireResult<Vec<Comment>> {
        self.load(EntityKey::Comments(review_id)).await
    }

    pub async fn load_tracked_books(&self) -> QuireResult<Vec<TrackedBook>> {
        self.load(EntityKey::TrackedBooks).await
    }

    pub async fn load_reading_metrics(&self) -> QuireResult<Option<ReadingMetrics>> {
        self.load(EntityKey::ReadingMetrics).await
    }

    pub async fn load_caller_profile(&self) -> QuireResult<ProfileState> {
        self.load(EntityKey::CallerProfile).await
    }

    /// Keep `key` observed for the lifetime of the returned guard.
    pub fn observe(&self, key: EntityKey) -> Observer {
        self.bound.cache.observe(&key)
    }

    /// Show the first-run profile prompt: signed in, profile fetched, and
    /// the store has none for this caller.
    pub fn needs_profile_setup(&self) -> bool {
        self.is_authenticated()
            && matches!(
                self.bound.cache.peek(&EntityKey::CallerProfile),
                Some(EntityValue::CallerProfile(ProfileState::Absent))
            )
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    pub async fn perform(&self, mutation: Mutation) -> QuireResult<MutationOutput> {
        self.bound.coordinator.perform(mutation).await
    }

    pub async fn add_review(&self, review: NewReview) -> QuireResult<ReviewId> {
        match self.perform(Mutation::AddReview(review)).await? {
            MutationOutput::Review(id) => Ok(id),
            other => Err(unexpected_output(MutationKind::AddReview, other)),
        }
    }

    pub async fn toggle_like(&self, id: ReviewId) -> QuireResult<LikeAction> {
        engagement::toggle_like(&self.bound.cache, &self.bound.coordinator, id).await
    }

    /// Comment as the caller, under the name from their saved profile.
    pub async fn add_comment(&self, review_id: ReviewId, text: &str) -> QuireResult<CommentId> {
        let profile_required = || ValidationError::ProfileRequired {
            operation: MutationKind::AddComment.to_string(),
        };
        if !self.is_authenticated() {
            return Err(profile_required().into());
        }
        let profile = self.load_caller_profile().await?;
        let Some(profile) = profile.as_profile() else {
            return Err(profile_required().into());
        };
        let comment = NewComment {
            review_id,
            author: profile.name.clone(),
            text: text.to_string(),
        };
        match self.perform(Mutation::AddComment(comment)).await? {
            MutationOutput::Comment(id) => Ok(id),
            other => Err(unexpected_output(MutationKind::AddComment, other)),
        }
    }

    pub async fn add_tracked_book(&self, book: NewTrackedBook) -> QuireResult<BookId> {
        match self.perform(Mutation::AddTrackedBook(book)).await? {
            MutationOutput::Book(id) => Ok(id),
            other => Err(unexpected_output(MutationKind::AddTrackedBook, other)),
        }
    }

    /// Submit raw status and percentage input for a book.
    pub async fn update_book_progress(
        &self,
        book_id: BookId,
        status: &str,
        percentage: &str,
    ) -> QuireResult<()> {
        let update = ProgressUpdate::from_input(book_id, status, percentage)?;
        self.perform(update.into_mutation()).await?;
        Ok(())
    }

    /// Change a book's status, keeping its percentage.
    pub async fn set_book_status(&self, book: &TrackedBook, status: ReadingStatus) -> QuireResult<()> {
        self.perform(ProgressUpdate::with_status(book, status).into_mutation())
            .await?;
        Ok(())
    }

    /// Change a book's percentage from raw input, keeping its status.
    pub async fn set_book_percentage(&self, book: &TrackedBook, percentage: &str) -> QuireResult<()> {
        self.perform(ProgressUpdate::with_percentage(book, percentage).into_mutation())
            .await?;
        Ok(())
    }

    pub async fn remove_tracked_book(&self, book_id: BookId) -> QuireResult<()> {
        self.perform(Mutation::RemoveTrackedBook(book_id)).await?;
        Ok(())
    }

    pub async fn start_reading_session(&self, book_id: BookId) -> QuireResult<()> {
        self.perform(Mutation::StartReadingSession(book_id)).await?;
        Ok(())
    }

    /// Submit raw pages-read and hours-spent input for a finished session.
    pub async fn finish_reading_session(
        &self,
        book_id: BookId,
        pages_read: &str,
        hours_spent: &str,
    ) -> QuireResult<()> {
        let totals = SessionTotals::from_input(book_id, pages_read, hours_spent);
        self.perform(totals.into_mutation()).await?;
        Ok(())
    }

    pub async fn finish_book(&self) -> QuireResult<()> {
        self.perform(Mutation::FinishBook).await?;
        Ok(())
    }

    pub async fn save_profile(&self, draft: ProfileDraft) -> QuireResult<()> {
        self.perform(Mutation::SaveCallerProfile(draft)).await?;
        Ok(())
    }

    // ========================================================================
    // IMAGES
    // ========================================================================

    /// Attach an image consumer.
    pub fn image_slot(&self) -> ImageSlot {
        self.resolver.attach()
    }
}

fn unexpected_output(kind: MutationKind, output: MutationOutput) -> quire_core::QuireError {
    quire_core::RemoteError::call_failed(kind.as_str(), format!("unexpected result {output:?}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Freshness;
    use crate::mock::{MockBlobSource, MockIdentityProvider, MockRemoteStore};
    use quire_core::Principal;

    fn anonymous(store: &MockRemoteStore) -> Session {
        Session::new(
            QuireConfig::default(),
            Arc::new(store.clone()),
            Arc::new(MockBlobSource::new()),
            None,
        )
    }

    fn signed_in(store: &MockRemoteStore, principal: &str) -> Session {
        Session::new(
            QuireConfig::default(),
            Arc::new(store.clone()),
            Arc::new(MockBlobSource::new()),
            Some(Identity::new(Principal::new(principal))),
        )
    }

    #[tokio::test]
    async fn test_scoped_reads_disabled_when_anonymous() {
        let store = MockRemoteStore::new();
        let session = anonymous(&store);
        let state = session.tracked_books();
        assert!(!state.is_enabled());
        assert!(!state.is_loading());
        assert!(session.load_reading_metrics().await.unwrap_err().is_validation());
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_public_reads_work_anonymously() {
        let store = MockRemoteStore::new();
        let session = anonymous(&store);
        assert!(session.load_latest_reviews().await.unwrap().is_empty());
        assert_eq!(store.call_count("getLatestReviews"), 1);
    }

    #[tokio::test]
    async fn test_needs_profile_setup() {
        let store = MockRemoteStore::new();
        let session = signed_in(&store, "reader-1");
        assert!(!session.needs_profile_setup());

        session.load_caller_profile().await.unwrap();
        assert!(session.needs_profile_setup());

        session
            .save_profile(ProfileDraft {
                name: " Ada ".to_string(),
                avatar: None,
            })
            .await
            .unwrap();
        let profile = session.load_caller_profile().await.unwrap();
        assert_eq!(profile.as_profile().unwrap().name, "Ada");
        assert!(!session.needs_profile_setup());
    }

    #[tokio::test]
    async fn test_comment_uses_profile_name() {
        let store = MockRemoteStore::new();
        let review = store.seed_review(NewReview {
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            isbn: None,
            rating: 5,
            body: "Spice".to_string(),
            cover: None,
        });
        let session = signed_in(&store, "reader-1");

        let err = session.add_comment(review, "Great").await.unwrap_err();
        assert!(matches!(
            err,
            quire_core::QuireError::Validation(ValidationError::ProfileRequired { .. })
        ));

        session
            .save_profile(ProfileDraft {
                name: "Ada".to_string(),
                avatar: None,
            })
            .await
            .unwrap();

        session.load_comments(review).await.unwrap();
        session.add_comment(review, "  Great  ").await.unwrap();
        assert_eq!(
            session.cache().freshness(&EntityKey::Comments(review)),
            Some(Freshness::Stale)
        );
        let comments = session.load_comments(review).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author, "Ada");
        assert_eq!(comments[0].text, "Great");
    }

    #[tokio::test]
    async fn test_login_and_logout_rebuild_cache() {
        let store = MockRemoteStore::new();
        let mut session = anonymous(&store);
        session.load_latest_reviews().await.unwrap();
        assert_eq!(session.cache().keys().len(), 1);

        let provider = MockIdentityProvider::new("reader-1");
        let identity = session.login(&provider).await.unwrap();
        assert!(identity.is_some());
        assert!(session.is_authenticated());
        assert!(session.cache().keys().is_empty());

        session
            .add_tracked_book(NewTrackedBook {
                title: "Dune".to_string(),
                author: "Herbert".to_string(),
                isbn: None,
            })
            .await
            .unwrap();
        assert_eq!(session.load_tracked_books().await.unwrap().len(), 1);

        session.logout(&provider).await.unwrap();
        assert!(!session.is_authenticated());
        assert!(session.cache().keys().is_empty());
        assert!(!session.tracked_books().is_enabled());
    }

    #[tokio::test]
    async fn test_session_resumes_provider_identity() {
        let store = MockRemoteStore::new();
        let provider = MockIdentityProvider::new("reader-1");
        let fresh = || {
            Session::from_provider(
                QuireConfig::default(),
                Arc::new(store.clone()),
                Arc::new(MockBlobSource::new()),
                &provider,
            )
        };
        assert!(!fresh().is_authenticated());

        provider.login().await.unwrap();
        let session = fresh();
        assert_eq!(
            session.identity().map(|i| i.principal().clone()),
            Some(Principal::new("reader-1"))
        );
        assert!(session.load_tracked_books().await.unwrap().is_empty());

        provider.logout().await.unwrap();
        assert!(!fresh().is_authenticated());
    }

    #[tokio::test]
    async fn test_declined_login_keeps_session() {
        let store = MockRemoteStore::new();
        let mut session = anonymous(&store);
        session.load_latest_reviews().await.unwrap();
        let provider = MockIdentityProvider::declining();
        assert!(session.login(&provider).await.unwrap().is_none());
        assert_eq!(session.cache().keys().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_from_raw_input() {
        let store = MockRemoteStore::new();
        let session = signed_in(&store, "reader-1");
        let book = session
            .add_tracked_book(NewTrackedBook {
                title: "Dune".to_string(),
                author: "Herbert".to_string(),
                isbn: Some("".to_string()),
            })
            .await
            .unwrap();

        session
            .update_book_progress(book, "Finished", "150")
            .await
            .unwrap();
        let books = session.load_tracked_books().await.unwrap();
        assert_eq!(books[0].progress.percentage, 100);
        assert_eq!(books[0].progress.status, ReadingStatus::Finished);
        assert_eq!(books[0].isbn, None);

        let err = session
            .update_book_progress(book, "Abandoned", "10")
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
