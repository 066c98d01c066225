//! Quire Core - Entity Types
//!
//! Pure data structures shared by the client consistency layer. This crate
//! contains no I/O: identifiers, entity records, enums, the error taxonomy
//! and configuration.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

pub use config::{CacheSettings, ImageSettings, QuireConfig, DEFAULT_LATEST_REVIEWS_LIMIT};
pub use entities::{
    BlobRef, Comment, NewComment, NewReview, NewTrackedBook, ProfileDraft, ProfileState,
    Progress, Rating, ReadingMetrics, ReadingSession, Review, TrackedBook, UserProfile,
};
pub use enums::{ReadingStatus, ReadingStatusParseError};
pub use error::{
    ConfigError, QuireError, QuireResult, RemoteError, ResolveError, ValidationError,
};
pub use identity::{BookId, CommentId, Identity, Principal, ReviewId, Timestamp};
