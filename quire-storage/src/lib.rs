//! Quire Storage - Client-side data-consistency layer
//!
//! Keeps cached representations of remote reading-tracker entities
//! consistent with the remote store: reads go through the Entity Cache,
//! writes go through the Mutation Coordinator, and every successful write
//! stales exactly the views the Invalidation Graph names.

pub mod cache;
pub mod engagement;
pub mod invalidation;
pub mod mock;
pub mod mutation;
pub mod progress;
pub mod remote;
pub mod resolver;
pub mod session;

pub use cache::{
    CacheConfig, CacheStats, CachedEntity, EntityCache, EntityFetcher, EntityKey, EntityValue,
    Freshness, KeyClass, Observer, QueryState, RemoteFetcher,
};
pub use engagement::{last_observed_review, toggle_like, LikeAction};
pub use invalidation::{invalidated_classes, targets_for, InvalidationTarget};
pub use mock::{MockBlobSource, MockIdentityProvider, MockRemoteStore};
pub use mutation::{Mutation, MutationCoordinator, MutationKind, MutationOutput};
pub use progress::{
    clamp_count, clamp_percentage, parse_numeric_input, parse_status, sanitize_count,
    sanitize_percentage, suggested_status, ProgressUpdate, SessionTotals, MAX_PERCENTAGE,
};
pub use remote::{BlobSource, IdentityProvider, RemoteConnector, RemoteHandle, RemoteStore};
pub use resolver::{
    sniff_mime, HandleRegistry, ImagePayload, ImageSlot, LocalHandle, Resolution,
    ResourceResolver, LOCAL_HANDLE_PREFIX,
};
pub use session::Session;
