//! Entity cache with explicit freshness.
//!
//! Every read returns a [`QueryState`] that carries the entry's freshness
//! alongside the last known value, so a view can show stale-but-displayable
//! data while a refetch is in flight.
//!
//! # Example
//!
//! ```ignore
//! let cache = EntityCache::new(Arc::new(RemoteFetcher::new(remote)), CacheConfig::new());
//!
//! // Passive read: returns immediately, starts a fetch if needed
//! let state = cache.read_as::<Vec<TrackedBook>>(&EntityKey::TrackedBooks);
//!
//! // Explicit load: coalesces with any in-flight fetch
//! let books: Vec<TrackedBook> = cache.fetch_as(&EntityKey::TrackedBooks).await?;
//! ```

pub mod entity_cache;
pub mod freshness;
pub mod key;
pub mod traits;

pub use entity_cache::{CacheConfig, EntityCache, Observer};
pub use freshness::{Freshness, QueryState};
pub use key::{EntityKey, KeyClass};
pub use traits::{CacheStats, CachedEntity, EntityFetcher, EntityValue, RemoteFetcher};
