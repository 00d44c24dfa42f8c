//! Generic in-memory caching layer for remote resource lists.
//!
//! This module provides a resource-agnostic cache that:
//! - Holds the last known list per key with staleness metadata
//! - De-duplicates concurrent list fetches for the same key
//! - Serves stale data while a refetch is pending or deferred
//! - Lets mutations hold a key against racing list refetches
//! - Notifies subscribers of every value, invalidation and status change

mod entry;
mod store;
mod subscription;
mod traits;

pub use entry::{CacheEntry, FetchStatus, MutationId};
pub use store::ResourceCache;
pub(crate) use store::Write;
pub use subscription::{CacheEvent, CacheEventKind, Listener, Subscription};
pub use traits::{CacheResult, CacheSource, QueryKey, Resource};
