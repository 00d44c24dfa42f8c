//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Trait for items that can live in a resource list cache.
///
/// Implementors provide a stable identity plus the local effects the
/// mutation orchestrator applies optimistically before the server answers.
pub trait Resource:
  Clone + PartialEq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
  /// Payload sent to create a new item.
  type Draft: Clone + Debug + Send + Sync + Serialize + 'static;

  /// Payload sent to update an existing item.
  type Patch: Clone + Debug + Send + Sync + Serialize + 'static;

  /// Unique identifier of this item (server-assigned, or a correlation token
  /// for an optimistic placeholder).
  fn id(&self) -> &str;

  /// Resource collection name, used as the REST path segment (e.g. "products").
  fn entity_type() -> &'static str;

  /// Build the optimistic placeholder shown while a create is in flight.
  fn placeholder(token: &str, draft: &Self::Draft) -> Self;

  /// Id of the item a patch targets.
  fn patch_target(patch: &Self::Patch) -> &str;

  /// Apply a patch's fields to this item in place.
  fn apply_patch(&mut self, patch: &Self::Patch);
}

/// Trait for typed cache keys.
pub trait QueryKey {
  /// Stable key string used for lookup in the cache.
  fn cache_key(&self) -> String;

  /// Human readable description for logs and titles.
  fn description(&self) -> String;
}

/// Result from a cache read, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched (if from cache)
  pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, fetched_at: Option<DateTime<Utc>>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      fetched_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache, stale but served because a mutation holds the key
  CacheStale,
}
