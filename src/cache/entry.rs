//! Cache entry state for a single resource key.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::traits::Resource;
use crate::remote::ClientError;

/// Fetch status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
  /// Entry exists but nothing has been fetched yet
  #[default]
  Idle,
  /// A list fetch is in flight
  Fetching,
  /// The last fetch succeeded
  Success,
  /// The last fetch failed; the previous value (if any) is kept
  Error,
}

/// Identifier of a mutation attempt holding a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(pub u64);

impl fmt::Display for MutationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "m{}", self.0)
  }
}

/// Point-in-time view of one cache key.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  /// Last known list, in server response order
  pub value: Option<Vec<T>>,
  pub status: FetchStatus,
  /// When `value` was last written
  pub fetched_at: Option<DateTime<Utc>>,
  /// Set by `invalidate`; the next read must go to the network
  pub invalidated: bool,
  /// Mutations currently holding this key
  pub in_flight_mutations: BTreeSet<MutationId>,
  /// Error from the most recent failed fetch
  pub last_error: Option<ClientError>,
}

impl<T> Default for CacheEntry<T> {
  fn default() -> Self {
    Self {
      value: None,
      status: FetchStatus::Idle,
      fetched_at: None,
      invalidated: false,
      in_flight_mutations: BTreeSet::new(),
      last_error: None,
    }
  }
}

impl<T> CacheEntry<T> {
  /// Items in the cached list, empty if nothing has been cached.
  pub fn items(&self) -> &[T] {
    self.value.as_deref().unwrap_or(&[])
  }

  /// Whether a mutation currently holds the key against list refetches.
  pub fn is_locked(&self) -> bool {
    !self.in_flight_mutations.is_empty()
  }

  /// Check if the value is older than `stale_time`.
  pub fn is_stale(&self, stale_time: Duration) -> bool {
    match self.fetched_at {
      Some(at) => Utc::now() - at > stale_time,
      None => true,
    }
  }

  /// Whether a read can be served from `value` without touching the network.
  pub fn is_fresh(&self, stale_time: Duration) -> bool {
    self.value.is_some() && !self.invalidated && !self.is_stale(stale_time)
  }
}

/// Drop later items whose id was already seen, keeping the first occurrence.
///
/// Returns the list and the number of duplicates removed.
pub(crate) fn dedup_by_id<T: Resource>(items: Vec<T>) -> (Vec<T>, usize) {
  let mut seen = HashSet::with_capacity(items.len());
  let before = items.len();
  let items: Vec<T> = items
    .into_iter()
    .filter(|item| seen.insert(item.id().to_string()))
    .collect();
  let removed = before - items.len();
  (items, removed)
}
