//! In-memory resource cache with shared fetches and per-key mutation locks.

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::entry::{dedup_by_id, CacheEntry, FetchStatus, MutationId};
use super::subscription::{CacheEvent, CacheEventKind, Listener, ListenerSlot, Subscription};
use super::traits::{CacheResult, Resource};
use crate::remote::{ClientError, ClientResult};

type SharedFetch<T> = Shared<BoxFuture<'static, ClientResult<Vec<T>>>>;

struct InFlight<T> {
  generation: u64,
  shared: SharedFetch<T>,
}

struct Slot<T> {
  entry: CacheEntry<T>,
  fetch: Option<InFlight<T>>,
  /// Status to restore if the in-flight fetch is cancelled
  status_before_fetch: FetchStatus,
  /// Bumped on every write to `entry.value`
  version: u64,
  /// Fetch generation current at the last invalidation; only later fetches
  /// may clear `invalidated`
  invalidated_through: u64,
}

impl<T> Default for Slot<T> {
  fn default() -> Self {
    Self {
      entry: CacheEntry::default(),
      fetch: None,
      status_before_fetch: FetchStatus::Idle,
      version: 0,
      invalidated_through: 0,
    }
  }
}

impl<T: Resource> Slot<T> {
  fn set_status(&mut self, key: &str, status: FetchStatus, events: &mut Vec<CacheEvent>) {
    if self.entry.status != status {
      self.entry.status = status;
      events.push(CacheEvent::new(key, CacheEventKind::Status(status)));
    }
  }

  fn write_value(&mut self, key: &str, value: Option<Vec<T>>, events: &mut Vec<CacheEvent>) {
    let value = value.map(|items| {
      let (items, removed) = dedup_by_id(items);
      if removed > 0 {
        warn!(key, removed, "dropped items with duplicate ids");
      }
      items
    });
    self.entry.value = value;
    self.entry.fetched_at = Some(Utc::now());
    self.version += 1;
    events.push(CacheEvent::new(key, CacheEventKind::Updated));
  }

  fn mark_invalidated(&mut self, generation: u64) {
    self.entry.invalidated = true;
    self.invalidated_through = generation;
  }

  /// Drop the in-flight fetch so its settlement is discarded.
  fn abandon_fetch(&mut self, key: &str, events: &mut Vec<CacheEvent>) -> bool {
    match self.fetch.take() {
      Some(fetch) => {
        debug!(key, generation = fetch.generation, "cancelled list fetch");
        let status = self.status_before_fetch;
        self.set_status(key, status, events);
        true
      }
      None => false,
    }
  }
}

/// Requested change to a key's value, computed by `ResourceCache::write_with`.
pub(crate) enum Write<T> {
  /// Leave the value untouched
  Keep,
  /// Replace the list
  Set(Vec<T>),
  /// Restore the "nothing cached" state
  Clear,
}

struct CacheInner<T> {
  slots: HashMap<String, Slot<T>>,
  listeners: HashMap<String, Vec<ListenerSlot>>,
  next_listener: u64,
}

enum FetchStep<T> {
  Ready(CacheResult<Vec<T>>),
  Join(SharedFetch<T>),
  WaitForUnlock,
}

/// Process-wide keyed store of resource lists.
///
/// The cache is an explicit object: construct it once at startup and clone
/// the handle into every consumer. Clones share state.
///
/// Every operation is a short critical section that never awaits; the only
/// suspension points are the network futures handed to `fetch`.
pub struct ResourceCache<T: Resource> {
  inner: Arc<Mutex<CacheInner<T>>>,
  /// Woken whenever a key's last mutation releases it
  unlocked: Arc<Notify>,
  generation: Arc<AtomicU64>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// Per-prefix stale times; the longest matching prefix wins
  prefix_stale_times: Arc<Vec<(String, Duration)>>,
}

impl<T: Resource> ResourceCache<T> {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Mutex::new(CacheInner {
        slots: HashMap::new(),
        listeners: HashMap::new(),
        next_listener: 0,
      })),
      unlocked: Arc::new(Notify::new()),
      generation: Arc::new(AtomicU64::new(0)),
      stale_time: Duration::minutes(5),
      prefix_stale_times: Arc::new(Vec::new()),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Use a different stale time for keys starting with `prefix`.
  pub fn with_prefix_stale_time(mut self, prefix: impl Into<String>, stale_time: Duration) -> Self {
    Arc::make_mut(&mut self.prefix_stale_times).push((prefix.into(), stale_time));
    self
  }

  pub fn stale_time(&self) -> Duration {
    self.stale_time
  }

  /// Stale time that applies to `key`.
  pub fn stale_time_for(&self, key: &str) -> Duration {
    self
      .prefix_stale_times
      .iter()
      .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
      .max_by_key(|(prefix, _)| prefix.len())
      .map(|(_, stale_time)| *stale_time)
      .unwrap_or(self.stale_time)
  }

  fn current_generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  fn lock(&self) -> MutexGuard<'_, CacheInner<T>> {
    // A panicking listener never runs under this lock, so the data is intact.
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn dispatch(&self, events: Vec<CacheEvent>) {
    for event in events {
      let targets: Vec<ListenerSlot> = {
        let inner = self.lock();
        inner.listeners.get(&event.key).cloned().unwrap_or_default()
      };
      for slot in targets {
        slot.notify(&event);
      }
    }
  }

  /// Return the current entry for `key`, if it has ever been accessed.
  pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
    self.lock().slots.get(key).map(|slot| slot.entry.clone())
  }

  /// Replace the cached list for `key` and refresh its timestamp.
  ///
  /// The fetch status is left unchanged.
  pub fn set(&self, key: &str, value: Vec<T>) {
    self.write_with(key, |_, _| (Write::Set(value), ()));
  }

  /// Mark `key` so the next read refetches. The cached value stays visible.
  pub fn invalidate(&self, key: &str) {
    let events = {
      let mut inner = self.lock();
      // Fetches are numbered under this lock, so the read is ordered with them.
      let generation = self.current_generation();
      let slot = inner.slots.entry(key.to_string()).or_default();
      slot.mark_invalidated(generation);
      vec![CacheEvent::new(key, CacheEventKind::Invalidated)]
    };
    debug!(key, "invalidated");
    self.dispatch(events);
  }

  /// Invalidate every existing key starting with `prefix`.
  pub fn invalidate_prefix(&self, prefix: &str) {
    let events: Vec<CacheEvent> = {
      let mut inner = self.lock();
      // Fetches are numbered under this lock, so the read is ordered with them.
      let generation = self.current_generation();
      inner
        .slots
        .iter_mut()
        .filter(|(key, _)| key.starts_with(prefix))
        .map(|(key, slot)| {
          slot.mark_invalidated(generation);
          CacheEvent::new(key, CacheEventKind::Invalidated)
        })
        .collect()
    };
    debug!(prefix, count = events.len(), "invalidated by prefix");
    self.dispatch(events);
  }

  /// Listen for changes on `key`.
  pub fn subscribe<F>(&self, key: &str, listener: F) -> Subscription
  where
    F: Fn(&CacheEvent) + Send + Sync + 'static,
  {
    let listener: Listener = Arc::new(listener);
    let active = Arc::new(AtomicBool::new(true));

    let id = {
      let mut inner = self.lock();
      inner.slots.entry(key.to_string()).or_default();
      let id = inner.next_listener;
      inner.next_listener += 1;
      inner
        .listeners
        .entry(key.to_string())
        .or_default()
        .push(ListenerSlot {
          id,
          active: Arc::clone(&active),
          listener,
        });
      id
    };

    let inner = Arc::downgrade(&self.inner);
    let key = key.to_string();
    Subscription::new(
      active,
      Box::new(move || {
        if let Some(inner) = inner.upgrade() {
          let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
          if let Some(listeners) = inner.listeners.get_mut(&key) {
            listeners.retain(|slot| slot.id != id);
          }
        }
      }),
    )
  }

  /// Number of live subscribers on `key`.
  pub fn subscriber_count(&self, key: &str) -> usize {
    self.lock().listeners.get(key).map(Vec::len).unwrap_or(0)
  }

  /// Read-through fetch of the list for `key`.
  ///
  /// 1. Fresh cached value: returned immediately
  /// 2. A fetch already in flight: joined, no second network call, unless it
  ///    was started before the key was last invalidated
  /// 3. Key held by a mutation: the cached value is served and the refetch is
  ///    deferred; with nothing cached the read waits for the unlock
  /// 4. Otherwise the fetcher is spawned and its result settles the entry
  pub async fn fetch<F, Fut>(&self, key: &str, fetcher: F) -> ClientResult<CacheResult<Vec<T>>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ClientResult<Vec<T>>> + Send + 'static,
  {
    let mut fetcher = Some(fetcher);
    let stale_time = self.stale_time_for(key);

    loop {
      // Registered before the lock check so an unlock in between is not missed.
      let unlocked = self.unlocked.notified();

      let mut events = Vec::new();
      let step = {
        let mut inner = self.lock();
        let slot = inner.slots.entry(key.to_string()).or_default();

        let invalidated_through = slot.invalidated_through;

        if slot.entry.is_fresh(stale_time) {
          FetchStep::Ready(CacheResult::from_cache(
            slot.entry.items().to_vec(),
            slot.entry.fetched_at,
            false,
          ))
        } else if slot.entry.is_locked() {
          match &slot.entry.value {
            Some(items) => {
              debug!(key, "key locked by mutation, serving cached value");
              FetchStep::Ready(CacheResult::from_cache(
                items.clone(),
                slot.entry.fetched_at,
                true,
              ))
            }
            None => FetchStep::WaitForUnlock,
          }
        } else if let Some(in_flight) = slot
          .fetch
          .as_ref()
          .filter(|f| f.generation > invalidated_through)
        {
          debug!(key, generation = in_flight.generation, "joining in-flight fetch");
          FetchStep::Join(in_flight.shared.clone())
        } else {
          let Some(fetcher) = fetcher.take() else {
            return Err(ClientError::Cancelled);
          };
          if slot.abandon_fetch(key, &mut events) {
            debug!(key, "in-flight fetch predates invalidation, restarting");
          }
          let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
          let shared = self.spawn_fetch(key, generation, fetcher());
          slot.fetch = Some(InFlight {
            generation,
            shared: shared.clone(),
          });
          slot.status_before_fetch = slot.entry.status;
          slot.set_status(key, FetchStatus::Fetching, &mut events);
          debug!(key, generation, "started list fetch");
          FetchStep::Join(shared)
        }
      };
      self.dispatch(events);

      match step {
        FetchStep::Ready(result) => return Ok(result),
        FetchStep::Join(shared) => return shared.await.map(CacheResult::from_network),
        FetchStep::WaitForUnlock => unlocked.await,
      }
    }
  }

  fn spawn_fetch<Fut>(&self, key: &str, generation: u64, future: Fut) -> SharedFetch<T>
  where
    Fut: Future<Output = ClientResult<Vec<T>>> + Send + 'static,
  {
    let cache = self.clone();
    let key = key.to_string();
    let handle = tokio::spawn(async move {
      let result = future.await;
      cache.settle_fetch(&key, generation, result)
    });

    async move {
      handle.await.unwrap_or_else(|e| {
        Err(ClientError::Network {
          message: format!("fetch task failed: {}", e),
        })
      })
    }
    .boxed()
    .shared()
  }

  fn settle_fetch(
    &self,
    key: &str,
    generation: u64,
    result: ClientResult<Vec<T>>,
  ) -> ClientResult<Vec<T>> {
    let mut events = Vec::new();
    let outcome = {
      let mut inner = self.lock();
      let Some(slot) = inner.slots.get_mut(key) else {
        return Err(ClientError::Cancelled);
      };
      match &slot.fetch {
        Some(in_flight) if in_flight.generation == generation => {}
        _ => {
          debug!(key, generation, "discarding result of cancelled fetch");
          return Err(ClientError::Cancelled);
        }
      }
      slot.fetch = None;

      match result {
        Ok(items) => {
          slot.write_value(key, Some(items), &mut events);
          if generation > slot.invalidated_through {
            slot.entry.invalidated = false;
          }
          slot.entry.last_error = None;
          slot.set_status(key, FetchStatus::Success, &mut events);
          Ok(slot.entry.items().to_vec())
        }
        Err(err) => {
          warn!(key, error = %err, "list fetch failed");
          slot.entry.last_error = Some(err.clone());
          slot.set_status(key, FetchStatus::Error, &mut events);
          Err(err)
        }
      }
    };
    self.dispatch(events);
    outcome
  }

  /// Abandon the pending list fetch for `key`, if any.
  ///
  /// Listeners never hear about the abandoned result. The network request
  /// itself is allowed to finish.
  pub fn cancel(&self, key: &str) -> bool {
    let mut events = Vec::new();
    let cancelled = {
      let mut inner = self.lock();
      match inner.slots.get_mut(key) {
        Some(slot) => slot.abandon_fetch(key, &mut events),
        None => false,
      }
    };
    self.dispatch(events);
    cancelled
  }

  /// Hold `key` against list refetches for the duration of a mutation.
  ///
  /// Any in-flight fetch is cancelled. The key is released when the returned
  /// guard is dropped.
  pub(crate) fn begin_mutation(&self, key: &str, id: MutationId) -> MutationGuard<T> {
    let mut events = Vec::new();
    {
      let mut inner = self.lock();
      let slot = inner.slots.entry(key.to_string()).or_default();
      slot.abandon_fetch(key, &mut events);
      slot.entry.in_flight_mutations.insert(id);
    }
    debug!(key, mutation = %id, "key locked");
    self.dispatch(events);

    MutationGuard {
      cache: self.clone(),
      key: key.to_string(),
      id,
    }
  }

  fn end_mutation(&self, key: &str, id: MutationId) {
    let released = {
      let mut inner = self.lock();
      match inner.slots.get_mut(key) {
        Some(slot) => {
          slot.entry.in_flight_mutations.remove(&id);
          !slot.entry.is_locked()
        }
        None => true,
      }
    };
    debug!(key, mutation = %id, released, "mutation finished");
    if released {
      self.unlocked.notify_waiters();
    }
  }

  /// Atomically compute and apply a write against the current value.
  ///
  /// The closure receives the current list and the write version; the
  /// returned version is the one after the write.
  pub(crate) fn write_with<R>(
    &self,
    key: &str,
    f: impl FnOnce(Option<&[T]>, u64) -> (Write<T>, R),
  ) -> (R, u64) {
    let mut events = Vec::new();
    let out = {
      let mut inner = self.lock();
      let slot = inner.slots.entry(key.to_string()).or_default();
      let (write, out) = f(slot.entry.value.as_deref(), slot.version);
      match write {
        Write::Keep => {}
        Write::Set(items) => slot.write_value(key, Some(items), &mut events),
        Write::Clear => slot.write_value(key, None, &mut events),
      }
      (out, slot.version)
    };
    self.dispatch(events);
    out
  }
}

impl<T: Resource> Default for ResourceCache<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Resource> Clone for ResourceCache<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      unlocked: Arc::clone(&self.unlocked),
      generation: Arc::clone(&self.generation),
      stale_time: self.stale_time,
      prefix_stale_times: Arc::clone(&self.prefix_stale_times),
    }
  }
}

/// Releases a mutation's hold on a key when dropped.
pub(crate) struct MutationGuard<T: Resource> {
  cache: ResourceCache<T>,
  key: String,
  id: MutationId,
}

impl<T: Resource> Drop for MutationGuard<T> {
  fn drop(&mut self) {
    self.cache.end_mutation(&self.key, self.id);
  }
}
