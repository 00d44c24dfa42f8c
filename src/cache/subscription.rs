//! Publish/subscribe plumbing for cache change notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::entry::FetchStatus;

/// What changed on a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEventKind {
  /// The cached list was replaced
  Updated,
  /// The key was marked for a mandatory refetch
  Invalidated,
  /// The fetch status changed
  Status(FetchStatus),
}

/// Notification delivered to subscribers of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
  pub key: String,
  pub kind: CacheEventKind,
}

impl CacheEvent {
  pub(crate) fn new(key: &str, kind: CacheEventKind) -> Self {
    Self {
      key: key.to_string(),
      kind,
    }
  }
}

/// Callback invoked for every event on a subscribed key.
pub type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// A registered listener. `active` is cleared on unsubscribe and checked
/// right before every invocation.
#[derive(Clone)]
pub(crate) struct ListenerSlot {
  pub id: u64,
  pub active: Arc<AtomicBool>,
  pub listener: Listener,
}

impl ListenerSlot {
  pub fn notify(&self, event: &CacheEvent) {
    if self.active.load(Ordering::SeqCst) {
      (self.listener)(event);
    }
  }
}

/// Handle returned by `ResourceCache::subscribe`.
///
/// Dropping the handle unsubscribes. Once `unsubscribe` (or drop) returns the
/// listener is never invoked again, including for a dispatch already in
/// progress.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
  active: Arc<AtomicBool>,
  detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
  pub(crate) fn new(active: Arc<AtomicBool>, detach: Box<dyn FnOnce() + Send + Sync>) -> Self {
    Self {
      active,
      detach: Some(detach),
    }
  }

  /// Stop receiving notifications.
  pub fn unsubscribe(mut self) {
    self.release();
  }

  pub fn is_active(&self) -> bool {
    self.active.load(Ordering::SeqCst)
  }

  fn release(&mut self) {
    self.active.store(false, Ordering::SeqCst);
    if let Some(detach) = self.detach.take() {
      detach();
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.release();
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("active", &self.is_active())
      .finish_non_exhaustive()
  }
}
