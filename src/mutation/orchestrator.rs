//! Optimistic create/update/delete with rollback and reconciliation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::state::{Intent, MutationKind, MutationState, Settled};
use crate::cache::{MutationId, Resource, ResourceCache, Write};
use crate::remote::{ClientError, ClientResult, Deleted, RemoteResource};

/// Prefix of the correlation tokens used as placeholder ids for creates.
pub const CORRELATION_PREFIX: &str = "optimistic:";

/// Runs mutations against a remote resource while keeping a cache key in
/// step with the expected outcome.
///
/// Each mutation:
/// 1. Locks the key, cancelling any in-flight list fetch
/// 2. Snapshots the cached list and applies its local effect
/// 3. Calls the remote operation
/// 4. Reconciles with the server result, or rolls back on failure
/// 5. Unlocks the key, then invalidates it so a refetch confirms the result
///
/// Optimistic applies on one key are serialized by the cache; network calls
/// are not. Once applied, a mutation runs to completion even if the caller
/// stops waiting for it.
pub struct MutationOrchestrator<T: Resource, C> {
  cache: ResourceCache<T>,
  client: Arc<C>,
  next_id: Arc<AtomicU64>,
}

impl<T: Resource, C: RemoteResource<T>> MutationOrchestrator<T, C> {
  pub fn new(cache: ResourceCache<T>, client: Arc<C>) -> Self {
    Self {
      cache,
      client,
      next_id: Arc::new(AtomicU64::new(0)),
    }
  }

  pub fn cache(&self) -> &ResourceCache<T> {
    &self.cache
  }

  /// Create an item, showing a placeholder until the server assigns its id.
  pub async fn create(&self, key: &str, draft: T::Draft) -> ClientResult<T> {
    let id = self.next_mutation_id();
    let token = format!("{}{}", CORRELATION_PREFIX, id.0);
    let intent = Intent::Create {
      placeholder: T::placeholder(&token, &draft),
      token,
    };

    self
      .run(key, id, intent, move |client| async move {
        client.create(&draft).await.map(Settled::Item)
      })
      .await
      .and_then(|settled| match settled {
        Settled::Item(item) => Ok(item),
        Settled::Deleted { .. } => Err(unexpected_result(MutationKind::Create)),
      })
  }

  /// Update an item, patching the cached copy immediately.
  pub async fn update(&self, key: &str, patch: T::Patch) -> ClientResult<T> {
    let id = self.next_mutation_id();
    let intent = Intent::Update {
      patch: patch.clone(),
    };

    self
      .run(key, id, intent, move |client| async move {
        client.update(&patch).await.map(Settled::Item)
      })
      .await
      .and_then(|settled| match settled {
        Settled::Item(item) => Ok(item),
        Settled::Deleted { .. } => Err(unexpected_result(MutationKind::Update)),
      })
  }

  /// Delete an item, removing it from the cached list immediately.
  ///
  /// Deleting an item that is not cached still calls the server and still
  /// invalidates the key.
  pub async fn delete(&self, key: &str, item_id: &str) -> ClientResult<Deleted> {
    let id = self.next_mutation_id();
    let target = item_id.to_string();
    let intent = Intent::Delete { id: target.clone() };

    self
      .run(key, id, intent, move |client| async move {
        client
          .delete(&target)
          .await
          .map(|deleted| Settled::Deleted { id: deleted.id })
      })
      .await
      .and_then(|settled| match settled {
        Settled::Deleted { id } => Ok(Deleted { id }),
        Settled::Item(_) => Err(unexpected_result(MutationKind::Delete)),
      })
  }

  fn next_mutation_id(&self) -> MutationId {
    MutationId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
  }

  async fn run<F, Fut>(
    &self,
    key: &str,
    id: MutationId,
    intent: Intent<T>,
    remote: F,
  ) -> ClientResult<Settled<T>>
  where
    F: FnOnce(Arc<C>) -> Fut + Send + 'static,
    Fut: Future<Output = ClientResult<Settled<T>>> + Send + 'static,
  {
    let mut attempt = Attempt::new(key, id, intent.kind());

    // Lock, snapshot and apply happen before the first suspension point.
    let guard = self.cache.begin_mutation(key, id);
    let ((snapshot, undo), applied_version) = self.cache.write_with(key, |current, _| {
      let snapshot = current.map(<[T]>::to_vec);
      let (write, undo) = intent.apply(current);
      (write, (snapshot, undo))
    });
    attempt.advance(MutationState::AppliedOptimistically);

    let cache = self.cache.clone();
    let client = Arc::clone(&self.client);
    let key = key.to_string();

    let settle = tokio::spawn(async move {
      let result = remote(client).await;

      match &result {
        Ok(settled) => {
          cache.write_with(&key, |current, _| (undo.reconcile(current, settled), ()));
          attempt.advance(MutationState::SettledSuccess);
        }
        Err(err) => {
          cache.write_with(&key, |current, version| {
            let write = if version == applied_version {
              match snapshot {
                Some(items) => Write::Set(items),
                None => Write::Clear,
              }
            } else {
              debug!(key = %key, mutation = %id, "key changed since apply, undoing own effect only");
              undo.revert(current)
            };
            (write, ())
          });
          warn!(key = %key, mutation = %id, error = %err, "mutation failed, rolled back");
          attempt.advance(MutationState::SettledRolledBack);
        }
      }

      drop(guard);
      cache.invalidate(&key);
      cache.invalidate_prefix(&format!("{}?", key));
      result
    });

    settle.await.unwrap_or_else(|e| {
      Err(ClientError::Network {
        message: format!("mutation task failed: {}", e),
      })
    })
  }
}

impl<T: Resource, C> Clone for MutationOrchestrator<T, C> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      client: Arc::clone(&self.client),
      next_id: Arc::clone(&self.next_id),
    }
  }
}

fn unexpected_result(kind: MutationKind) -> ClientError {
  ClientError::Decode {
    message: format!("unexpected result for {}", kind),
  }
}

/// Tracks one mutation's state and logs each transition.
struct Attempt {
  key: String,
  id: MutationId,
  kind: MutationKind,
  state: MutationState,
}

impl Attempt {
  fn new(key: &str, id: MutationId, kind: MutationKind) -> Self {
    Self {
      key: key.to_string(),
      id,
      kind,
      state: MutationState::Pending,
    }
  }

  fn advance(&mut self, next: MutationState) {
    debug_assert!(
      self.state.can_transition_to(next),
      "illegal mutation transition {:?} -> {:?}",
      self.state,
      next
    );
    self.state = next;
    if next.is_settled() {
      info!(key = %self.key, mutation = %self.id, kind = %self.kind, state = ?next, "mutation settled");
    } else {
      debug!(key = %self.key, mutation = %self.id, kind = %self.kind, state = ?next, "mutation state");
    }
  }
}
