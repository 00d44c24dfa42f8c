//! Mutation states and the local list transforms a mutation owns.

use std::fmt;

use crate::cache::{Resource, Write};

/// Lifecycle of one mutation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
  /// Created, nothing applied yet
  Pending,
  /// The optimistic effect is visible in the cache; the remote call is running
  AppliedOptimistically,
  /// The server accepted the change and the cache was reconciled
  SettledSuccess,
  /// The server rejected the change and the optimistic effect was undone
  SettledRolledBack,
}

impl MutationState {
  /// Whether moving from `self` to `next` is a legal transition.
  pub fn can_transition_to(self, next: MutationState) -> bool {
    matches!(
      (self, next),
      (Self::Pending, Self::AppliedOptimistically)
        | (Self::AppliedOptimistically, Self::SettledSuccess)
        | (Self::AppliedOptimistically, Self::SettledRolledBack)
    )
  }

  pub fn is_settled(self) -> bool {
    matches!(self, Self::SettledSuccess | Self::SettledRolledBack)
  }
}

/// Kind of change a mutation makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
  Create,
  Update,
  Delete,
}

impl fmt::Display for MutationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Create => write!(f, "create"),
      Self::Update => write!(f, "update"),
      Self::Delete => write!(f, "delete"),
    }
  }
}

/// The local effect a mutation intends to apply.
#[derive(Debug, Clone)]
pub(crate) enum Intent<T: Resource> {
  Create { token: String, placeholder: T },
  Update { patch: T::Patch },
  Delete { id: String },
}

/// What a mutation changed, so it can be undone or reconciled without
/// touching items other mutations own.
#[derive(Debug, Clone)]
pub(crate) enum Undo<T> {
  /// The optimistic step found nothing to change
  Nothing,
  /// A placeholder was appended under this correlation token
  RemovePlaceholder { token: String },
  /// An item was removed from this position
  Reinsert { index: usize, item: T },
  /// An item was patched from `before` into `after`
  Revert { before: T, after: T },
}

/// Authoritative result returned by the server.
#[derive(Debug, Clone)]
pub(crate) enum Settled<T> {
  Item(T),
  Deleted { id: String },
}

impl<T: Resource> Intent<T> {
  pub fn kind(&self) -> MutationKind {
    match self {
      Self::Create { .. } => MutationKind::Create,
      Self::Update { .. } => MutationKind::Update,
      Self::Delete { .. } => MutationKind::Delete,
    }
  }

  /// Compute the optimistic list and the record needed to undo it.
  pub fn apply(&self, current: Option<&[T]>) -> (Write<T>, Undo<T>) {
    match self {
      Self::Create { token, placeholder } => {
        let mut items = current.map(<[T]>::to_vec).unwrap_or_default();
        items.push(placeholder.clone());
        (
          Write::Set(items),
          Undo::RemovePlaceholder {
            token: token.clone(),
          },
        )
      }
      Self::Update { patch } => {
        let target = T::patch_target(patch);
        let Some(items) = current else {
          return (Write::Keep, Undo::Nothing);
        };
        let Some(index) = items.iter().position(|item| item.id() == target) else {
          return (Write::Keep, Undo::Nothing);
        };
        let mut items = items.to_vec();
        let before = items[index].clone();
        items[index].apply_patch(patch);
        let after = items[index].clone();
        (Write::Set(items), Undo::Revert { before, after })
      }
      Self::Delete { id } => {
        let Some(items) = current else {
          return (Write::Keep, Undo::Nothing);
        };
        let Some(index) = items.iter().position(|item| item.id() == id) else {
          return (Write::Keep, Undo::Nothing);
        };
        let mut items = items.to_vec();
        let item = items.remove(index);
        (Write::Set(items), Undo::Reinsert { index, item })
      }
    }
  }
}

impl<T: Resource> Undo<T> {
  /// Undo only this mutation's effect against the current list.
  ///
  /// Used when other mutations wrote the key after this one applied, so the
  /// raw snapshot would discard their state.
  pub fn revert(&self, current: Option<&[T]>) -> Write<T> {
    match self {
      Self::Nothing => Write::Keep,
      Self::RemovePlaceholder { token } => match current {
        Some(items) if items.iter().any(|item| item.id() == token) => Write::Set(
          items
            .iter()
            .filter(|item| item.id() != token)
            .cloned()
            .collect(),
        ),
        _ => Write::Keep,
      },
      Self::Reinsert { index, item } => {
        let mut items = current.map(<[T]>::to_vec).unwrap_or_default();
        if items.iter().any(|existing| existing.id() == item.id()) {
          return Write::Keep;
        }
        let index = (*index).min(items.len());
        items.insert(index, item.clone());
        Write::Set(items)
      }
      Self::Revert { before, after } => replace_if_owned(current, after, before.clone()),
    }
  }

  /// Fold the server's authoritative result into the current list.
  pub fn reconcile(&self, current: Option<&[T]>, settled: &Settled<T>) -> Write<T> {
    match (self, settled) {
      (Self::RemovePlaceholder { token }, Settled::Item(server)) => {
        let mut items: Vec<T> = current
          .map(<[T]>::to_vec)
          .unwrap_or_default()
          .into_iter()
          .filter(|item| item.id() != server.id())
          .collect();
        match items.iter().position(|item| item.id() == token) {
          Some(index) => items[index] = server.clone(),
          None => items.push(server.clone()),
        }
        Write::Set(items)
      }
      (Self::Revert { after, .. }, Settled::Item(server)) => {
        replace_if_owned(current, after, server.clone())
      }
      (_, Settled::Deleted { id }) => match current {
        Some(items) if items.iter().any(|item| item.id() == id) => Write::Set(
          items
            .iter()
            .filter(|item| item.id() != id)
            .cloned()
            .collect(),
        ),
        _ => Write::Keep,
      },
      _ => Write::Keep,
    }
  }
}

/// Replace the item matching `owned` with `next`, but only while it still
/// holds exactly the state this mutation wrote.
fn replace_if_owned<T: Resource>(current: Option<&[T]>, owned: &T, next: T) -> Write<T> {
  let Some(items) = current else {
    return Write::Keep;
  };
  match items.iter().position(|item| item.id() == owned.id()) {
    Some(index) if items[index] == *owned => {
      let mut items = items.to_vec();
      items[index] = next;
      Write::Set(items)
    }
    _ => Write::Keep,
  }
}
