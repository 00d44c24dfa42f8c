//! Mutation orchestration: optimistic apply, rollback and reconciliation.

mod orchestrator;
mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{MutationOrchestrator, CORRELATION_PREFIX};
pub use state::{MutationKind, MutationState};
