//! Planning module for reconcile decisions.
//!
//! This module compares desired specs with observed views. It owns the
//! order-independent list equality, the storage replace decision, and the
//! diff engine that combines them into a [`ReconcileAction`].

mod diff;
mod equivalence;
mod storage;

pub use diff::{ApplicationDiff, DiffDetail, DiffEngine, ReconcileAction};
pub use equivalence::{UnorderedStringSet, equal, order_independent_requires_replace};
pub use storage::{ReplaceDecision, StorageSpec, decide, storage_requires_replace};
