//! Scene Reconciler: keeps the scene graph in step with the object store.
//!
//! Each published snapshot is diffed against a private cache of materialized
//! entries. New ids are created, ids whose object `Arc` changed are torn down
//! and rebuilt, and ids that disappeared are disposed.
//!
//! # Invariants
//! - After a successful pass the cached ids equal the snapshot's ids.
//! - An id is never materialized twice at once.
//! - The cache never holds an entry whose primitive was already disposed.

mod factory;
mod reconciler;

pub use factory::{Disposer, FactoryError, SceneEntryFactory, SphereFactory};
pub use reconciler::{ReconcileError, ReconcileReport, Reconciler, Task, subscribe};
