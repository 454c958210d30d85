//! Object Store: the single source of truth for object attributes.
//!
//! # Invariants
//! - Every accepted mutation publishes a new [`Snapshot`] before returning.
//! - Published snapshots are never mutated.
//! - An object untouched by a mutation keeps the same `Arc` in the next snapshot;
//!   a changed object always gets a fresh one.

pub mod state;
pub mod store;

pub use state::{Action, Snapshot, State, StoreError, reduce};
pub use store::{ObjectStore, SubscriptionId};
