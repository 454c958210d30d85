use crate::state::{Action, Snapshot, StoreError, reduce};
use glam::Vec3;
use scenesync_common::{ObjectId, ObjectPatch, SceneObject};
use std::fmt;
use std::sync::Arc;

/// Handle returned by [`ObjectStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&Snapshot)>;

/// The object store.
///
/// All mutations go through explicit operations. Each accepted operation
/// reduces the current snapshot, publishes the result to every subscriber in
/// subscription order, and appends the action to the log, all before the call
/// returns. There is no global instance; construct one and pass it around.
#[derive(Default)]
pub struct ObjectStore {
    current: Snapshot,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    /// Append-only log of accepted actions. Grows until drained with
    /// [`ObjectStore::drain_actions`].
    action_log: Vec<Action>,
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore")
            .field("objects", &self.current.len())
            .field("subscribers", &self.subscribers.len())
            .field("actions", &self.action_log.len())
            .finish()
    }
}

impl ObjectStore {
    /// Create an empty store with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.current.clone()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<Arc<SceneObject>> {
        self.current.get(id).cloned()
    }

    /// Insert an object. Overwrites an existing object with the same id.
    pub fn create(&mut self, id: ObjectId, position: Vec3) {
        // Creates cannot be rejected.
        let _ = self.dispatch(Action::create(id, position));
    }

    /// Merge `patch` over an existing object.
    pub fn update(&mut self, id: ObjectId, patch: ObjectPatch) -> Result<(), StoreError> {
        self.dispatch(Action::update(id, patch))
    }

    /// Remove an object. Deleting an absent id still notifies subscribers
    /// with the unchanged snapshot.
    pub fn delete(&mut self, id: ObjectId) {
        let _ = self.dispatch(Action::delete(id));
    }

    /// Reduce, publish, and log one action.
    ///
    /// A rejected action leaves the store untouched and notifies nobody.
    pub fn dispatch(&mut self, action: Action) -> Result<(), StoreError> {
        let next = reduce(&self.current, &action).inspect_err(|e| {
            tracing::warn!("rejected {:?}: {e}", action_kind(&action));
        })?;
        tracing::debug!(
            "{} {} -> {} objects",
            action_kind(&action),
            action.id().short(),
            next.len()
        );
        self.current = next;
        self.action_log.push(action);
        self.publish();
        Ok(())
    }

    /// Register a callback invoked with every published snapshot.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&Snapshot) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    /// Read-only access to the action log.
    pub fn actions(&self) -> &[Action] {
        &self.action_log
    }

    /// Drain and return the action log.
    pub fn drain_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.action_log)
    }

    /// Rebuild a store by dispatching `actions` in order.
    pub fn replay(actions: &[Action]) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for action in actions {
            store.dispatch(action.clone())?;
        }
        Ok(store)
    }

    fn publish(&mut self) {
        let snapshot = self.current.clone();
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&snapshot);
        }
    }
}

fn action_kind(action: &Action) -> &'static str {
    match action {
        Action::ObjectCreate(_) => "create",
        Action::ObjectUpdate { .. } => "update",
        Action::ObjectDelete { .. } => "delete",
    }
}
