use glam::Vec3;
use scenesync_common::{ObjectId, ObjectPatch, SceneObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

/// Errors from store mutations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),
}

/// A mutation request against the store.
///
/// Serialized as `{ "type": "OBJECT_UPDATE", "payload": { ... } }` so action
/// logs read the same way they are dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Insert an object, overwriting any object with the same id.
    ObjectCreate(SceneObject),
    /// Merge a partial update over an existing object.
    ObjectUpdate { id: ObjectId, patch: ObjectPatch },
    /// Remove an object. Absent ids are a no-op.
    ObjectDelete { id: ObjectId },
}

impl Action {
    pub fn create(id: ObjectId, position: Vec3) -> Self {
        Self::ObjectCreate(SceneObject::new(id, position))
    }

    pub fn update(id: ObjectId, patch: ObjectPatch) -> Self {
        Self::ObjectUpdate { id, patch }
    }

    pub fn delete(id: ObjectId) -> Self {
        Self::ObjectDelete { id }
    }

    /// The id this action targets.
    pub fn id(&self) -> ObjectId {
        match self {
            Self::ObjectCreate(object) => object.id,
            Self::ObjectUpdate { id, .. } | Self::ObjectDelete { id } => *id,
        }
    }
}

/// The full object mapping at one point in time.
///
/// Objects sit behind `Arc` so that cloning a state shares every object, and
/// only the entries a mutation touches are replaced. Iteration follows
/// insertion order; overwriting an id keeps its slot.
#[derive(Debug, Clone, Default)]
pub struct State {
    objects: BTreeMap<ObjectId, Arc<SceneObject>>,
    order: Vec<ObjectId>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Arc<SceneObject>> {
        self.objects.get(&id)
    }

    /// Objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SceneObject>> + '_ {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.order.iter().copied()
    }

    /// The most recently inserted object still present.
    pub fn last(&self) -> Option<&Arc<SceneObject>> {
        self.order.last().and_then(|id| self.objects.get(id))
    }

    fn with_object(&self, object: SceneObject) -> Self {
        let mut next = self.clone();
        if next.objects.insert(object.id, Arc::new(object)).is_none() {
            next.order.push(object.id);
        }
        next
    }

    fn patched(&self, id: ObjectId, patch: &ObjectPatch) -> Option<Self> {
        let merged = self.objects.get(&id)?.merged(patch);
        let mut next = self.clone();
        next.objects.insert(id, Arc::new(merged));
        Some(next)
    }

    fn without(&self, id: ObjectId) -> Option<Self> {
        if !self.objects.contains_key(&id) {
            return None;
        }
        let mut next = self.clone();
        next.objects.remove(&id);
        next.order.retain(|existing| *existing != id);
        Some(next)
    }
}

/// A published, immutable [`State`]. Cloning is an `Arc` bump.
///
/// Two snapshots are the same publication iff [`Snapshot::ptr_eq`] holds.
#[derive(Debug, Clone, Default)]
pub struct Snapshot(Arc<State>);

impl Snapshot {
    pub fn new(state: State) -> Self {
        Self(Arc::new(state))
    }

    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Snapshot {
    type Target = State;

    fn deref(&self) -> &State {
        &self.0
    }
}

/// Pure state transition.
///
/// Returns the input snapshot itself (same `Arc`) when the action changes
/// nothing, e.g. deleting an absent id.
pub fn reduce(current: &Snapshot, action: &Action) -> Result<Snapshot, StoreError> {
    match action {
        Action::ObjectCreate(object) => Ok(Snapshot::new(current.with_object(*object))),
        Action::ObjectUpdate { id, patch } => current
            .patched(*id, patch)
            .map(Snapshot::new)
            .ok_or(StoreError::ObjectNotFound(*id)),
        Action::ObjectDelete { id } => Ok(current
            .without(*id)
            .map(Snapshot::new)
            .unwrap_or_else(|| current.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenesync_common::Axis;

    fn created(snapshot: &Snapshot, id: ObjectId) -> Snapshot {
        reduce(snapshot, &Action::create(id, Vec3::ZERO)).unwrap()
    }

    #[test]
    fn create_inserts_in_order() {
        let (a, b, c) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        let mut s = Snapshot::default();
        for id in [a, b, c] {
            s = created(&s, id);
        }
        assert_eq!(s.ids().collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(s.last().unwrap().id, c);
    }

    #[test]
    fn create_overwrites_and_keeps_slot() {
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let s = created(&created(&Snapshot::default(), a), b);
        let s = reduce(&s, &Action::create(a, Vec3::ONE)).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.ids().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(s.get(a).unwrap().position, Vec3::ONE);
    }

    #[test]
    fn update_replaces_only_the_changed_object() {
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let before = created(&created(&Snapshot::default(), a), b);
        let after = reduce(&before, &Action::update(a, ObjectPatch::axis(Axis::X, 1.0))).unwrap();

        assert!(!Arc::ptr_eq(before.get(a).unwrap(), after.get(a).unwrap()));
        assert!(Arc::ptr_eq(before.get(b).unwrap(), after.get(b).unwrap()));
        assert_eq!(after.get(a).unwrap().position, Vec3::new(1.0, 0.0, 0.0));
        // Published snapshots are untouched.
        assert_eq!(before.get(a).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn update_missing_is_rejected() {
        let id = ObjectId::new();
        let err = reduce(&Snapshot::default(), &Action::update(id, ObjectPatch::default()));
        assert!(matches!(err, Err(StoreError::ObjectNotFound(missing)) if missing == id));
    }

    #[test]
    fn delete_then_recreate_moves_to_end() {
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let s = created(&created(&Snapshot::default(), a), b);
        let s = reduce(&s, &Action::delete(a)).unwrap();
        assert!(!s.contains(a));
        let s = created(&s, a);
        assert_eq!(s.ids().collect::<Vec<_>>(), vec![b, a]);
    }

    #[test]
    fn delete_missing_returns_same_snapshot() {
        let s = created(&Snapshot::default(), ObjectId::new());
        let next = reduce(&s, &Action::delete(ObjectId::new())).unwrap();
        assert!(next.ptr_eq(&s));
    }

    #[test]
    fn action_serializes_with_type_tag() {
        let id = ObjectId::new();
        let json = serde_json::to_value(Action::delete(id)).unwrap();
        assert_eq!(json["type"], "OBJECT_DELETE");
        assert_eq!(json["payload"]["id"], id.to_string());

        let roundtrip: Action = serde_json::from_value(json).unwrap();
        assert_eq!(roundtrip.id(), id);
    }
}
