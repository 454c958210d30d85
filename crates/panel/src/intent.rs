use crate::explorer::SliderSpec;
use glam::Vec3;
use scenesync_common::{Axis, ObjectId, ObjectPatch};
use scenesync_store::{ObjectStore, Snapshot, StoreError};

/// A user interaction on the panel.
///
/// The panel emits intents; [`ControlPanel::apply`] turns them into store
/// operations. Nothing else reads raw widget events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelIntent {
    /// "Add": create a new object at the origin.
    Add,
    /// "Remove": delete the most recently inserted object.
    Remove,
    /// A slider moved.
    SetAxis { id: ObjectId, axis: Axis, value: f32 },
}

/// Seed the store with one object at the origin. Returns its id.
pub fn bootstrap(store: &mut ObjectStore) -> ObjectId {
    let id = ObjectId::new();
    store.create(id, Vec3::ZERO);
    tracing::info!("bootstrapped object {}", id.short());
    id
}

/// Dispatches panel intents against a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlPanel {
    slider: SliderSpec,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `slider` for every axis. Reversed bounds are put back in order.
    pub fn with_slider(slider: SliderSpec) -> Self {
        Self {
            slider: slider.normalized(),
        }
    }

    pub fn slider(&self) -> SliderSpec {
        self.slider
    }

    /// The object "Remove" would delete: the last one in insertion order.
    pub fn remove_target(snapshot: &Snapshot) -> Option<ObjectId> {
        snapshot.last().map(|object| object.id)
    }

    /// Apply one intent. Returns the id it affected, if any.
    ///
    /// "Remove" on an empty store does nothing and returns `Ok(None)`.
    /// Slider values are clamped and snapped before they reach the store.
    pub fn apply(
        &self,
        store: &mut ObjectStore,
        intent: PanelIntent,
    ) -> Result<Option<ObjectId>, StoreError> {
        match intent {
            PanelIntent::Add => {
                let id = ObjectId::new();
                store.create(id, Vec3::ZERO);
                Ok(Some(id))
            }
            PanelIntent::Remove => {
                let Some(id) = Self::remove_target(&store.snapshot()) else {
                    tracing::debug!("remove with no objects");
                    return Ok(None);
                };
                store.delete(id);
                Ok(Some(id))
            }
            PanelIntent::SetAxis { id, axis, value } => {
                let value = self.slider.snap(value);
                store.update(id, ObjectPatch::axis(axis, value))?;
                Ok(Some(id))
            }
        }
    }
}
