use scenesync_common::{ObjectId, SceneObject};
use scenesync_scene::{Node, Primitive, SceneHandle, WireframeSphere};
use std::fmt;
use std::rc::Rc;

/// Reverses exactly one scene-entry creation. Consumed on use.
pub struct Disposer(Box<dyn FnOnce()>);

impl Disposer {
    pub fn new(dispose: impl FnOnce() + 'static) -> Self {
        Self(Box::new(dispose))
    }

    pub fn dispose(self) {
        (self.0)()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Disposer(..)")
    }
}

/// Errors from materializing a scene entry.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("object {id} has a non-finite position")]
    InvalidPosition { id: ObjectId },
    #[error("scene is already borrowed")]
    SceneBusy,
}

/// Creates the scene entry for one object.
///
/// Each call must add exactly one primitive to the scene, and the returned
/// [`Disposer`] must remove exactly that primitive.
pub trait SceneEntryFactory {
    fn create(&mut self, object: &SceneObject) -> Result<Disposer, FactoryError>;
}

impl<F> SceneEntryFactory for F
where
    F: FnMut(&SceneObject) -> Result<Disposer, FactoryError>,
{
    fn create(&mut self, object: &SceneObject) -> Result<Disposer, FactoryError> {
        self(object)
    }
}

/// Materializes each object as a wireframe sphere at its position.
#[derive(Debug, Clone)]
pub struct SphereFactory {
    scene: SceneHandle,
    style: WireframeSphere,
}

impl SphereFactory {
    pub fn new(scene: SceneHandle) -> Self {
        Self::with_style(scene, WireframeSphere::default())
    }

    pub fn with_style(scene: SceneHandle, style: WireframeSphere) -> Self {
        Self { scene, style }
    }

    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    pub fn style(&self) -> &WireframeSphere {
        &self.style
    }
}

impl SceneEntryFactory for SphereFactory {
    fn create(&mut self, object: &SceneObject) -> Result<Disposer, FactoryError> {
        if !object.position.is_finite() {
            return Err(FactoryError::InvalidPosition { id: object.id });
        }
        let node = self
            .scene
            .try_borrow_mut()
            .map_err(|_| FactoryError::SceneBusy)?
            .add(Node::primitive(
                Primitive::WireframeSphere(self.style),
                object.position,
            ));
        tracing::debug!("new sphere #{} for {}", node.raw(), object.id.short());

        let scene = Rc::downgrade(&self.scene);
        let id = object.id;
        Ok(Disposer::new(move || {
            // A dropped scene has nothing left to detach.
            let Some(scene) = scene.upgrade() else {
                return;
            };
            match scene.try_borrow_mut() {
                Ok(mut scene) => {
                    scene.remove(node);
                    tracing::debug!("cleanup sphere #{} for {}", node.raw(), id.short());
                }
                Err(_) => tracing::error!("scene busy, sphere #{} leaked", node.raw()),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use scenesync_scene::Scene;

    #[test]
    fn create_adds_one_sphere_at_position() {
        let scene = Scene::with_default_lighting().into_handle();
        let mut factory = SphereFactory::new(scene.clone());
        let nodes_before = scene.borrow().len();

        let object = SceneObject::new(ObjectId::new(), Vec3::new(1.0, -2.0, 0.5));
        let _disposer = factory.create(&object).unwrap();

        let scene = scene.borrow();
        assert_eq!(scene.len(), nodes_before + 1);
        let (_, position, _) = scene.primitives().next().unwrap();
        assert_eq!(position, object.position);
    }

    #[test]
    fn disposer_removes_only_its_sphere() {
        let scene = Scene::with_default_lighting().into_handle();
        let mut factory = SphereFactory::new(scene.clone());

        let first = factory.create(&SceneObject::at_origin(ObjectId::new())).unwrap();
        let _second = factory
            .create(&SceneObject::new(ObjectId::new(), Vec3::ONE))
            .unwrap();
        assert_eq!(scene.borrow().primitive_count(), 2);

        first.dispose();
        let scene = scene.borrow();
        assert_eq!(scene.primitive_count(), 1);
        assert_eq!(scene.lights().count(), 3);
        assert_eq!(scene.primitives().next().unwrap().1, Vec3::ONE);
    }

    #[test]
    fn dispose_after_scene_dropped_is_harmless() {
        let scene = Scene::new().into_handle();
        let mut factory = SphereFactory::new(scene);
        let disposer = factory.create(&SceneObject::at_origin(ObjectId::new())).unwrap();
        drop(factory);
        disposer.dispose();
    }

    #[test]
    fn non_finite_position_rejected() {
        let scene = Scene::new().into_handle();
        let mut factory = SphereFactory::new(scene.clone());
        let object = SceneObject::new(ObjectId::new(), Vec3::new(f32::NAN, 0.0, 0.0));
        assert!(matches!(
            factory.create(&object),
            Err(FactoryError::InvalidPosition { .. })
        ));
        assert!(scene.borrow().is_empty());
    }

    #[test]
    fn busy_scene_reported() {
        let scene = Scene::new().into_handle();
        let mut factory = SphereFactory::new(scene.clone());
        let _guard = scene.borrow();
        assert!(matches!(
            factory.create(&SceneObject::at_origin(ObjectId::new())),
            Err(FactoryError::SceneBusy)
        ));
    }

    #[test]
    fn closures_are_factories() {
        let mut count = 0;
        let mut factory = |_: &SceneObject| {
            count += 1;
            Ok::<_, FactoryError>(Disposer::new(|| {}))
        };
        factory.create(&SceneObject::at_origin(ObjectId::new())).unwrap();
        assert_eq!(count, 1);
    }
}
