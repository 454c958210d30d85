use crate::factory::{Disposer, FactoryError, SceneEntryFactory};
use scenesync_common::{ObjectId, SceneObject};
use scenesync_store::{ObjectStore, Snapshot, SubscriptionId};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// One side effect planned by a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Materialize an object the cache has never seen.
    Create(Arc<SceneObject>),
    /// Tear down the cached entry and rebuild it from the new object.
    Update(Arc<SceneObject>),
    /// Dispose the cached entry of an object no longer in the snapshot.
    Delete(ObjectId),
}

/// Counts of tasks applied in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_noop(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} deleted={}",
            self.created, self.updated, self.deleted
        )
    }
}

/// A pass stopped early. Tasks before the failing one stay applied.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to materialize {id} after {applied} of {planned} tasks: {source}")]
    Factory {
        id: ObjectId,
        applied: usize,
        planned: usize,
        source: FactoryError,
    },
}

struct CacheEntry {
    disposer: Disposer,
    last_object: Arc<SceneObject>,
}

/// Diffs snapshots against what is currently materialized.
///
/// Change detection is by `Arc` identity: the store hands out a fresh `Arc`
/// for every object it touches and reuses the old one otherwise.
pub struct Reconciler<F> {
    factory: F,
    cache: BTreeMap<ObjectId, CacheEntry>,
    /// Last snapshot fully applied.
    applied: Option<Snapshot>,
    render_hook: Option<Box<dyn FnMut()>>,
    passes: u64,
}

impl<F> fmt::Debug for Reconciler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("materialized", &self.cache.len())
            .field("passes", &self.passes)
            .finish()
    }
}

impl<F: SceneEntryFactory> Reconciler<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            cache: BTreeMap::new(),
            applied: None,
            render_hook: None,
            passes: 0,
        }
    }

    /// Install the callback run after every successful pass.
    pub fn with_render_hook(mut self, hook: impl FnMut() + 'static) -> Self {
        self.render_hook = Some(Box::new(hook));
        self
    }

    /// Number of completed passes.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Number of materialized entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn is_materialized(&self, id: ObjectId) -> bool {
        self.cache.contains_key(&id)
    }

    pub fn materialized_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.cache.keys().copied()
    }

    /// The object an entry was last built from.
    pub fn materialized_object(&self, id: ObjectId) -> Option<&Arc<SceneObject>> {
        self.cache.get(&id).map(|entry| &entry.last_object)
    }

    /// Compute the tasks that would bring the cache in line with `snapshot`.
    ///
    /// Creates come first, in snapshot order, followed by updates and
    /// deletes in cache order.
    pub fn plan(&self, snapshot: &Snapshot) -> Vec<Task> {
        let mut tasks: Vec<Task> = snapshot
            .iter()
            .filter(|object| !self.cache.contains_key(&object.id))
            .map(|object| Task::Create(object.clone()))
            .collect();

        for (id, entry) in &self.cache {
            match snapshot.get(*id) {
                Some(object) if !Arc::ptr_eq(object, &entry.last_object) => {
                    tasks.push(Task::Update(object.clone()));
                }
                Some(_) => {}
                None => tasks.push(Task::Delete(*id)),
            }
        }
        tasks
    }

    /// Run one pass for `snapshot`, then invoke the render hook.
    ///
    /// Fails fast: the first factory error aborts the rest of the pass and
    /// skips the render. Nothing is rolled back, but every id whose old entry
    /// was disposed is dropped from the cache, so the next pass recreates it.
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();

        let unchanged = self
            .applied
            .as_ref()
            .is_some_and(|applied| applied.ptr_eq(snapshot));
        if !unchanged {
            let tasks = self.plan(snapshot);
            let planned = tasks.len();
            for (applied, task) in tasks.into_iter().enumerate() {
                self.apply(task, &mut report)
                    .map_err(|(id, source)| ReconcileError::Factory {
                        id,
                        applied,
                        planned,
                        source,
                    })
                    .inspect_err(|e| tracing::error!("reconcile aborted: {e}"))?;
            }
            self.applied = Some(snapshot.clone());
        }

        self.passes += 1;
        tracing::trace!("pass {}: {report}", self.passes);
        if let Some(hook) = self.render_hook.as_mut() {
            hook();
        }
        Ok(report)
    }

    /// Dispose every materialized entry.
    pub fn clear(&mut self) {
        for (id, entry) in std::mem::take(&mut self.cache) {
            tracing::debug!("delete {}", id.short());
            entry.disposer.dispose();
        }
        self.applied = None;
    }

    fn apply(
        &mut self,
        task: Task,
        report: &mut ReconcileReport,
    ) -> Result<(), (ObjectId, FactoryError)> {
        match task {
            Task::Create(object) => {
                debug_assert!(!self.cache.contains_key(&object.id));
                tracing::debug!("new {}", object.id.short());
                self.materialize(object)?;
                report.created += 1;
            }
            Task::Update(object) => {
                tracing::debug!("update {}", object.id.short());
                if let Some(stale) = self.cache.remove(&object.id) {
                    stale.disposer.dispose();
                }
                self.materialize(object)?;
                report.updated += 1;
            }
            Task::Delete(id) => {
                tracing::debug!("delete {}", id.short());
                if let Some(entry) = self.cache.remove(&id) {
                    entry.disposer.dispose();
                }
                report.deleted += 1;
            }
        }
        Ok(())
    }

    fn materialize(&mut self, object: Arc<SceneObject>) -> Result<(), (ObjectId, FactoryError)> {
        let disposer = self
            .factory
            .create(&object)
            .map_err(|e| (object.id, e))?;
        self.cache.insert(
            object.id,
            CacheEntry {
                disposer,
                last_object: object,
            },
        );
        Ok(())
    }
}

/// Subscribe `reconciler` to every snapshot `store` publishes.
///
/// Pass failures are logged; the next snapshot retries whatever is missing.
pub fn subscribe<F>(store: &mut ObjectStore, reconciler: Rc<RefCell<Reconciler<F>>>) -> SubscriptionId
where
    F: SceneEntryFactory + 'static,
{
    store.subscribe(move |snapshot| match reconciler.try_borrow_mut() {
        // Errors are already logged by the pass itself.
        Ok(mut reconciler) => {
            let _ = reconciler.reconcile(snapshot);
        }
        Err(_) => tracing::error!("reconciler re-entered; snapshot skipped"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use scenesync_common::{Axis, ObjectPatch};
    use std::collections::{BTreeMap, BTreeSet};

    /// Records every create and dispose, and which entries are live.
    #[derive(Default)]
    struct Ledger {
        next_entry: u64,
        created: Vec<(ObjectId, Vec3)>,
        disposed: Vec<u64>,
        live: BTreeMap<u64, ObjectId>,
        duplicate_materializations: usize,
        fail_on: Option<ObjectId>,
    }

    impl Ledger {
        fn live_ids(&self) -> BTreeSet<ObjectId> {
            self.live.values().copied().collect()
        }
    }

    fn recording_factory(
        ledger: Rc<RefCell<Ledger>>,
    ) -> impl FnMut(&SceneObject) -> Result<Disposer, FactoryError> {
        move |object: &SceneObject| {
            let mut l = ledger.borrow_mut();
            if l.fail_on == Some(object.id) {
                return Err(FactoryError::InvalidPosition { id: object.id });
            }
            if l.live.values().any(|id| *id == object.id) {
                l.duplicate_materializations += 1;
            }
            let entry = l.next_entry;
            l.next_entry += 1;
            l.created.push((object.id, object.position));
            l.live.insert(entry, object.id);

            let ledger = ledger.clone();
            Ok(Disposer::new(move || {
                let mut l = ledger.borrow_mut();
                l.disposed.push(entry);
                l.live.remove(&entry);
            }))
        }
    }

    type Harness = (
        ObjectStore,
        Rc<RefCell<Reconciler<Box<dyn FnMut(&SceneObject) -> Result<Disposer, FactoryError>>>>>,
        Rc<RefCell<Ledger>>,
    );

    fn harness() -> Harness {
        let ledger = Rc::new(RefCell::new(Ledger::default()));
        let factory: Box<dyn FnMut(&SceneObject) -> Result<Disposer, FactoryError>> =
            Box::new(recording_factory(ledger.clone()));
        let reconciler = Rc::new(RefCell::new(Reconciler::new(factory)));
        let mut store = ObjectStore::new();
        subscribe(&mut store, reconciler.clone());
        (store, reconciler, ledger)
    }

    fn ids_of(snapshot: &Snapshot) -> BTreeSet<ObjectId> {
        snapshot.ids().collect()
    }

    /// Splitmix64 step, used to drive reproducible operation sequences.
    fn splitmix64(mut state: u64) -> u64 {
        state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    #[test]
    fn first_pass_creates_everything() {
        let (mut store, reconciler, ledger) = harness();
        let (a, b) = (ObjectId::new(), ObjectId::new());
        store.create(a, Vec3::ZERO);
        store.create(b, Vec3::ONE);

        assert_eq!(ledger.borrow().created.len(), 2);
        assert_eq!(ledger.borrow().live_ids(), ids_of(&store.snapshot()));
        assert_eq!(reconciler.borrow().passes(), 2);
    }

    #[test]
    fn cache_converges_over_random_operations() {
        let (mut store, reconciler, ledger) = harness();
        let mut known: Vec<ObjectId> = Vec::new();
        let mut seed = 7u64;

        for _ in 0..500 {
            seed = splitmix64(seed);
            let pick = (seed >> 8) as usize;
            match seed % 4 {
                0 => {
                    let id = ObjectId::new();
                    known.push(id);
                    store.create(id, Vec3::ZERO);
                }
                // Re-create a previously seen id, live or deleted.
                1 if !known.is_empty() => {
                    store.create(known[pick % known.len()], Vec3::ONE);
                }
                2 if !store.is_empty() => {
                    let ids: Vec<ObjectId> = store.snapshot().ids().collect();
                    let value = (pick % 100) as f32 / 10.0 - 5.0;
                    store
                        .update(ids[pick % ids.len()], ObjectPatch::axis(Axis::X, value))
                        .unwrap();
                }
                _ if !known.is_empty() => store.delete(known[pick % known.len()]),
                _ => {}
            }

            let snapshot = store.snapshot();
            let r = reconciler.borrow();
            assert_eq!(r.materialized_ids().collect::<BTreeSet<_>>(), ids_of(&snapshot));
            assert_eq!(ledger.borrow().live_ids(), ids_of(&snapshot));
            for object in snapshot.iter() {
                assert!(Arc::ptr_eq(r.materialized_object(object.id).unwrap(), object));
            }
        }
        assert_eq!(ledger.borrow().duplicate_materializations, 0);
    }

    #[test]
    fn update_is_dispose_then_rebuild() {
        let (mut store, _reconciler, ledger) = harness();
        let a = ObjectId::new();
        store.create(a, Vec3::ZERO);
        store.update(a, ObjectPatch::axis(Axis::X, 1.0)).unwrap();

        let l = ledger.borrow();
        assert_eq!(l.created.len(), 2);
        assert_eq!(l.created[1], (a, Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(l.disposed, vec![0]);
        assert_eq!(l.live.len(), 1);
        assert!(l.live.contains_key(&1));
    }

    #[test]
    fn delete_then_recreate_creates_once() {
        let (mut store, reconciler, ledger) = harness();
        let a = ObjectId::new();
        store.create(a, Vec3::ZERO);
        store.delete(a);
        assert!(!reconciler.borrow().is_materialized(a));

        let created_before = ledger.borrow().created.len();
        store.create(a, Vec3::ZERO);
        assert_eq!(ledger.borrow().created.len(), created_before + 1);
        assert_eq!(ledger.borrow().live_ids(), BTreeSet::from([a]));
    }

    #[test]
    fn same_snapshot_twice_is_noop() {
        let (mut store, reconciler, ledger) = harness();
        store.create(ObjectId::new(), Vec3::ZERO);
        let snapshot = store.snapshot();

        let report = reconciler.borrow_mut().reconcile(&snapshot).unwrap();
        assert!(report.is_noop());
        assert!(reconciler.borrow().plan(&snapshot).is_empty());
        assert_eq!(ledger.borrow().created.len(), 1);
    }

    #[test]
    fn untouched_objects_are_not_rebuilt() {
        let (mut store, _reconciler, ledger) = harness();
        let (a, b) = (ObjectId::new(), ObjectId::new());
        store.create(a, Vec3::ZERO);
        store.create(b, Vec3::ZERO);
        store.update(b, ObjectPatch::axis(Axis::Y, 2.0)).unwrap();

        let l = ledger.borrow();
        assert_eq!(l.created.len(), 3);
        // Entry 0 is a, entry 1 was b's first build.
        assert_eq!(l.disposed, vec![1]);
        assert!(l.live.contains_key(&0));
    }

    #[test]
    fn replayed_snapshot_looks_entirely_changed() {
        let (mut store, reconciler, _ledger) = harness();
        store.create(ObjectId::new(), Vec3::ZERO);
        store.create(ObjectId::new(), Vec3::ZERO);

        // Equal values, but no shared Arcs.
        let replayed = ObjectStore::replay(store.actions()).unwrap();
        let plan = reconciler.borrow().plan(&replayed.snapshot());
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|t| matches!(t, Task::Update(_))));
    }

    #[test]
    fn plan_orders_creates_first() {
        let (mut store, reconciler, _ledger) = harness();
        let (a, b) = (ObjectId::new(), ObjectId::new());
        store.create(a, Vec3::ZERO);

        let next = scenesync_store::reduce(&store.snapshot(), &scenesync_store::Action::delete(a))
            .and_then(|s| scenesync_store::reduce(&s, &scenesync_store::Action::create(b, Vec3::ZERO)))
            .unwrap();
        let plan = reconciler.borrow().plan(&next);
        assert_eq!(plan.len(), 2);
        assert!(matches!(&plan[0], Task::Create(o) if o.id == b));
        assert_eq!(plan[1], Task::Delete(a));
    }

    #[test]
    fn factory_failure_aborts_pass_and_recovers() {
        let (mut store, reconciler, ledger) = harness();
        let (a, b) = (ObjectId::new(), ObjectId::new());
        store.create(a, Vec3::ZERO);

        ledger.borrow_mut().fail_on = Some(a);
        store.update(a, ObjectPatch::axis(Axis::Z, 1.0)).unwrap();
        // Old entry was disposed before the rebuild failed.
        assert!(!reconciler.borrow().is_materialized(a));
        assert!(ledger.borrow().live.is_empty());

        // Same snapshot retried while still failing.
        let err = reconciler.borrow_mut().reconcile(&store.snapshot()).unwrap_err();
        assert!(matches!(err, ReconcileError::Factory { id, applied: 0, planned: 1, .. } if id == a));

        ledger.borrow_mut().fail_on = None;
        store.create(b, Vec3::ZERO);
        assert_eq!(ledger.borrow().live_ids(), BTreeSet::from([a, b]));
        assert_eq!(
            reconciler.borrow().materialized_object(a).unwrap().position,
            Vec3::new(0.0, 0.0, 1.0)
        );
    }

    #[test]
    fn render_hook_runs_after_successful_passes_only() {
        let ledger = Rc::new(RefCell::new(Ledger::default()));
        let renders = Rc::new(RefCell::new(0));
        let r = renders.clone();
        let mut reconciler =
            Reconciler::new(recording_factory(ledger.clone())).with_render_hook(move || *r.borrow_mut() += 1);

        let mut store = ObjectStore::new();
        let a = ObjectId::new();
        store.create(a, Vec3::ZERO);
        reconciler.reconcile(&store.snapshot()).unwrap();
        reconciler.reconcile(&store.snapshot()).unwrap();
        assert_eq!(*renders.borrow(), 2);

        ledger.borrow_mut().fail_on = Some(a);
        store.update(a, ObjectPatch::axis(Axis::X, 2.0)).unwrap();
        assert!(reconciler.reconcile(&store.snapshot()).is_err());
        assert_eq!(*renders.borrow(), 2);
        assert_eq!(reconciler.passes(), 2);
    }

    #[test]
    fn clear_disposes_everything() {
        let (mut store, reconciler, ledger) = harness();
        store.create(ObjectId::new(), Vec3::ZERO);
        store.create(ObjectId::new(), Vec3::ZERO);

        reconciler.borrow_mut().clear();
        assert!(reconciler.borrow().is_empty());
        assert!(ledger.borrow().live.is_empty());

        // A cleared reconciler rebuilds from the current snapshot.
        let report = reconciler.borrow_mut().reconcile(&store.snapshot()).unwrap();
        assert_eq!(report.created, 2);
    }

    #[test]
    fn report_display() {
        let report = ReconcileReport {
            created: 1,
            updated: 2,
            deleted: 3,
        };
        assert_eq!(report.total(), 6);
        assert_eq!(report.to_string(), "created=1 updated=2 deleted=3");
    }
}
