//! # Engine
//!
//! The central container: registered entities, scheduled systems and one
//! family per node shape that has been asked for.
//!
//! ## Update cycle
//!
//! ```text
//! update(time)
//!   ├─ updating = true
//!   ├─ system.update(time) for each system, in priority order
//!   ├─ updating = false
//!   └─ update_complete ── families recycle nodes parked during the update
//! ```
//!
//! Entities, components and systems may be added or removed from inside a
//! system's update. A system removed mid-update is not run afterwards; one
//! added mid-update runs in the same update when it lands after the
//! running system. If the running system removed itself, the walk resumes
//! after the nearest system before it that is still scheduled. Re-adding a
//! system schedules a new entry, so a system that removes and re-adds
//! itself runs again in the same update when the new entry lands ahead.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::ecs::component::ComponentType;
use crate::ecs::entity::{ComponentEvent, Entity};
use crate::ecs::family::{component_matching_factory, Family, FamilyFactory};
use crate::ecs::node::{NodeShape, NodeType};
use crate::ecs::node_list::NodeList;
use crate::ecs::registry::EntityRegistry;
use crate::ecs::system::{system_key, System, SystemEntry, SystemList};
use crate::error::{EcsError, EcsResult};
use crate::signal::{Listener, Signal};

struct EngineInner {
    config: EngineConfig,
    entities: Rc<RefCell<EntityRegistry>>,
    systems: RefCell<SystemList>,
    families: RefCell<IndexMap<NodeShape, Rc<dyn Family>>>,
    family_factory: FamilyFactory,
    updating: Cell<bool>,
    entity_added: Signal<Entity>,
    entity_removed: Signal<Entity>,
    update_complete: Signal<()>,
    on_component_added: Listener<ComponentEvent>,
    on_component_removed: Listener<ComponentEvent>,
}

/// Shared handle to an engine.
///
/// # Example
///
/// ```rust
/// use ashlar_core::{Component, Engine, Entity, NodeShape};
///
/// struct Position(f32);
/// impl Component for Position {}
///
/// let engine = Engine::new();
/// let shape = NodeShape::builder().field::<Position>("position").build();
/// let nodes = engine.get_node_list(&shape);
///
/// let entity = Entity::new();
/// entity.add(Position(0.0));
/// engine.add_entity(&entity).unwrap();
/// assert_eq!(nodes.len(), 1);
///
/// entity.remove::<Position>();
/// assert!(nodes.is_empty());
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

/// Non-owning engine handle, held by families and systems.
#[derive(Clone, Default)]
pub struct WeakEngine {
    inner: Weak<EngineInner>,
}

impl WeakEngine {
    /// Returns the engine if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Engine> {
        self.inner.upgrade().map(|inner| Engine { inner })
    }
}

impl Engine {
    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_family_factory(config, component_matching_factory())
    }

    /// Creates an engine that builds families through `factory`.
    #[must_use]
    pub fn with_family_factory(config: EngineConfig, factory: FamilyFactory) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<EngineInner>| {
            let added = weak.clone();
            let on_component_added = Listener::new(move |(entity, component_type): &ComponentEvent| {
                if let Some(inner) = added.upgrade() {
                    Engine { inner }.component_added(entity, *component_type);
                }
            });
            let removed = weak.clone();
            let on_component_removed = Listener::new(move |(entity, component_type): &ComponentEvent| {
                if let Some(inner) = removed.upgrade() {
                    Engine { inner }.component_removed(entity, *component_type);
                }
            });

            EngineInner {
                entities: Rc::new(RefCell::new(EntityRegistry::with_capacity(config.entity_capacity))),
                systems: RefCell::new(SystemList::with_capacity(config.system_capacity)),
                families: RefCell::new(IndexMap::new()),
                family_factory: factory,
                updating: Cell::new(false),
                entity_added: Signal::with_capacity(config.listener_capacity),
                entity_removed: Signal::with_capacity(config.listener_capacity),
                update_complete: Signal::with_capacity(config.listener_capacity),
                on_component_added,
                on_component_removed,
                config,
            }
        });
        debug!(config = ?inner.config, "engine created");
        Self { inner }
    }

    /// The configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns `true` while [`update`](Self::update) is running systems.
    #[inline]
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.inner.updating.get()
    }

    /// Fired after an entity is registered.
    #[must_use]
    pub fn entity_added(&self) -> &Signal<Entity> {
        &self.inner.entity_added
    }

    /// Fired after an entity is unregistered.
    #[must_use]
    pub fn entity_removed(&self) -> &Signal<Entity> {
        &self.inner.entity_removed
    }

    /// Fired at the end of every update.
    #[must_use]
    pub fn update_complete(&self) -> &Signal<()> {
        &self.inner.update_complete
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Registers an entity and offers it to every family.
    ///
    /// # Errors
    ///
    /// - [`EcsError::AlreadyRegistered`] if the entity belongs to an engine
    /// - [`EcsError::DuplicateName`] if another entity uses its name
    pub fn add_entity(&self, entity: &Entity) -> EcsResult<()> {
        EntityRegistry::insert(&self.inner.entities, entity)?;
        entity.component_added().add(self.inner.on_component_added.clone());
        entity.component_removed().add(self.inner.on_component_removed.clone());
        for family in self.families() {
            family.new_entity(entity);
        }
        debug!(entity = %entity.name(), id = %entity.id(), "entity added");
        self.inner.entity_added.dispatch(entity);
        Ok(())
    }

    /// Unregisters an entity. Its components are left untouched.
    ///
    /// # Returns
    ///
    /// `false` if the entity is not registered with this engine.
    pub fn remove_entity(&self, entity: &Entity) -> bool {
        if !self.inner.entities.borrow().contains(entity) {
            return false;
        }
        for family in self.families() {
            family.remove_entity(entity);
        }
        entity.component_added().remove(&self.inner.on_component_added);
        entity.component_removed().remove(&self.inner.on_component_removed);
        self.inner.entities.borrow_mut().remove(entity);
        debug!(entity = %entity.name(), id = %entity.id(), "entity removed");
        self.inner.entity_removed.dispatch(entity);
        true
    }

    /// Unregisters every entity, oldest first.
    pub fn remove_all_entities(&self) {
        loop {
            let first = self.inner.entities.borrow().first();
            let Some(entity) = first else {
                break;
            };
            self.remove_entity(&entity);
        }
    }

    /// Looks up a registered entity by name.
    #[must_use]
    pub fn entity_by_name(&self, name: &str) -> Option<Entity> {
        self.inner.entities.borrow().get_by_name(name)
    }

    /// Snapshot of the registered entities, in registration order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.inner.entities.borrow().snapshot()
    }

    /// Number of registered entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.inner.entities.borrow().len()
    }

    fn component_added(&self, entity: &Entity, component_type: ComponentType) {
        for family in self.families() {
            family.component_added_to_entity(entity, component_type);
        }
    }

    fn component_removed(&self, entity: &Entity, component_type: ComponentType) {
        for family in self.families() {
            family.component_removed_from_entity(entity, component_type);
        }
    }

    fn families(&self) -> Vec<Rc<dyn Family>> {
        self.inner.families.borrow().values().cloned().collect()
    }

    // =========================================================================
    // Node lists
    // =========================================================================

    /// Returns the node list for `shape`, creating its family on first use.
    ///
    /// A new family is seeded with every entity already registered.
    pub fn get_node_list(&self, shape: &NodeShape) -> NodeList {
        if let Some(family) = self.inner.families.borrow().get(shape) {
            return family.node_list();
        }
        let family = (self.inner.family_factory)(shape.clone(), self);
        self.inner
            .families
            .borrow_mut()
            .insert(shape.clone(), Rc::clone(&family));
        debug!(shape = ?shape, "family created");
        for entity in self.entities() {
            family.new_entity(&entity);
        }
        family.node_list()
    }

    /// Returns the node list for node type `N`.
    pub fn node_list<N: NodeType>(&self) -> NodeList {
        self.get_node_list(&N::shape())
    }

    /// Discards the family for `shape`. Its nodes are unlinked and
    /// recycled; the list handle stays valid but no longer updates.
    ///
    /// # Returns
    ///
    /// `false` if no family exists for `shape`.
    ///
    /// # Errors
    ///
    /// [`EcsError::NodeListInUse`] while an iterator over the list is
    /// alive.
    pub fn release_node_list(&self, shape: &NodeShape) -> EcsResult<bool> {
        let traversals = match self.inner.families.borrow().get(shape) {
            Some(family) => family.node_list().traversals(),
            None => return Ok(false),
        };
        if traversals > 0 {
            warn!(shape = ?shape, traversals, "node list released while traversed");
            return Err(EcsError::NodeListInUse { traversals });
        }
        let family = self.inner.families.borrow_mut().shift_remove(shape);
        if let Some(family) = family {
            family.clean_up();
            debug!(shape = ?shape, "family released");
        }
        Ok(true)
    }

    /// Discards the family for node type `N`.
    ///
    /// # Errors
    ///
    /// See [`release_node_list`](Self::release_node_list).
    pub fn release<N: NodeType>(&self) -> EcsResult<bool> {
        self.release_node_list(&N::shape())
    }

    /// Number of live families.
    #[must_use]
    pub fn family_count(&self) -> usize {
        self.inner.families.borrow().len()
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Schedules a system. Lower priorities run first; equal priorities run
    /// in the order they were added.
    ///
    /// [`System::add_to_engine`] is called before the system is scheduled.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemAlreadyAdded`] if this instance is already
    /// scheduled.
    pub fn add_system<S: System>(&self, system: Rc<S>, priority: i32) -> EcsResult<()> {
        if self.inner.systems.borrow().find(system_key(&system)).is_some() {
            return Err(EcsError::SystemAlreadyAdded {
                system: std::any::type_name::<S>(),
            });
        }
        system.add_to_engine(self);
        let entry = SystemEntry::new(system, priority);
        debug!(system = entry.type_name, priority, "system added");
        self.inner.systems.borrow_mut().add(entry);
        Ok(())
    }

    /// Unschedules a system, then calls [`System::remove_from_engine`].
    ///
    /// # Returns
    ///
    /// `false` if the instance is not scheduled.
    pub fn remove_system<S: System + ?Sized>(&self, system: &Rc<S>) -> bool {
        let removed = {
            let mut systems = self.inner.systems.borrow_mut();
            systems
                .find(system_key(system))
                .and_then(|handle| systems.remove(handle))
        };
        let Some(entry) = removed else {
            return false;
        };
        debug!(system = entry.type_name, "system removed");
        entry.system.remove_from_engine(self);
        true
    }

    /// Unschedules every system, in run order.
    pub fn remove_all_systems(&self) {
        loop {
            let first = self.inner.systems.borrow().first();
            let Some(handle) = first else {
                break;
            };
            let removed = self.inner.systems.borrow_mut().remove(handle);
            if let Some(entry) = removed {
                debug!(system = entry.type_name, "system removed");
                entry.system.remove_from_engine(self);
            }
        }
    }

    /// Returns the first scheduled system of type `S`.
    #[must_use]
    pub fn get_system<S: System>(&self) -> Option<Rc<S>> {
        let any = self
            .inner
            .systems
            .borrow()
            .iter()
            .find(|entry| entry.any.is::<S>())
            .map(|entry| Rc::clone(&entry.any))?;
        any.downcast::<S>().ok()
    }

    /// Snapshot of the scheduled systems, in run order.
    #[must_use]
    pub fn systems(&self) -> Vec<Rc<dyn System>> {
        self.inner
            .systems
            .borrow()
            .iter()
            .map(|entry| Rc::clone(&entry.system))
            .collect()
    }

    /// Number of scheduled systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.inner.systems.borrow().len()
    }

    /// Runs every system once, then fires
    /// [`update_complete`](Self::update_complete).
    ///
    /// # Errors
    ///
    /// [`EcsError::UpdateInProgress`] when called from inside an update.
    pub fn update(&self, time: f64) -> EcsResult<()> {
        if self.inner.updating.replace(true) {
            warn!("engine update called while already updating");
            return Err(EcsError::UpdateInProgress);
        }
        self.inner.systems.borrow_mut().pin();
        let guard = UpdateGuard { engine: self };

        let mut cursor = self.inner.systems.borrow().first();
        while let Some(handle) = cursor {
            let system = self
                .inner
                .systems
                .borrow()
                .get(handle)
                .map(|entry| Rc::clone(&entry.system));
            if let Some(system) = system {
                system.update(time);
            }
            cursor = self.inner.systems.borrow().next_linked(handle);
        }

        drop(guard);
        self.inner.update_complete.dispatch(&());
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.entity_count())
            .field("systems", &self.system_count())
            .field("families", &self.family_count())
            .field("updating", &self.is_updating())
            .finish()
    }
}

/// Ends the update even when a system panics.
struct UpdateGuard<'a> {
    engine: &'a Engine,
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.engine.inner.systems.borrow_mut().unpin();
        self.engine.inner.updating.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Component;
    use std::cell::RefCell;

    struct Position(f32);
    impl Component for Position {}

    struct Velocity(f32);
    impl Component for Velocity {}

    struct MotionNode;
    impl NodeType for MotionNode {
        fn shape() -> NodeShape {
            NodeShape::builder()
                .field::<Position>("position")
                .field::<Velocity>("velocity")
                .build()
        }
    }

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Recorder {
        tag: &'static str,
        log: Log,
    }

    impl System for Recorder {
        fn add_to_engine(&self, _engine: &Engine) {
            self.log.borrow_mut().push("added");
        }

        fn remove_from_engine(&self, _engine: &Engine) {
            self.log.borrow_mut().push("removed");
        }

        fn update(&self, _time: f64) {
            self.log.borrow_mut().push(self.tag);
        }
    }

    fn recorder(tag: &'static str, log: &Log) -> Rc<Recorder> {
        Rc::new(Recorder {
            tag,
            log: Rc::clone(log),
        })
    }

    #[test]
    fn test_add_entity_rejects_duplicates() {
        let engine = Engine::new();
        let entity = Entity::named("hero");
        engine.add_entity(&entity).unwrap();

        assert!(matches!(
            engine.add_entity(&entity),
            Err(EcsError::AlreadyRegistered { .. })
        ));
        assert!(matches!(
            engine.add_entity(&Entity::named("hero")),
            Err(EcsError::DuplicateName { .. })
        ));
        assert_eq!(engine.entity_by_name("hero"), Some(entity.clone()));

        assert!(engine.remove_entity(&entity));
        assert!(!engine.remove_entity(&entity));
        assert!(engine.entity_by_name("hero").is_none());
    }

    #[test]
    fn test_node_list_is_shared_per_shape() {
        let engine = Engine::new();
        let a = engine.node_list::<MotionNode>();
        let b = engine.get_node_list(&MotionNode::shape());
        assert_eq!(engine.family_count(), 1);

        let entity = Entity::new();
        entity.add(Position(0.0)).add(Velocity(0.0));
        engine.add_entity(&entity).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_late_family_sees_existing_entities() {
        let engine = Engine::new();
        for i in 0..3 {
            let entity = Entity::new();
            entity.add(Position(0.0));
            if i != 1 {
                entity.add(Velocity(0.0));
            }
            engine.add_entity(&entity).unwrap();
        }
        assert_eq!(engine.node_list::<MotionNode>().len(), 2);
    }

    #[test]
    fn test_removed_entity_stops_notifying() {
        let engine = Engine::new();
        let nodes = engine.node_list::<MotionNode>();
        let entity = Entity::new();
        entity.add(Position(0.0));
        engine.add_entity(&entity).unwrap();
        engine.remove_entity(&entity);

        entity.add(Velocity(1.0));
        assert!(nodes.is_empty());
        assert!(entity.component_added().is_empty());
    }

    #[test]
    fn test_release_node_list() {
        let engine = Engine::new();
        let nodes = engine.node_list::<MotionNode>();
        let entity = Entity::new();
        entity.add(Position(0.0)).add(Velocity(0.0));
        engine.add_entity(&entity).unwrap();

        {
            let _walk = nodes.iter();
            assert_eq!(
                engine.release::<MotionNode>(),
                Err(EcsError::NodeListInUse { traversals: 1 })
            );
        }
        assert_eq!(engine.release::<MotionNode>(), Ok(true));
        assert_eq!(engine.release::<MotionNode>(), Ok(false));
        assert!(nodes.is_empty());
        assert_eq!(engine.family_count(), 0);

        // a fresh family is built on demand
        assert_eq!(engine.node_list::<MotionNode>().len(), 1);
    }

    #[test]
    fn test_systems_run_by_priority() {
        let engine = Engine::new();
        let log = Log::default();
        engine.add_system(recorder("late", &log), 10).unwrap();
        engine.add_system(recorder("early", &log), -1).unwrap();
        engine.add_system(recorder("middle", &log), 10).unwrap();
        log.borrow_mut().clear();

        engine.update(0.016).unwrap();
        assert_eq!(*log.borrow(), vec!["early", "late", "middle"]);
    }

    #[test]
    fn test_system_lifecycle() {
        let engine = Engine::new();
        let log = Log::default();
        let system = recorder("run", &log);

        engine.add_system(Rc::clone(&system), 0).unwrap();
        assert!(matches!(
            engine.add_system(Rc::clone(&system), 3),
            Err(EcsError::SystemAlreadyAdded { .. })
        ));
        assert!(Rc::ptr_eq(&engine.get_system::<Recorder>().unwrap(), &system));

        assert!(engine.remove_system(&system));
        assert!(!engine.remove_system(&system));
        assert!(engine.get_system::<Recorder>().is_none());
        assert_eq!(*log.borrow(), vec!["added", "removed"]);
    }

    #[test]
    fn test_remove_all_systems() {
        let engine = Engine::new();
        let log = Log::default();
        engine.add_system(recorder("a", &log), 0).unwrap();
        engine.add_system(recorder("b", &log), 1).unwrap();
        engine.remove_all_systems();
        assert_eq!(engine.system_count(), 0);
        assert_eq!(*log.borrow(), vec!["added", "added", "removed", "removed"]);
    }

    #[test]
    fn test_update_complete_fires_after_update() {
        let engine = Engine::new();
        let seen = Rc::new(Cell::new(None));
        let sink = Rc::clone(&seen);
        let weak = engine.downgrade();
        engine.update_complete().add(move |_: &()| {
            sink.set(weak.upgrade().map(|engine| engine.is_updating()));
        });

        engine.update(1.0).unwrap();
        assert_eq!(seen.get(), Some(false));
    }

    #[test]
    fn test_remove_all_entities() {
        let engine = Engine::new();
        let removed = Rc::new(Cell::new(0));
        let sink = Rc::clone(&removed);
        engine.entity_removed().add(move |_: &Entity| sink.set(sink.get() + 1));
        for _ in 0..4 {
            engine.add_entity(&Entity::new()).unwrap();
        }
        engine.remove_all_entities();
        assert_eq!(engine.entity_count(), 0);
        assert_eq!(removed.get(), 4);
    }
}
