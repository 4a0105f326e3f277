//! # Entity Management
//!
//! An entity is a named bag of components. Handles are cheap to clone and
//! all clones refer to the same entity.
//!
//! Every mutation is announced through the entity's own signals, which is
//! how the engine keeps family node lists in step without polling.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::ecs::component::{
    downcast, erase, same_component, Component, ComponentRef, ComponentType, ErasedComponent,
};
use crate::ecs::registry::EntityRegistry;
use crate::error::EcsResult;
use crate::memory::PoolHandle;
use crate::signal::Signal;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an entity.
///
/// Ids are never reused, so they are safe as map keys for the lifetime of
/// the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload of the component added/removed signals.
pub type ComponentEvent = (Entity, ComponentType);

/// Payload of the name changed signal: the entity and its previous name.
pub type NameEvent = (Entity, String);

pub(crate) struct Membership {
    pub(crate) registry: Weak<RefCell<EntityRegistry>>,
    pub(crate) handle: PoolHandle,
}

struct EntityInner {
    id: EntityId,
    name: RefCell<String>,
    components: RefCell<IndexMap<ComponentType, ErasedComponent>>,
    membership: RefCell<Option<Membership>>,
    component_added: Signal<ComponentEvent>,
    component_removed: Signal<ComponentEvent>,
    name_changed: Signal<NameEvent>,
}

/// Shared handle to an entity.
///
/// # Example
///
/// ```rust
/// use ashlar_core::{Component, Entity};
///
/// struct Health(u32);
/// impl Component for Health {}
///
/// let entity = Entity::named("player");
/// entity.add(Health(10));
/// entity.get::<Health>().unwrap().borrow_mut().0 -= 3;
/// assert_eq!(entity.get::<Health>().unwrap().borrow().0, 7);
/// ```
#[derive(Clone)]
pub struct Entity {
    inner: Rc<EntityInner>,
}

impl Entity {
    /// Creates an entity with a generated name of the form `_entity{N}`.
    #[must_use]
    pub fn new() -> Self {
        let id = EntityId::next();
        Self::build(id, format!("_entity{}", id.0))
    }

    /// Creates an entity with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::build(EntityId::next(), name.into())
    }

    fn build(id: EntityId, name: String) -> Self {
        Self {
            inner: Rc::new(EntityInner {
                id,
                name: RefCell::new(name),
                components: RefCell::new(IndexMap::new()),
                membership: RefCell::new(None),
                component_added: Signal::new(),
                component_removed: Signal::new(),
                name_changed: Signal::new(),
            }),
        }
    }

    /// Returns the entity id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// Returns a copy of the current name.
    #[must_use]
    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    /// Renames the entity.
    ///
    /// Setting the current name again does nothing. While the entity is
    /// registered, the new name is checked against every other entity in
    /// the registry first.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateName`](crate::EcsError::DuplicateName) if
    /// another registered entity already uses `name`. The entity keeps its
    /// old name.
    pub fn set_name(&self, name: impl Into<String>) -> EcsResult<()> {
        let name = name.into();
        if *self.inner.name.borrow() == name {
            return Ok(());
        }
        if let Some(registry) = self.registry() {
            registry.borrow_mut().rename(self, &name)?;
        }
        let previous = self.inner.name.replace(name);
        self.inner.name_changed.dispatch(&(self.clone(), previous));
        Ok(())
    }

    /// Adds a component under its own type.
    ///
    /// A component already stored under that type is replaced. Replacement
    /// only announces the addition; no removal is signalled.
    pub fn add<T: Component>(&self, component: T) -> &Self {
        self.add_erased(ComponentType::of::<T>(), erase(component))
    }

    /// Adds a component under an explicit key, e.g. a trait object type
    /// shared by several concrete components.
    pub fn add_as<T: Component>(&self, component: T, key: ComponentType) -> &Self {
        self.add_erased(key, erase(component))
    }

    /// Adds an already shared component cell under its own type.
    pub fn add_shared<T: Component>(&self, component: ComponentRef<T>) -> &Self {
        self.add_erased(ComponentType::of::<T>(), component)
    }

    /// Adds a type-erased component. The cell must hold a `RefCell<T>`.
    pub fn add_erased(&self, key: ComponentType, component: ErasedComponent) -> &Self {
        let replaced = self.inner.components.borrow_mut().insert(key, component);
        drop(replaced);
        self.inner.component_added.dispatch(&(self.clone(), key));
        self
    }

    /// Removes the component stored under `T`'s type.
    ///
    /// Removal is announced first, while the component is still readable.
    ///
    /// # Returns
    ///
    /// The removed component, or `None` if none was stored (or it was not a
    /// `T`).
    pub fn remove<T: Component>(&self) -> Option<ComponentRef<T>> {
        self.remove_type(ComponentType::of::<T>())
            .and_then(|component| downcast(&component))
    }

    /// Removes the component stored under `key`.
    ///
    /// If a removal listener stores a replacement under `key`, the
    /// replacement stays and component-added is fired again once every
    /// removal listener has run.
    pub fn remove_type(&self, key: ComponentType) -> Option<ErasedComponent> {
        let component = self.inner.components.borrow().get(&key).cloned()?;
        self.inner.component_removed.dispatch(&(self.clone(), key));

        // a listener may have replaced the component in the meantime
        let replaced = {
            let mut components = self.inner.components.borrow_mut();
            let unchanged = components
                .get(&key)
                .map(|current| same_component(current, &component));
            if unchanged == Some(true) {
                components.shift_remove(&key);
            }
            unchanged == Some(false)
        };
        if replaced {
            // listeners that ran after the replacement saw a removal; restate it
            self.inner.component_added.dispatch(&(self.clone(), key));
        }
        Some(component)
    }

    /// Returns the component stored under `T`'s type.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<ComponentRef<T>> {
        self.get_as::<T>(ComponentType::of::<T>())
    }

    /// Returns the component stored under `key`, if it is a `T`.
    #[must_use]
    pub fn get_as<T: 'static>(&self, key: ComponentType) -> Option<ComponentRef<T>> {
        self.get_type(key).and_then(|component| downcast(&component))
    }

    /// Returns the type-erased component stored under `key`.
    #[must_use]
    pub fn get_type(&self, key: ComponentType) -> Option<ErasedComponent> {
        self.inner.components.borrow().get(&key).cloned()
    }

    /// Returns `true` if a component is stored under `T`'s type.
    #[must_use]
    pub fn has<T: Component>(&self) -> bool {
        self.has_type(ComponentType::of::<T>())
    }

    /// Returns `true` if a component is stored under `key`.
    #[must_use]
    pub fn has_type(&self, key: ComponentType) -> bool {
        self.inner.components.borrow().contains_key(&key)
    }

    /// Snapshot of every component, in insertion order.
    #[must_use]
    pub fn get_all(&self) -> Vec<(ComponentType, ErasedComponent)> {
        self.inner
            .components
            .borrow()
            .iter()
            .map(|(key, component)| (*key, Rc::clone(component)))
            .collect()
    }

    /// Returns the number of stored components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.inner.components.borrow().len()
    }

    /// Fired after a component is added or replaced.
    #[must_use]
    pub fn component_added(&self) -> &Signal<ComponentEvent> {
        &self.inner.component_added
    }

    /// Fired before a component is removed.
    #[must_use]
    pub fn component_removed(&self) -> &Signal<ComponentEvent> {
        &self.inner.component_removed
    }

    /// Fired after a rename, with the previous name.
    #[must_use]
    pub fn name_changed(&self) -> &Signal<NameEvent> {
        &self.inner.name_changed
    }

    /// Returns `true` while the entity belongs to a registry.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registry().is_some()
    }

    pub(crate) fn registry(&self) -> Option<Rc<RefCell<EntityRegistry>>> {
        self.inner
            .membership
            .borrow()
            .as_ref()
            .and_then(|membership| membership.registry.upgrade())
    }

    pub(crate) fn registry_handle(&self) -> Option<PoolHandle> {
        self.inner
            .membership
            .borrow()
            .as_ref()
            .map(|membership| membership.handle)
    }

    pub(crate) fn set_membership(&self, membership: Option<Membership>) {
        *self.inner.membership.borrow_mut() = membership;
    }

    #[inline]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.inner.id)
            .field("name", &*self.inner.name.borrow())
            .field("components", &self.component_count())
            .finish()
    }
}
