//! Entity states: a component key to provider mapping.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ecs::{Component, ComponentType};
use crate::fsm::provider::{
    ComponentProvider, DynamicProvider, InstanceProvider, SingletonProvider, TypeProvider,
};

/// The components an entity carries while in one state.
///
/// # Example
///
/// ```rust
/// use ashlar_core::{Component, EntityState};
///
/// #[derive(Default)]
/// struct Patrol { waypoint: usize }
/// impl Component for Patrol {}
///
/// #[derive(Default)]
/// struct Speed(f32);
/// impl Component for Speed {}
///
/// let mut state = EntityState::new();
/// state
///     .add::<Patrol>().with_type::<Patrol>()
///     .add::<Speed>().with_instance(Speed(1.5));
/// assert_eq!(state.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct EntityState {
    providers: IndexMap<ComponentType, Rc<dyn ComponentProvider>>,
}

impl EntityState {
    /// Creates a state without components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts mapping the key of type `T`. The mapping takes effect once a
    /// provider is chosen.
    pub fn add<T: Component>(&mut self) -> StateComponentMapping<'_> {
        self.add_key(ComponentType::of::<T>())
    }

    /// Starts mapping an explicit key.
    pub fn add_key(&mut self, key: ComponentType) -> StateComponentMapping<'_> {
        StateComponentMapping { state: self, key }
    }

    /// Maps `T` to fresh default values.
    pub fn add_default<T: Component + Default>(&mut self) -> &mut Self {
        self.add::<T>().with_type::<T>()
    }

    /// Returns the provider mapped to `key`.
    #[must_use]
    pub fn get(&self, key: ComponentType) -> Option<Rc<dyn ComponentProvider>> {
        self.providers.get(&key).cloned()
    }

    /// Returns `true` if `key` is mapped.
    #[must_use]
    pub fn has(&self, key: ComponentType) -> bool {
        self.providers.contains_key(&key)
    }

    /// Iterates over the mappings in the order they were made.
    pub fn providers(&self) -> impl Iterator<Item = (ComponentType, &Rc<dyn ComponentProvider>)> {
        self.providers.iter().map(|(key, provider)| (*key, provider))
    }

    /// Number of mapped keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if no key is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|(key, provider)| (key, provider.identifier())))
            .finish()
    }
}

/// Pending mapping for one key; pick a provider to complete it.
#[must_use = "a mapping without a provider is not added to the state"]
pub struct StateComponentMapping<'a> {
    state: &'a mut EntityState,
    key: ComponentType,
}

impl<'a> StateComponentMapping<'a> {
    /// Always adds this instance.
    pub fn with_instance<U: Component>(self, instance: U) -> &'a mut EntityState {
        self.with_provider(Rc::new(InstanceProvider::new(instance)))
    }

    /// Adds a fresh `U::default()` on every entry.
    pub fn with_type<U: Component + Default>(self) -> &'a mut EntityState {
        self.with_provider(Rc::new(TypeProvider::<U>::new()))
    }

    /// Adds one lazily built `U::default()`, shared across entries.
    pub fn with_singleton<U: Component + Default>(self) -> &'a mut EntityState {
        self.with_provider(Rc::new(SingletonProvider::<U>::new()))
    }

    /// Adds whatever `method` returns on every entry.
    pub fn with_method<U, F>(self, method: F) -> &'a mut EntityState
    where
        U: Component,
        F: Fn() -> U + 'static,
    {
        self.with_provider(Rc::new(DynamicProvider::new(method)))
    }

    /// Uses a custom provider.
    pub fn with_provider(self, provider: Rc<dyn ComponentProvider>) -> &'a mut EntityState {
        self.state.providers.insert(self.key, provider);
        self.state
    }
}
