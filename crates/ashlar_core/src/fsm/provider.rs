//! Component providers: where a state's components come from.

use std::any::TypeId;
use std::cell::OnceCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::ecs::{erase, ComponentRef, ErasedComponent};

/// Identity of what a provider hands out.
///
/// Two providers with the same identifier are interchangeable: switching
/// between states that map a key to such providers leaves the entity's
/// component in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// A specific shared component instance.
    Instance(usize),
    /// Fresh default values of a type.
    Type(TypeId),
    /// Values produced by a specific closure.
    Method(usize),
}

/// Supplies the component a state adds to its entity.
pub trait ComponentProvider {
    /// The component to add.
    fn component(&self) -> ErasedComponent;

    /// See [`ProviderId`].
    fn identifier(&self) -> ProviderId;
}

fn address(component: &ErasedComponent) -> usize {
    Rc::as_ptr(component).cast::<()>() as usize
}

/// Always provides the same instance.
pub struct InstanceProvider {
    instance: ErasedComponent,
}

impl InstanceProvider {
    /// Wraps a component value.
    pub fn new<T: 'static>(instance: T) -> Self {
        Self {
            instance: erase(instance),
        }
    }

    /// Shares an existing component cell.
    pub fn shared<T: 'static>(instance: ComponentRef<T>) -> Self {
        Self { instance }
    }
}

impl ComponentProvider for InstanceProvider {
    fn component(&self) -> ErasedComponent {
        Rc::clone(&self.instance)
    }

    fn identifier(&self) -> ProviderId {
        ProviderId::Instance(address(&self.instance))
    }
}

/// Provides a new `T::default()` every time.
pub struct TypeProvider<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> TypeProvider<T> {
    /// Creates the provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<T> Default for TypeProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + 'static> ComponentProvider for TypeProvider<T> {
    fn component(&self) -> ErasedComponent {
        erase(T::default())
    }

    fn identifier(&self) -> ProviderId {
        ProviderId::Type(TypeId::of::<T>())
    }
}

/// Provides one `T::default()`, built on first request and shared after.
pub struct SingletonProvider<T> {
    instance: OnceCell<ErasedComponent>,
    marker: PhantomData<fn() -> T>,
}

impl<T> SingletonProvider<T> {
    /// Creates the provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instance: OnceCell::new(),
            marker: PhantomData,
        }
    }
}

impl<T> Default for SingletonProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + 'static> ComponentProvider for SingletonProvider<T> {
    fn component(&self) -> ErasedComponent {
        Rc::clone(self.instance.get_or_init(|| erase(T::default())))
    }

    fn identifier(&self) -> ProviderId {
        ProviderId::Instance(address(&self.component()))
    }
}

/// Provides whatever a closure returns.
pub struct DynamicProvider {
    method: Rc<dyn Fn() -> ErasedComponent>,
}

impl DynamicProvider {
    /// Wraps a closure building `T` values.
    pub fn new<T, F>(method: F) -> Self
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        Self {
            method: Rc::new(move || erase(method())),
        }
    }
}

impl ComponentProvider for DynamicProvider {
    fn component(&self) -> ErasedComponent {
        (self.method)()
    }

    fn identifier(&self) -> ProviderId {
        ProviderId::Method(Rc::as_ptr(&self.method).cast::<()>() as usize)
    }
}
