//! # Component System
//!
//! Components are pure data containers with no behavior. The registry never
//! looks inside them; it only keys them by a [`ComponentType`] token.
//!
//! Every stored component lives in a shared cell (`Rc<RefCell<T>>`) so that
//! the nodes of every family an entity matches can alias the exact instance
//! the entity owns.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Marker trait for ECS components.
///
/// # Example
///
/// ```rust
/// use ashlar_core::Component;
///
/// #[derive(Debug, Default)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: 'static {}

/// Shared handle to a stored component.
pub type ComponentRef<T> = Rc<RefCell<T>>;

/// Type-erased component handle. The concrete value is a `RefCell<T>`.
pub type ErasedComponent = Rc<dyn Any>;

/// Stable, hashable identity of a component key.
///
/// Keys are exact: a component stored under `ComponentType::of::<A>()` is
/// never returned for a lookup of any other key.
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
}

impl ComponentType {
    /// Returns the key for type `T`.
    ///
    /// `T` may be unsized, so trait objects (`dyn Shape`) can act as a
    /// shared key for several concrete component types.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the underlying type id.
    #[inline]
    #[must_use]
    pub const fn type_id(self) -> TypeId {
        self.id
    }

    /// Returns the type name, for diagnostics and codecs.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl Hash for ComponentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.name)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Wraps a component into its shared, type-erased cell.
#[inline]
#[must_use]
pub fn erase<T: 'static>(component: T) -> ErasedComponent {
    Rc::new(RefCell::new(component))
}

/// Recovers the typed handle from an erased component.
///
/// Returns `None` if the cell does not hold a `T`.
#[inline]
#[must_use]
pub fn downcast<T: 'static>(component: &ErasedComponent) -> Option<ComponentRef<T>> {
    Rc::clone(component).downcast::<RefCell<T>>().ok()
}

/// Returns `true` if both handles point at the same component cell.
#[inline]
#[must_use]
pub fn same_component(a: &ErasedComponent, b: &ErasedComponent) -> bool {
    Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}
