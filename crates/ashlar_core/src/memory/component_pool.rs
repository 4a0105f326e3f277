//! # Component Pool
//!
//! Caller-owned recycling of component values, keyed by type. The engine
//! never touches it; systems that spawn and despawn entities at a high rate
//! use it to avoid rebuilding components.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Free lists of component values, one per type.
///
/// # Example
///
/// ```rust
/// use ashlar_core::ComponentPool;
///
/// #[derive(Default)]
/// struct Bullet {
///     damage: u32,
/// }
///
/// let mut pool = ComponentPool::new();
/// let mut bullet: Bullet = pool.get();
/// bullet.damage = 3;
/// pool.dispose(bullet);
/// assert_eq!(pool.count::<Bullet>(), 1);
/// ```
#[derive(Default)]
pub struct ComponentPool {
    pools: HashMap<TypeId, Box<dyn Any>>,
}

impl ComponentPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a pooled `T`, or builds a fresh one when none is available.
    ///
    /// Pooled values are returned exactly as they were disposed.
    pub fn get<T: Default + 'static>(&mut self) -> T {
        self.pools
            .get_mut(&TypeId::of::<T>())
            .and_then(|pool| pool.downcast_mut::<Vec<T>>())
            .and_then(Vec::pop)
            .unwrap_or_default()
    }

    /// Returns a value to the pool for later reuse.
    ///
    /// The caller must not keep other references into the value.
    pub fn dispose<T: 'static>(&mut self, component: T) {
        let pool = self
            .pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Vec::<T>::new()));
        if let Some(pool) = pool.downcast_mut::<Vec<T>>() {
            pool.push(component);
        }
    }

    /// Returns how many values of type `T` are waiting.
    #[must_use]
    pub fn count<T: 'static>(&self) -> usize {
        self.pools
            .get(&TypeId::of::<T>())
            .and_then(|pool| pool.downcast_ref::<Vec<T>>())
            .map_or(0, Vec::len)
    }

    /// Drops every pooled value.
    pub fn clear(&mut self) {
        self.pools.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Health(u32);

    #[derive(Default)]
    struct Armor(u32);

    #[test]
    fn test_get_reuses_disposed_value() {
        let mut pool = ComponentPool::new();
        assert_eq!(pool.get::<Health>(), Health(0));

        pool.dispose(Health(7));
        pool.dispose(Armor(2));
        assert_eq!(pool.count::<Health>(), 1);
        assert_eq!(pool.count::<Armor>(), 1);

        assert_eq!(pool.get::<Health>(), Health(7));
        assert_eq!(pool.count::<Health>(), 0);
        assert_eq!(pool.get::<Health>(), Health(0));
    }

    #[test]
    fn test_clear() {
        let mut pool = ComponentPool::new();
        pool.dispose(Health(1));
        pool.dispose(Health(2));
        pool.clear();
        assert_eq!(pool.count::<Health>(), 0);
    }
}
