//! # Systems
//!
//! Systems hold the game logic. The engine runs them once per
//! [`Engine::update`](crate::Engine::update), ordered by priority.

use std::any::Any;
use std::rc::Rc;

use crate::ecs::engine::Engine;
use crate::memory::{LinkedPool, PoolHandle};

/// Logic run by the engine every update.
///
/// Methods take `&self`; systems keep mutable state in cells.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use ashlar_core::{Engine, System};
///
/// #[derive(Default)]
/// struct Clock {
///     elapsed: Cell<f64>,
/// }
///
/// impl System for Clock {
///     fn update(&self, time: f64) {
///         self.elapsed.set(self.elapsed.get() + time);
///     }
/// }
///
/// let engine = Engine::new();
/// let clock = Rc::new(Clock::default());
/// engine.add_system(Rc::clone(&clock), 0).unwrap();
/// engine.update(0.5).unwrap();
/// assert_eq!(clock.elapsed.get(), 0.5);
/// ```
pub trait System: 'static {
    /// Called when the system is added, before it is scheduled.
    fn add_to_engine(&self, engine: &Engine) {
        let _ = engine;
    }

    /// Called after the system is unscheduled.
    fn remove_from_engine(&self, engine: &Engine) {
        let _ = engine;
    }

    /// Runs one step. `time` is the elapsed time since the last update.
    fn update(&self, time: f64);
}

/// Identity of a system instance: the address of its allocation.
#[inline]
pub(crate) fn system_key<S: ?Sized>(system: &Rc<S>) -> usize {
    Rc::as_ptr(system).cast::<()>() as usize
}

#[derive(Clone)]
pub(crate) struct SystemEntry {
    pub(crate) system: Rc<dyn System>,
    /// Same allocation as `system`, for typed lookup.
    pub(crate) any: Rc<dyn Any>,
    pub(crate) priority: i32,
    pub(crate) type_name: &'static str,
}

impl SystemEntry {
    pub(crate) fn new<S: System>(system: Rc<S>, priority: i32) -> Self {
        Self {
            system: Rc::clone(&system) as Rc<dyn System>,
            any: system as Rc<dyn Any>,
            priority,
            type_name: std::any::type_name::<S>(),
        }
    }

    fn key(&self) -> usize {
        system_key(&self.system)
    }
}

/// Systems in run order: ascending priority, ties in insertion order.
pub(crate) struct SystemList {
    entries: LinkedPool<SystemEntry>,
}

impl SystemList {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: LinkedPool::with_capacity(capacity),
        }
    }

    /// Inserts after the last entry whose priority is not greater.
    pub(crate) fn add(&mut self, entry: SystemEntry) -> PoolHandle {
        let mut cursor = self.entries.last();
        while let Some(handle) = cursor {
            if self
                .entries
                .get(handle)
                .is_some_and(|existing| existing.priority <= entry.priority)
            {
                break;
            }
            cursor = self.entries.prev_linked(handle);
        }
        match cursor.and_then(|anchor| self.entries.insert_after(anchor, entry.clone())) {
            Some(handle) => handle,
            None => self.entries.push_front(entry),
        }
    }

    pub(crate) fn find(&self, key: usize) -> Option<PoolHandle> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.key() == key)
            .map(|(handle, _)| handle)
    }

    pub(crate) fn remove(&mut self, handle: PoolHandle) -> Option<SystemEntry> {
        self.entries.remove(handle)
    }

    pub(crate) fn get(&self, handle: PoolHandle) -> Option<&SystemEntry> {
        self.entries.get(handle)
    }

    pub(crate) fn first(&self) -> Option<PoolHandle> {
        self.entries.first()
    }

    pub(crate) fn next_linked(&self, handle: PoolHandle) -> Option<PoolHandle> {
        self.entries.next_linked(handle)
    }

    pub(crate) fn pin(&mut self) {
        self.entries.pin();
    }

    pub(crate) fn unpin(&mut self) {
        self.entries.unpin();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &SystemEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
