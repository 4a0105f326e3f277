//! # Signals
//!
//! Typed, synchronous event channels with an ordered listener list.
//!
//! ## Reentrancy
//!
//! A listener may add or remove listeners (itself included) and may dispatch
//! the same signal again while it runs:
//!
//! - Listeners added during a dispatch are parked and join the list after
//!   the outermost dispatch ends. They do not hear the event in flight.
//! - A listener removed during a dispatch is skipped from that point on.
//!   Its slot stays in the pool's cache tier until the dispatch ends, so
//!   the cursor parked on it can still advance.
//! - A once-listener is removed before it is invoked, so a nested dispatch
//!   can never deliver to it twice.
//!
//! No borrow of the listener list is held while a listener runs.

mod listener;

pub use listener::Listener;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::memory::{LinkedPool, PoolHandle};

/// Signal without payload.
pub type Signal0 = Signal<()>;
/// Signal with one payload value.
pub type Signal1<A> = Signal<A>;
/// Signal with two payload values.
pub type Signal2<A, B> = Signal<(A, B)>;
/// Signal with three payload values.
pub type Signal3<A, B, C> = Signal<(A, B, C)>;

struct Registration<A> {
    listener: Listener<A>,
    once: bool,
}

struct SignalState<A> {
    /// Registered listeners in dispatch order.
    slots: LinkedPool<Registration<A>>,
    /// Listener key to slot.
    index: HashMap<usize, PoolHandle>,
    /// Listeners added during a dispatch.
    pending: Vec<Registration<A>>,
}

/// An event channel delivering `&A` to every listener in registration order.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use ashlar_core::Signal1;
///
/// let signal: Signal1<u32> = Signal1::new();
/// let total = Rc::new(Cell::new(0));
/// let sink = Rc::clone(&total);
/// signal.add(move |value: &u32| sink.set(sink.get() + value));
///
/// signal.dispatch(&3);
/// signal.dispatch(&4);
/// assert_eq!(total.get(), 7);
/// ```
pub struct Signal<A> {
    state: RefCell<SignalState<A>>,
}

impl<A> Signal<A> {
    /// Creates a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a signal with listener slots pre-built.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RefCell::new(SignalState {
                slots: LinkedPool::with_capacity(capacity),
                index: HashMap::with_capacity(capacity),
                pending: Vec::new(),
            }),
        }
    }

    /// Registers a listener. Adding a listener that is already registered is
    /// a no-op.
    ///
    /// # Returns
    ///
    /// The listener handle, for later removal.
    pub fn add(&self, listener: impl Into<Listener<A>>) -> Listener<A> {
        self.register(listener.into(), false)
    }

    /// Registers a listener that is removed right before its first
    /// invocation.
    pub fn add_once(&self, listener: impl Into<Listener<A>>) -> Listener<A> {
        self.register(listener.into(), true)
    }

    /// Unregisters a listener.
    ///
    /// # Returns
    ///
    /// `true` if the listener was registered (or parked for registration).
    pub fn remove(&self, listener: &Listener<A>) -> bool {
        let mut state = self.state.borrow_mut();
        let key = listener.key();
        if let Some(handle) = state.index.remove(&key) {
            state.slots.remove(handle);
            return true;
        }
        let before = state.pending.len();
        state.pending.retain(|registration| registration.listener.key() != key);
        before != state.pending.len()
    }

    /// Unregisters every listener.
    pub fn remove_all(&self) {
        let mut state = self.state.borrow_mut();
        state.index.clear();
        state.pending.clear();
        state.slots.clear();
    }

    /// Returns `true` if the listener is registered or parked.
    #[must_use]
    pub fn has(&self, listener: &Listener<A>) -> bool {
        let state = self.state.borrow();
        let key = listener.key();
        state.index.contains_key(&key)
            || state
                .pending
                .iter()
                .any(|registration| registration.listener.key() == key)
    }

    /// Returns the number of registered listeners, parked ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.borrow();
        state.slots.len() + state.pending.len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` while a dispatch is running.
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.state.borrow().slots.is_pinned()
    }

    /// Delivers `args` to every registered listener in order.
    pub fn dispatch(&self, args: &A) {
        let mut cursor = {
            let mut state = self.state.borrow_mut();
            if state.slots.is_empty() {
                return;
            }
            state.slots.pin();
            state.slots.first()
        };
        let _guard = DispatchGuard { signal: self };

        while let Some(handle) = cursor {
            let registration = self
                .state
                .borrow()
                .slots
                .get(handle)
                .map(|registration| (registration.listener.clone(), registration.once));

            if let Some((listener, once)) = registration {
                if once {
                    self.remove(&listener);
                }
                listener.call(args);
            }
            cursor = self.state.borrow().slots.next_linked(handle);
        }
    }

    fn register(&self, listener: Listener<A>, once: bool) -> Listener<A> {
        let mut state = self.state.borrow_mut();
        let key = listener.key();
        let known = state.index.contains_key(&key)
            || state
                .pending
                .iter()
                .any(|registration| registration.listener.key() == key);
        if known {
            return listener;
        }

        let registration = Registration {
            listener: listener.clone(),
            once,
        };
        if state.slots.is_pinned() {
            state.pending.push(registration);
        } else {
            let handle = state.slots.push_back(registration);
            state.index.insert(key, handle);
        }
        listener
    }

    fn end_dispatch(&self) {
        let mut state = self.state.borrow_mut();
        state.slots.unpin();
        if state.slots.is_pinned() {
            return;
        }
        let SignalState {
            slots,
            index,
            pending,
        } = &mut *state;
        for registration in pending.drain(..) {
            let key = registration.listener.key();
            let handle = slots.push_back(registration);
            index.insert(key, handle);
        }
    }
}

impl<A> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.len())
            .field("dispatching", &self.is_dispatching())
            .finish()
    }
}

/// Ends the dispatch even when a listener panics.
struct DispatchGuard<'a, A> {
    signal: &'a Signal<A>,
}

impl<A> Drop for DispatchGuard<'_, A> {
    fn drop(&mut self) {
        self.signal.end_dispatch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn recorder(log: &Log, tag: &'static str) -> Listener<u32> {
        let log = Rc::clone(log);
        Listener::new(move |_: &u32| log.borrow_mut().push(tag))
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let signal = Signal1::<u32>::new();
        let log = Log::default();
        signal.add(recorder(&log, "a"));
        signal.add(recorder(&log, "b"));
        signal.add(recorder(&log, "c"));

        signal.dispatch(&0);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let signal = Signal1::<u32>::new();
        let log = Log::default();
        let listener = recorder(&log, "a");
        signal.add(listener.clone());
        signal.add(listener.clone());
        assert_eq!(signal.len(), 1);

        signal.dispatch(&0);
        assert_eq!(log.borrow().len(), 1);
        assert!(signal.remove(&listener));
        assert!(!signal.remove(&listener));
        assert!(signal.is_empty());
    }

    #[test]
    fn test_add_once() {
        let signal = Signal0::new();
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        signal.add_once(move |_: &()| sink.set(sink.get() + 1));

        signal.dispatch(&());
        signal.dispatch(&());
        assert_eq!(count.get(), 1);
        assert!(signal.is_empty());
    }

    #[test]
    fn test_listener_added_during_dispatch_waits() {
        let signal = Rc::new(Signal1::<u32>::new());
        let log = Log::default();
        let late = recorder(&log, "late");

        let weak = Rc::downgrade(&signal);
        let adder_log = Rc::clone(&log);
        signal.add(move |_: &u32| {
            adder_log.borrow_mut().push("adder");
            if let Some(signal) = weak.upgrade() {
                signal.add(late.clone());
            }
        });

        signal.dispatch(&0);
        assert_eq!(*log.borrow(), vec!["adder"]);
        assert_eq!(signal.len(), 2);

        signal.dispatch(&0);
        assert_eq!(*log.borrow(), vec!["adder", "adder", "late"]);
    }

    #[test]
    fn test_self_removal_during_dispatch() {
        let signal = Rc::new(Signal1::<u32>::new());
        let log = Log::default();
        let slot: Rc<RefCell<Option<Listener<u32>>>> = Rc::default();

        signal.add(recorder(&log, "first"));
        let weak = Rc::downgrade(&signal);
        let own = Rc::clone(&slot);
        let remover_log = Rc::clone(&log);
        let remover = signal.add(move |_: &u32| {
            remover_log.borrow_mut().push("remover");
            if let (Some(signal), Some(me)) = (weak.upgrade(), own.borrow().as_ref()) {
                signal.remove(me);
            }
        });
        *slot.borrow_mut() = Some(remover);
        signal.add(recorder(&log, "last"));

        signal.dispatch(&0);
        signal.dispatch(&0);
        assert_eq!(
            *log.borrow(),
            vec!["first", "remover", "last", "first", "last"]
        );
    }

    #[test]
    fn test_removing_later_listener_skips_it() {
        let signal = Rc::new(Signal1::<u32>::new());
        let log = Log::default();
        let victim = recorder(&log, "victim");

        let weak = Rc::downgrade(&signal);
        let target = victim.clone();
        signal.add(move |_: &u32| {
            if let Some(signal) = weak.upgrade() {
                signal.remove(&target);
            }
        });
        signal.add(victim);
        signal.add(recorder(&log, "survivor"));

        signal.dispatch(&0);
        assert_eq!(*log.borrow(), vec!["survivor"]);
    }

    #[test]
    fn test_nested_dispatch_delivers_once_listener_once() {
        let signal = Rc::new(Signal1::<u32>::new());
        let count = Rc::new(Cell::new(0));

        let sink = Rc::clone(&count);
        signal.add_once(move |_: &u32| sink.set(sink.get() + 1));

        let weak = Rc::downgrade(&signal);
        signal.add(move |depth: &u32| {
            if *depth == 0 {
                if let Some(signal) = weak.upgrade() {
                    signal.dispatch(&1);
                }
            }
        });

        signal.dispatch(&0);
        signal.dispatch(&0);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_nested_dispatch_reaches_every_listener() {
        let signal = Rc::new(Signal1::<u32>::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&signal);
        let outer_log = Rc::clone(&log);
        signal.add(move |depth: &u32| {
            outer_log.borrow_mut().push(("a", *depth));
            if *depth == 0 {
                if let Some(signal) = weak.upgrade() {
                    signal.dispatch(&1);
                }
            }
        });
        let inner_log = Rc::clone(&log);
        signal.add(move |depth: &u32| inner_log.borrow_mut().push(("b", *depth)));

        signal.dispatch(&0);
        assert_eq!(*log.borrow(), vec![("a", 0), ("a", 1), ("b", 1), ("b", 0)]);
        assert!(!signal.is_dispatching());
    }

    #[test]
    fn test_remove_all_during_dispatch() {
        let signal = Rc::new(Signal1::<u32>::new());
        let log = Log::default();

        let weak = Rc::downgrade(&signal);
        signal.add(move |_: &u32| {
            if let Some(signal) = weak.upgrade() {
                signal.remove_all();
            }
        });
        signal.add(recorder(&log, "never"));

        signal.dispatch(&0);
        assert!(log.borrow().is_empty());
        assert!(signal.is_empty());
    }
}
