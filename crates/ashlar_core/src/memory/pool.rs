//! # Linked Pool
//!
//! Slot arena that keeps its live values in an intrusive doubly linked order
//! and recycles vacated slots through a free list.
//!
//! ## Slot lifecycle
//!
//! ```text
//!            push / insert                remove (not pinned)
//!   Free ────────────────────▶ Linked ─────────────────────────▶ Free
//!                                │
//!                                │ remove (pinned)
//!                                ▼
//!                              Cached ──── unpin to zero ───────▶ Free
//! ```
//!
//! While the pool is pinned (a traversal is in flight) removed slots keep
//! their `prev`/`next` links and their generation, so a cursor parked on a
//! removed slot can find its way back into the linked order. Slots only return
//! to the free list, and only have their links cleared, once the last pin is
//! released.

/// Lifecycle state of a pool slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Holds a value and is part of the linked order.
    Linked,
    /// Unlinked during a traversal; waiting for the traversal to finish.
    Cached,
    /// Available for reuse.
    Free,
}

/// Handle to a slot in a [`LinkedPool`].
///
/// The generation makes handles to recycled slots detectably stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: usize,
    generation: u32,
}

impl PoolHandle {
    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    /// Returns the slot generation this handle was issued for.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
    state: SlotState,
    generation: u32,
}

impl<T> Slot<T> {
    const fn vacant() -> Self {
        Self {
            value: None,
            prev: None,
            next: None,
            state: SlotState::Free,
            generation: 0,
        }
    }
}

/// An ordered pool of values with O(1) insert and unlink.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Callers wrap it in a `RefCell` and never
/// hold the borrow while running foreign code.
pub struct LinkedPool<T> {
    /// The slot storage.
    slots: Vec<Slot<T>>,
    /// First linked slot.
    head: Option<usize>,
    /// Last linked slot.
    tail: Option<usize>,
    /// Indices of free slots.
    free_list: Vec<usize>,
    /// Indices of slots unlinked while pinned.
    cache: Vec<usize>,
    /// Number of linked slots.
    len: usize,
    /// Number of traversals in flight.
    pins: usize,
}

impl<T> LinkedPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            head: None,
            tail: None,
            free_list: Vec::new(),
            cache: Vec::new(),
            len: 0,
            pins: 0,
        }
    }

    /// Creates a pool with `capacity` slots pre-built on the free list.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let slots: Vec<Slot<T>> = (0..capacity).map(|_| Slot::vacant()).collect();
        let free_list: Vec<usize> = (0..capacity).rev().collect();

        Self {
            slots,
            free_list,
            ..Self::new()
        }
    }

    /// Returns the number of linked values.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no value is linked.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the total number of slots ever built.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of slots ready for reuse.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns the number of slots waiting in the cache tier.
    #[inline]
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` while at least one traversal holds the pool.
    #[inline]
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    /// Marks the start of a traversal.
    #[inline]
    pub fn pin(&mut self) {
        self.pins += 1;
    }

    /// Marks the end of a traversal. The cache tier is folded back into the
    /// free list when the last traversal ends.
    pub fn unpin(&mut self) {
        self.pins = self.pins.saturating_sub(1);
        if self.pins == 0 {
            self.release_cache();
        }
    }

    /// Appends a value after the current tail.
    pub fn push_back(&mut self, value: T) -> PoolHandle {
        let index = self.allocate(value);
        self.slots[index].prev = self.tail;
        match self.tail {
            Some(tail) => self.slots[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.handle(index)
    }

    /// Prepends a value before the current head.
    pub fn push_front(&mut self, value: T) -> PoolHandle {
        let index = self.allocate(value);
        self.slots[index].next = self.head;
        match self.head {
            Some(head) => self.slots[head].prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
        self.handle(index)
    }

    /// Inserts a value directly after `anchor`.
    ///
    /// # Returns
    ///
    /// The new handle, or `None` (and the value is dropped) if `anchor` is
    /// not linked.
    pub fn insert_after(&mut self, anchor: PoolHandle, value: T) -> Option<PoolHandle> {
        if !self.contains(anchor) {
            return None;
        }
        let anchor = anchor.index;
        let index = self.allocate(value);
        let after = self.slots[anchor].next;
        self.slots[index].prev = Some(anchor);
        self.slots[index].next = after;
        self.slots[anchor].next = Some(index);
        match after {
            Some(after) => self.slots[after].prev = Some(index),
            None => self.tail = Some(index),
        }
        Some(self.handle(index))
    }

    /// Unlinks the value behind `handle` and returns it.
    ///
    /// The slot's own links are left untouched so an in-flight cursor parked
    /// on it can still advance. While pinned, the slot waits in the cache
    /// tier; otherwise it is recycled immediately.
    pub fn remove(&mut self, handle: PoolHandle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        let index = handle.index;
        let (prev, next) = (self.slots[index].prev, self.slots[index].next);
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;

        let value = self.slots[index].value.take();
        if self.is_pinned() {
            self.slots[index].state = SlotState::Cached;
            self.cache.push(index);
        } else {
            self.free_slot(index);
        }
        value
    }

    /// Unlinks and drops every value.
    ///
    /// Unpinned, all links are cleared. Pinned, the slots move to the cache
    /// tier with their links intact.
    pub fn clear(&mut self) {
        let mut cursor = self.head.take();
        self.tail = None;
        self.len = 0;
        let pinned = self.is_pinned();
        while let Some(index) = cursor {
            cursor = self.slots[index].next;
            self.slots[index].value = None;
            if pinned {
                self.slots[index].state = SlotState::Cached;
                self.cache.push(index);
            } else {
                self.free_slot(index);
            }
        }
    }

    /// Returns `true` if `handle` refers to a linked value.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.slots.get(handle.index).is_some_and(|slot| {
            slot.generation == handle.generation && slot.state == SlotState::Linked
        })
    }

    /// Returns the state of the slot behind `handle`, if the handle is not
    /// stale.
    #[must_use]
    pub fn state(&self, handle: PoolHandle) -> Option<SlotState> {
        let slot = self.slots.get(handle.index)?;
        (slot.generation == handle.generation).then_some(slot.state)
    }

    /// Gets a reference to a linked value.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        if !self.contains(handle) {
            return None;
        }
        self.slots[handle.index].value.as_ref()
    }

    /// Gets a mutable reference to a linked value.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        if !self.contains(handle) {
            return None;
        }
        self.slots[handle.index].value.as_mut()
    }

    /// Returns the first linked slot.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<PoolHandle> {
        self.head.map(|index| self.handle(index))
    }

    /// Returns the last linked slot.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<PoolHandle> {
        self.tail.map(|index| self.handle(index))
    }

    /// Returns the next linked slot after `handle`.
    ///
    /// Works when `handle` itself was unlinked during the current pin: the
    /// cursor backs up through the slots that left until it finds one still
    /// linked, and resumes right after it. Values inserted after that point
    /// since the removal are reached.
    #[must_use]
    pub fn next_linked(&self, handle: PoolHandle) -> Option<PoolHandle> {
        let slot = self.slots.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        match slot.state {
            SlotState::Linked => slot.next.map(|index| self.handle(index)),
            SlotState::Cached => {
                let mut anchor = slot.prev;
                while let Some(index) = anchor {
                    let slot = &self.slots[index];
                    if slot.state == SlotState::Linked {
                        return slot.next.map(|next| self.handle(next));
                    }
                    anchor = slot.prev;
                }
                self.first()
            }
            SlotState::Free => None,
        }
    }

    /// Returns the previous linked slot before `handle`.
    #[must_use]
    pub fn prev_linked(&self, handle: PoolHandle) -> Option<PoolHandle> {
        let slot = self.slots.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let mut cursor = slot.prev;
        while let Some(index) = cursor {
            let slot = &self.slots[index];
            if slot.state == SlotState::Linked {
                return Some(self.handle(index));
            }
            cursor = slot.prev;
        }
        None
    }

    /// Iterates over linked values in order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let index = cursor?;
            let slot = &self.slots[index];
            cursor = slot.next;
            slot.value
                .as_ref()
                .map(|value| (self.handle(index), value))
        })
    }

    /// Moves every cached slot back to the free list, clearing its links.
    fn release_cache(&mut self) {
        let mut cached = std::mem::take(&mut self.cache);
        for index in cached.drain(..) {
            self.free_slot(index);
        }
        self.cache = cached;
    }

    fn allocate(&mut self, value: T) -> usize {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::vacant());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        slot.prev = None;
        slot.next = None;
        slot.state = SlotState::Linked;
        self.len += 1;
        index
    }

    fn free_slot(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.value = None;
        slot.prev = None;
        slot.next = None;
        slot.state = SlotState::Free;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index);
    }

    #[inline]
    fn handle(&self, index: usize) -> PoolHandle {
        PoolHandle {
            index,
            generation: self.slots[index].generation,
        }
    }
}

impl<T> Default for LinkedPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
