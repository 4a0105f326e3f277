//! # Node Lists
//!
//! Intrusive doubly linked list of nodes with add/remove signals, in-place
//! sorting and traversal that survives mutation.
//!
//! ## Mutation during traversal
//!
//! [`NodeList::remove`] leaves the removed node's own `previous`/`next`
//! links in place. An iterator parked on that node follows its stale `next`
//! and skips anything that is no longer linked, so it still reaches every
//! node that remains. Nodes added during a traversal are appended at the
//! tail and are reached by the same traversal, including when the node the
//! iterator was parked on was the tail and left first. Every append stamps
//! the node with a list-wide sequence number that grows along the list;
//! an iterator that runs off a stale chain picks up the nodes stamped after
//! the one it was parked on.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crate::ecs::node::{Node, NodeState};
use crate::signal::Signal;

/// Zero is reserved for "no list".
static NEXT_LIST_ID: AtomicUsize = AtomicUsize::new(1);

struct NodeListInner {
    id: usize,
    sequence: Cell<u64>,
    head: RefCell<Option<Node>>,
    tail: RefCell<Option<Node>>,
    len: Cell<usize>,
    traversals: Cell<usize>,
    node_added: Signal<Node>,
    node_removed: Signal<Node>,
}

impl Drop for NodeListInner {
    fn drop(&mut self) {
        // unlink iteratively so long lists do not recurse on drop
        let mut cursor = self.head.get_mut().take();
        while let Some(node) = cursor {
            cursor = node.take_next();
            if node.owner() == self.id {
                node.set_state(NodeState::Unlinked);
                node.set_owner(0);
            }
        }
    }
}

/// Shared handle to a node list.
#[derive(Clone)]
pub struct NodeList {
    inner: Rc<NodeListInner>,
}

impl NodeList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(NodeListInner {
                id: NEXT_LIST_ID.fetch_add(1, AtomicOrdering::Relaxed),
                sequence: Cell::new(0),
                head: RefCell::new(None),
                tail: RefCell::new(None),
                len: Cell::new(0),
                traversals: Cell::new(0),
                node_added: Signal::new(),
                node_removed: Signal::new(),
            }),
        }
    }

    fn id(&self) -> usize {
        self.inner.id
    }

    fn stamp(&self, node: &Node) {
        let sequence = self.inner.sequence.get() + 1;
        self.inner.sequence.set(sequence);
        node.set_sequence(sequence);
    }

    /// Re-stamps every node in list order after a reordering.
    fn restamp(&self) {
        let mut cursor = self.head();
        while let Some(node) = cursor {
            self.stamp(&node);
            cursor = node.next();
        }
    }

    /// First node.
    #[must_use]
    pub fn head(&self) -> Option<Node> {
        self.inner.head.borrow().clone()
    }

    /// Last node.
    #[must_use]
    pub fn tail(&self) -> Option<Node> {
        self.inner.tail.borrow().clone()
    }

    /// Number of linked nodes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len.get()
    }

    /// Returns `true` if the list holds no node.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.len.get() == 0
    }

    /// Returns `true` if `node` is linked into this list.
    #[must_use]
    pub fn contains(&self, node: &Node) -> bool {
        node.is_linked() && node.owner() == self.id()
    }

    /// Fired after a node is appended.
    #[must_use]
    pub fn node_added(&self) -> &Signal<Node> {
        &self.inner.node_added
    }

    /// Fired after a node is unlinked.
    #[must_use]
    pub fn node_removed(&self) -> &Signal<Node> {
        &self.inner.node_removed
    }

    /// Number of iterators currently walking the list.
    #[inline]
    #[must_use]
    pub fn traversals(&self) -> usize {
        self.inner.traversals.get()
    }

    /// Returns `true` while an iterator is walking the list.
    #[inline]
    #[must_use]
    pub fn is_traversing(&self) -> bool {
        self.inner.traversals.get() > 0
    }

    /// Appends `node` at the tail.
    ///
    /// # Returns
    ///
    /// `false` if the node is already linked into a list.
    pub fn add(&self, node: &Node) -> bool {
        if node.is_linked() {
            return false;
        }
        let tail = self.inner.tail.replace(Some(node.clone()));
        node.set_previous(tail.as_ref());
        node.set_next(None);
        match &tail {
            Some(tail) => tail.set_next(Some(node)),
            None => *self.inner.head.borrow_mut() = Some(node.clone()),
        }
        node.set_state(NodeState::Linked);
        node.set_owner(self.id());
        self.stamp(node);
        self.inner.len.set(self.inner.len.get() + 1);

        self.inner.node_added.dispatch(node);
        true
    }

    /// Unlinks `node`.
    ///
    /// The node's own links are left as they were, so a traversal parked on
    /// it can continue.
    ///
    /// # Returns
    ///
    /// `false` if the node is not linked into this list.
    pub fn remove(&self, node: &Node) -> bool {
        if !self.contains(node) {
            return false;
        }
        let previous = node.previous();
        let next = node.next();
        if self.inner.head.borrow().as_ref() == Some(node) {
            *self.inner.head.borrow_mut() = next.clone();
        }
        if self.inner.tail.borrow().as_ref() == Some(node) {
            *self.inner.tail.borrow_mut() = previous.clone();
        }
        if let Some(previous) = &previous {
            previous.set_next(next.as_ref());
        }
        if let Some(next) = &next {
            next.set_previous(previous.as_ref());
        }
        node.set_state(NodeState::Unlinked);
        node.set_owner(0);
        self.inner.len.set(self.inner.len.get() - 1);

        self.inner.node_removed.dispatch(node);
        true
    }

    /// Unlinks every node, clearing their links, and announces each removal
    /// in list order.
    pub fn remove_all(&self) {
        let mut cursor = self.inner.head.borrow_mut().take();
        *self.inner.tail.borrow_mut() = None;
        self.inner.len.set(0);
        while let Some(node) = cursor {
            cursor = node.take_next();
            node.set_previous(None);
            node.set_state(NodeState::Unlinked);
            node.set_owner(0);
            self.inner.node_removed.dispatch(&node);
        }
    }

    /// Exchanges the positions of two nodes of this list.
    ///
    /// # Returns
    ///
    /// `false` if either node is not linked into this list.
    pub fn swap(&self, a: &Node, b: &Node) -> bool {
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        if a == b {
            return true;
        }
        let (a_previous, a_next) = (a.previous(), a.next());
        let (b_previous, b_next) = (b.previous(), b.next());

        if a_previous.as_ref() == Some(b) {
            a.set_previous(b_previous.as_ref());
            b.set_previous(Some(a));
            b.set_next(a_next.as_ref());
            a.set_next(Some(b));
        } else if b_previous.as_ref() == Some(a) {
            b.set_previous(a_previous.as_ref());
            a.set_previous(Some(b));
            a.set_next(b_next.as_ref());
            b.set_next(Some(a));
        } else {
            a.set_previous(b_previous.as_ref());
            b.set_previous(a_previous.as_ref());
            a.set_next(b_next.as_ref());
            b.set_next(a_next.as_ref());
        }

        {
            let mut head = self.inner.head.borrow_mut();
            if head.as_ref() == Some(a) {
                *head = Some(b.clone());
            } else if head.as_ref() == Some(b) {
                *head = Some(a.clone());
            }
        }
        {
            let mut tail = self.inner.tail.borrow_mut();
            if tail.as_ref() == Some(a) {
                *tail = Some(b.clone());
            } else if tail.as_ref() == Some(b) {
                *tail = Some(a.clone());
            }
        }

        for node in [a, b] {
            if let Some(previous) = node.previous() {
                previous.set_next(Some(node));
            }
            if let Some(next) = node.next() {
                next.set_previous(Some(node));
            }
        }
        let sequence = a.sequence();
        a.set_sequence(b.sequence());
        b.set_sequence(sequence);
        true
    }

    /// Stable in-place insertion sort. Best for lists that are almost
    /// sorted.
    pub fn insertion_sort<F>(&self, mut compare: F)
    where
        F: FnMut(&Node, &Node) -> Ordering,
    {
        if self.len() < 2 {
            return;
        }
        let mut remains = self.head().and_then(|head| head.next());
        while let Some(node) = remains {
            remains = node.next();

            let mut other = node.previous();
            while let Some(candidate) = &other {
                if compare(&node, candidate) == Ordering::Less {
                    other = candidate.previous();
                } else {
                    break;
                }
            }
            if other == node.previous() {
                continue;
            }

            // unlink
            let previous = node.previous();
            let next = node.next();
            if self.inner.tail.borrow().as_ref() == Some(&node) {
                *self.inner.tail.borrow_mut() = previous.clone();
            }
            if let Some(previous) = &previous {
                previous.set_next(next.as_ref());
            }
            if let Some(next) = &next {
                next.set_previous(previous.as_ref());
            }

            // relink after `other`, or at the head
            match other {
                Some(other) => {
                    let after = other.next();
                    node.set_previous(Some(&other));
                    node.set_next(after.as_ref());
                    if let Some(after) = &after {
                        after.set_previous(Some(&node));
                    }
                    other.set_next(Some(&node));
                }
                None => {
                    let head = self.inner.head.replace(Some(node.clone()));
                    node.set_previous(None);
                    node.set_next(head.as_ref());
                    if let Some(head) = &head {
                        head.set_previous(Some(&node));
                    }
                }
            }
        }
        self.restamp();
    }

    /// Stable in-place merge sort. Best for lists with no useful existing
    /// order.
    pub fn merge_sort<F>(&self, mut compare: F)
    where
        F: FnMut(&Node, &Node) -> Ordering,
    {
        if self.len() < 2 {
            return;
        }

        // split into ascending runs
        let mut runs = Vec::new();
        let mut start = self.inner.head.borrow_mut().take();
        while let Some(first) = start {
            let mut last = first.clone();
            while let Some(next) = last.next() {
                if compare(&last, &next) == Ordering::Greater {
                    break;
                }
                last = next;
            }
            start = last.take_next();
            first.set_previous(None);
            runs.push(first);
        }

        while runs.len() > 1 {
            let mut merged = Vec::with_capacity((runs.len() + 1) / 2);
            let mut pairs = runs.into_iter();
            while let Some(left) = pairs.next() {
                match pairs.next() {
                    Some(right) => merged.push(merge(left, right, &mut compare)),
                    None => merged.push(left),
                }
            }
            runs = merged;
        }

        let head = runs.pop();
        let mut tail = head.clone();
        while let Some(next) = tail.as_ref().and_then(Node::next) {
            tail = Some(next);
        }
        *self.inner.head.borrow_mut() = head;
        *self.inner.tail.borrow_mut() = tail;
        self.restamp();
    }

    /// Iterates over the linked nodes.
    ///
    /// The list may be mutated while the iterator is alive, see the module
    /// documentation.
    #[must_use]
    pub fn iter(&self) -> NodeIter {
        self.inner.traversals.set(self.inner.traversals.get() + 1);
        NodeIter {
            list: self.clone(),
            current: None,
            started: false,
        }
    }

    /// Snapshot of the linked nodes, in order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Node> {
        self.iter().collect()
    }
}

/// Merges two sorted runs; ties keep `left` first.
fn merge<F>(left: Node, right: Node, compare: &mut F) -> Node
where
    F: FnMut(&Node, &Node) -> Ordering,
{
    let fallback = left.clone();
    let mut a = Some(left);
    let mut b = Some(right);
    let mut head: Option<Node> = None;
    let mut tail: Option<Node> = None;

    loop {
        let picked = match (a.take(), b.take()) {
            (Some(x), Some(y)) => {
                if compare(&x, &y) == Ordering::Greater {
                    b = y.next();
                    a = Some(x);
                    y
                } else {
                    a = x.next();
                    b = Some(y);
                    x
                }
            }
            (Some(rest), None) | (None, Some(rest)) => {
                append(&mut head, &mut tail, rest);
                break;
            }
            (None, None) => break,
        };
        append(&mut head, &mut tail, picked);
    }
    head.unwrap_or(fallback)
}

fn append(head: &mut Option<Node>, tail: &mut Option<Node>, node: Node) {
    node.set_previous(tail.as_ref());
    match tail {
        Some(tail) => tail.set_next(Some(&node)),
        None => *head = Some(node.clone()),
    }
    *tail = Some(node);
}

impl Default for NodeList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeList")
            .field("len", &self.len())
            .field("traversals", &self.traversals())
            .finish()
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = Node;
    type IntoIter = NodeIter;

    fn into_iter(self) -> NodeIter {
        self.iter()
    }
}

/// Iterator over a [`NodeList`]. Counts as a traversal until dropped.
pub struct NodeIter {
    list: NodeList,
    current: Option<Node>,
    started: bool,
}

impl Iterator for NodeIter {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let candidate = if self.started {
            self.current.as_ref().and_then(|parked| self.resume_after(parked))
        } else {
            self.started = true;
            self.list.head()
        };
        self.current.clone_from(&candidate);
        candidate
    }
}

impl NodeIter {
    fn resume_after(&self, parked: &Node) -> Option<Node> {
        let mut candidate = parked.next();
        while let Some(node) = &candidate {
            if self.list.contains(node) {
                return candidate;
            }
            candidate = node.next();
        }
        if self.list.contains(parked) {
            return None;
        }

        // the stale chain ran out; pick up nodes appended since it was cut
        let mut appended = None;
        let mut cursor = self.list.tail();
        while let Some(node) = cursor {
            if node.sequence() <= parked.sequence() {
                break;
            }
            cursor = node.previous();
            appended = Some(node);
        }
        appended
    }
}

impl Drop for NodeIter {
    fn drop(&mut self) {
        let traversals = &self.list.inner.traversals;
        traversals.set(traversals.get().saturating_sub(1));
    }
}
