//! # Node Pool
//!
//! Per-family recycling of nodes with a cache tier for nodes released while
//! a traversal may still be parked on them.

use tracing::trace;

use crate::ecs::{Node, NodeShape, NodeState};

/// Free list and cache of nodes sharing one shape.
///
/// # Lifecycle
///
/// - [`get`](Self::get) hands out an idle node
/// - [`dispose`](Self::dispose) resets a node and makes it reusable at once
/// - [`cache`](Self::cache) parks a node with links and payload intact
/// - [`release_cache`](Self::release_cache) resets and frees every parked
///   node; only call it once no traversal can reach them
pub struct NodePool {
    shape: NodeShape,
    free: Vec<Node>,
    cache: Vec<Node>,
}

impl NodePool {
    /// Creates a pool with `prealloc` idle nodes ready.
    #[must_use]
    pub fn new(shape: &NodeShape, prealloc: usize) -> Self {
        let free = (0..prealloc).map(|_| Node::new(shape)).collect();
        Self {
            shape: shape.clone(),
            free,
            cache: Vec::new(),
        }
    }

    /// Returns an idle node, reusing one when possible.
    pub fn get(&mut self) -> Node {
        self.free.pop().unwrap_or_else(|| {
            trace!(shape = ?self.shape, "node pool empty, building node");
            Node::new(&self.shape)
        })
    }

    /// Resets `node` and makes it available again.
    pub fn dispose(&mut self, node: Node) {
        node.reset();
        self.free.push(node);
    }

    /// Parks `node` until [`release_cache`](Self::release_cache).
    pub fn cache(&mut self, node: Node) {
        node.set_state(NodeState::Cached);
        self.cache.push(node);
    }

    /// Resets every parked node and moves it to the free list.
    pub fn release_cache(&mut self) {
        for node in self.cache.drain(..) {
            node.reset();
            self.free.push(node);
        }
    }

    /// Number of idle nodes.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of parked nodes.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Component, Entity, NodeList};

    struct Tag;
    impl Component for Tag {}

    #[test]
    fn test_get_dispose_reuses_nodes() {
        let shape = NodeShape::builder().field::<Tag>("tag").build();
        let mut pool = NodePool::new(&shape, 2);
        assert_eq!(pool.free_count(), 2);

        let node = pool.get();
        let entity = Entity::new();
        entity.add(Tag);
        node.bind(&entity);
        pool.dispose(node.clone());

        assert_eq!(pool.free_count(), 2);
        assert!(node.entity().is_none());
        assert_eq!(pool.get(), node);
    }

    #[test]
    fn test_cache_keeps_links_until_release() {
        let shape = NodeShape::builder().field::<Tag>("tag").build();
        let mut pool = NodePool::new(&shape, 0);
        let list = NodeList::new();
        let (first, second) = (pool.get(), pool.get());
        list.add(&first);
        list.add(&second);

        list.remove(&first);
        pool.cache(first.clone());
        assert_eq!(first.state(), NodeState::Cached);
        assert_eq!(first.next(), Some(second.clone()));
        assert_eq!(pool.free_count(), 0);

        pool.release_cache();
        assert_eq!(pool.cached_count(), 0);
        assert_eq!(pool.free_count(), 1);
        assert!(first.next().is_none());
        assert_eq!(first.state(), NodeState::Idle);
    }
}
