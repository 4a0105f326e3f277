//! # List-Iterating Systems
//!
//! The common system shape: fetch one node list when added to the engine and
//! run a closure over every node on each update.

use std::cell::RefCell;

use crate::ecs::engine::Engine;
use crate::ecs::node::{Node, NodeShape, NodeType};
use crate::ecs::node_list::NodeList;
use crate::ecs::system::System;
use crate::signal::Listener;

type NodeUpdate = Box<dyn Fn(&Node, f64)>;

/// A system that runs a closure over every node of one shape.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use ashlar_core::{Component, Engine, Entity, ListIteratingSystem, NodeShape};
///
/// struct Position(f32);
/// impl Component for Position {}
/// struct Velocity(f32);
/// impl Component for Velocity {}
///
/// let shape = NodeShape::builder()
///     .field::<Position>("position")
///     .field::<Velocity>("velocity")
///     .build();
/// let movement = ListIteratingSystem::new(shape, |node, time| {
///     if let (Some(p), Some(v)) = (node.get::<Position>(), node.get::<Velocity>()) {
///         p.borrow_mut().0 += v.borrow().0 * time as f32;
///     }
/// });
///
/// let engine = Engine::new();
/// engine.add_system(Rc::new(movement), 1).unwrap();
///
/// let entity = Entity::new();
/// entity.add(Position(0.0)).add(Velocity(2.0));
/// engine.add_entity(&entity).unwrap();
/// engine.update(0.5).unwrap();
/// assert_eq!(entity.get::<Position>().unwrap().borrow().0, 1.0);
/// ```
pub struct ListIteratingSystem {
    shape: NodeShape,
    nodes: RefCell<Option<NodeList>>,
    node_update: NodeUpdate,
    node_added: Option<Listener<Node>>,
    node_removed: Option<Listener<Node>>,
}

impl ListIteratingSystem {
    /// Creates a system that calls `node_update` for every node of `shape`.
    pub fn new<F>(shape: NodeShape, node_update: F) -> Self
    where
        F: Fn(&Node, f64) + 'static,
    {
        Self {
            shape,
            nodes: RefCell::new(None),
            node_update: Box::new(node_update),
            node_added: None,
            node_removed: None,
        }
    }

    /// Creates a system over node type `N`.
    pub fn for_type<N, F>(node_update: F) -> Self
    where
        N: NodeType,
        F: Fn(&Node, f64) + 'static,
    {
        Self::new(N::shape(), node_update)
    }

    /// Calls `hook` for every node already in the list when the system is
    /// added, and for every node that joins later.
    #[must_use]
    pub fn on_node_added<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Node) + 'static,
    {
        self.node_added = Some(Listener::new(hook));
        self
    }

    /// Calls `hook` for every node that leaves the list.
    #[must_use]
    pub fn on_node_removed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Node) + 'static,
    {
        self.node_removed = Some(Listener::new(hook));
        self
    }

    /// The list being iterated, while the system is in an engine.
    #[must_use]
    pub fn node_list(&self) -> Option<NodeList> {
        self.nodes.borrow().clone()
    }
}

impl System for ListIteratingSystem {
    fn add_to_engine(&self, engine: &Engine) {
        let nodes = engine.get_node_list(&self.shape);
        if let Some(hook) = &self.node_added {
            for node in &nodes {
                hook.call(&node);
            }
            nodes.node_added().add(hook.clone());
        }
        if let Some(hook) = &self.node_removed {
            nodes.node_removed().add(hook.clone());
        }
        *self.nodes.borrow_mut() = Some(nodes);
    }

    fn remove_from_engine(&self, _engine: &Engine) {
        let Some(nodes) = self.nodes.borrow_mut().take() else {
            return;
        };
        if let Some(hook) = &self.node_added {
            nodes.node_added().remove(hook);
        }
        if let Some(hook) = &self.node_removed {
            nodes.node_removed().remove(hook);
        }
    }

    fn update(&self, time: f64) {
        let nodes = self.nodes.borrow().clone();
        if let Some(nodes) = nodes {
            for node in &nodes {
                (self.node_update)(&node, time);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Component;
    use crate::ecs::entity::Entity;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Health(i32);
    impl Component for Health {}

    struct Alive;
    impl NodeType for Alive {
        fn shape() -> NodeShape {
            NodeShape::builder().field::<Health>("health").build()
        }
    }

    #[test]
    fn test_hooks_follow_list() {
        let engine = Engine::new();
        let early = Entity::new();
        early.add(Health(3));
        engine.add_entity(&early).unwrap();

        let added = Rc::new(Cell::new(0));
        let removed = Rc::new(Cell::new(0));
        let (a, r) = (Rc::clone(&added), Rc::clone(&removed));
        let system = Rc::new(
            ListIteratingSystem::for_type::<Alive, _>(|_, _| {})
                .on_node_added(move |_| a.set(a.get() + 1))
                .on_node_removed(move |_| r.set(r.get() + 1)),
        );
        engine.add_system(Rc::clone(&system), 0).unwrap();
        assert_eq!(added.get(), 1);

        let late = Entity::new();
        late.add(Health(1));
        engine.add_entity(&late).unwrap();
        assert_eq!(added.get(), 2);

        late.remove::<Health>();
        assert_eq!(removed.get(), 1);

        engine.remove_system(&system);
        assert!(system.node_list().is_none());
        early.remove::<Health>();
        assert_eq!(removed.get(), 1);
    }

    #[test]
    fn test_update_may_remove_entities() {
        let engine = Engine::new();
        let weak = engine.downgrade();
        let reaper = ListIteratingSystem::for_type::<Alive, _>(move |node, _| {
            let dead = node.get::<Health>().is_some_and(|health| health.borrow().0 <= 0);
            if let (true, Some(engine), Some(entity)) = (dead, weak.upgrade(), node.entity()) {
                engine.remove_entity(&entity);
            }
        });
        engine.add_system(Rc::new(reaper), 0).unwrap();

        for health in [1, 0, 0, 2, 0] {
            let entity = Entity::new();
            entity.add(Health(health));
            engine.add_entity(&entity).unwrap();
        }
        engine.update(0.0).unwrap();

        assert_eq!(engine.entity_count(), 2);
        assert_eq!(engine.node_list::<Alive>().len(), 2);
    }
}
