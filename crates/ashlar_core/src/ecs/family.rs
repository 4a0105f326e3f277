//! # Families
//!
//! A family owns the node list for one node shape and keeps it equal to the
//! set of registered entities that satisfy the shape, updating it from
//! entity and component events instead of rescanning.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::ecs::component::ComponentType;
use crate::ecs::engine::{Engine, WeakEngine};
use crate::ecs::entity::{Entity, EntityId};
use crate::ecs::node::{Node, NodeShape};
use crate::ecs::node_list::NodeList;
use crate::memory::NodePool;
use crate::signal::Listener;

/// Maintains the node list for one node shape.
///
/// The engine creates one family per distinct shape through its
/// [`FamilyFactory`] and forwards every entity and component event to it.
pub trait Family {
    /// The maintained node list.
    fn node_list(&self) -> NodeList;

    /// The shape this family matches.
    fn shape(&self) -> &NodeShape;

    /// An entity was registered with the engine.
    fn new_entity(&self, entity: &Entity);

    /// An entity is being unregistered.
    fn remove_entity(&self, entity: &Entity);

    /// A component was added to, or replaced on, a registered entity.
    fn component_added_to_entity(&self, entity: &Entity, component_type: ComponentType);

    /// A component is about to be removed from a registered entity.
    fn component_removed_from_entity(&self, entity: &Entity, component_type: ComponentType);

    /// The family is being discarded; release every node.
    fn clean_up(&self);
}

/// Builds the family for a shape. Called at most once per shape while the
/// family is held by the engine.
pub type FamilyFactory = Rc<dyn Fn(NodeShape, &Engine) -> Rc<dyn Family>>;

/// The default factory: one [`ComponentMatchingFamily`] per shape.
#[must_use]
pub fn component_matching_factory() -> FamilyFactory {
    Rc::new(|shape: NodeShape, engine: &Engine| {
        ComponentMatchingFamily::new(shape, engine) as Rc<dyn Family>
    })
}

/// Family that matches entities by the presence of every field's component.
pub struct ComponentMatchingFamily {
    shape: NodeShape,
    nodes: NodeList,
    entities: RefCell<HashMap<EntityId, Node>>,
    pool: RefCell<NodePool>,
    engine: WeakEngine,
    release_cache: Listener<()>,
}

impl ComponentMatchingFamily {
    /// Creates a family for `shape` and hooks it to `engine`'s
    /// update-complete signal.
    #[must_use]
    pub fn new(shape: NodeShape, engine: &Engine) -> Rc<Self> {
        let prealloc = engine.config().node_pool_prealloc;
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let release_cache = engine.update_complete().add(move |_: &()| {
                if let Some(family) = weak.upgrade() {
                    family.release_node_pool_cache();
                }
            });
            Self {
                pool: RefCell::new(NodePool::new(&shape, prealloc)),
                shape,
                nodes: NodeList::new(),
                entities: RefCell::new(HashMap::new()),
                engine: engine.downgrade(),
                release_cache,
            }
        })
    }

    fn add_if_match(&self, entity: &Entity) {
        if self.entities.borrow().contains_key(&entity.id()) || !self.shape.is_satisfied_by(entity) {
            return;
        }
        let node = self.acquire_node();
        if !node.bind(entity) {
            self.release_node(node);
            return;
        }
        self.entities.borrow_mut().insert(entity.id(), node.clone());
        trace!(entity = %entity.name(), shape = ?self.shape, "entity joined family");
        self.nodes.add(&node);
    }

    fn remove_if_match(&self, entity: &Entity) {
        let Some(node) = self.entities.borrow_mut().remove(&entity.id()) else {
            return;
        };
        trace!(entity = %entity.name(), shape = ?self.shape, "entity left family");
        self.nodes.remove(&node);
        self.release_node(node);
    }

    /// Nodes must not be recycled while a traversal could be parked on them.
    fn holds_nodes(&self) -> bool {
        self.nodes.is_traversing()
            || self
                .engine
                .upgrade()
                .is_some_and(|engine| engine.is_updating())
    }

    fn acquire_node(&self) -> Node {
        let fold = !self.holds_nodes();
        let mut pool = self.pool.borrow_mut();
        if fold {
            pool.release_cache();
        }
        pool.get()
    }

    fn release_node(&self, node: Node) {
        let hold = self.holds_nodes();
        let mut pool = self.pool.borrow_mut();
        if hold {
            pool.cache(node);
        } else {
            pool.dispose(node);
        }
    }

    fn release_node_pool_cache(&self) {
        if !self.nodes.is_traversing() {
            self.pool.borrow_mut().release_cache();
        }
    }
}

impl Family for ComponentMatchingFamily {
    fn node_list(&self) -> NodeList {
        self.nodes.clone()
    }

    fn shape(&self) -> &NodeShape {
        &self.shape
    }

    fn new_entity(&self, entity: &Entity) {
        self.add_if_match(entity);
    }

    fn remove_entity(&self, entity: &Entity) {
        self.remove_if_match(entity);
    }

    fn component_added_to_entity(&self, entity: &Entity, component_type: ComponentType) {
        if !self.shape.contains(component_type) {
            return;
        }
        let matched = self.entities.borrow().get(&entity.id()).cloned();
        match matched {
            Some(node) => {
                if let Some(component) = entity.get_type(component_type) {
                    node.rebind(component_type, component);
                }
            }
            None => self.add_if_match(entity),
        }
    }

    fn component_removed_from_entity(&self, entity: &Entity, component_type: ComponentType) {
        if self.shape.contains(component_type) {
            self.remove_if_match(entity);
        }
    }

    fn clean_up(&self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.update_complete().remove(&self.release_cache);
        }
        loop {
            let Some(node) = self.nodes.head() else {
                break;
            };
            if let Some(entity) = node.entity() {
                self.entities.borrow_mut().remove(&entity.id());
            }
            self.nodes.remove(&node);
            node.clear_links();
            self.pool.borrow_mut().cache(node);
        }
        self.entities.borrow_mut().clear();
        self.pool.borrow_mut().release_cache();
        debug!(shape = ?self.shape, "family cleaned up");
    }
}
