//! # Nodes
//!
//! A node is a typed view over one entity: a fixed set of named fields, each
//! aliasing the entity's component for one component type. The set of
//! fields is the node's [`NodeShape`]; a family keeps one node per matching
//! entity.
//!
//! Nodes also carry the intrusive `previous`/`next` links used by
//! [`NodeList`](crate::NodeList).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::ecs::component::{downcast, Component, ComponentRef, ComponentType, ErasedComponent};
use crate::ecs::entity::Entity;

/// One field of a node shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeField {
    name: &'static str,
    component_type: ComponentType,
}

impl NodeField {
    /// Field name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Component key the field aliases.
    #[inline]
    #[must_use]
    pub const fn component_type(&self) -> ComponentType {
        self.component_type
    }
}

/// The field layout of a node type.
///
/// Two shapes are equal when they list the same fields in the same order,
/// so the engine keeps exactly one family per shape.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NodeShape {
    fields: Rc<[NodeField]>,
}

impl NodeShape {
    /// Starts building a shape.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ashlar_core::{Component, NodeShape};
    ///
    /// struct Position(f32, f32);
    /// impl Component for Position {}
    /// struct Velocity(f32, f32);
    /// impl Component for Velocity {}
    ///
    /// let shape = NodeShape::builder()
    ///     .field::<Position>("position")
    ///     .field::<Velocity>("velocity")
    ///     .build();
    /// assert_eq!(shape.len(), 2);
    /// ```
    #[must_use]
    pub fn builder() -> NodeShapeBuilder {
        NodeShapeBuilder { fields: Vec::new() }
    }

    /// All fields, in declaration order.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[NodeField] {
        &self.fields
    }

    /// Number of fields.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` for a shape without fields.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if some field aliases `component_type`.
    #[inline]
    #[must_use]
    pub fn contains(&self, component_type: ComponentType) -> bool {
        self.index_of(component_type).is_some()
    }

    /// Position of the field aliasing `component_type`.
    #[must_use]
    pub fn index_of(&self, component_type: ComponentType) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.component_type == component_type)
    }

    /// Position of the field called `name`.
    #[must_use]
    pub fn index_of_field(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Returns `true` if `entity` has a component for every field.
    #[must_use]
    pub fn is_satisfied_by(&self, entity: &Entity) -> bool {
        self.fields
            .iter()
            .all(|field| entity.has_type(field.component_type))
    }
}

impl fmt::Debug for NodeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|field| (field.name, field.component_type)))
            .finish()
    }
}

/// Builder for [`NodeShape`].
#[derive(Debug)]
pub struct NodeShapeBuilder {
    fields: Vec<NodeField>,
}

impl NodeShapeBuilder {
    /// Adds a field aliasing components of type `T`.
    #[must_use]
    pub fn field<T: Component>(self, name: &'static str) -> Self {
        self.field_as(name, ComponentType::of::<T>())
    }

    /// Adds a field aliasing components stored under `component_type`.
    ///
    /// A second field for the same component type, or with a name already
    /// used, is ignored.
    #[must_use]
    pub fn field_as(mut self, name: &'static str, component_type: ComponentType) -> Self {
        if self
            .fields
            .iter()
            .any(|field| field.component_type == component_type || field.name == name)
        {
            warn!(field = name, component = %component_type, "duplicate node field ignored");
            return self;
        }
        self.fields.push(NodeField {
            name,
            component_type,
        });
        self
    }

    /// Finishes the shape.
    #[must_use]
    pub fn build(self) -> NodeShape {
        NodeShape {
            fields: self.fields.into(),
        }
    }
}

/// A statically declared node type.
///
/// # Example
///
/// ```rust
/// use ashlar_core::{Component, NodeShape, NodeType};
///
/// struct Position(f32, f32);
/// impl Component for Position {}
///
/// struct RenderNode;
///
/// impl NodeType for RenderNode {
///     fn shape() -> NodeShape {
///         NodeShape::builder().field::<Position>("position").build()
///     }
/// }
/// ```
pub trait NodeType: 'static {
    /// The field layout of this node type.
    fn shape() -> NodeShape;
}

/// Where a node is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Fresh or recycled, not bound to any list.
    Idle,
    /// Part of a node list.
    Linked,
    /// Removed from a list; links still point at former neighbours.
    Unlinked,
    /// Waiting in a node pool cache for the current traversal to end.
    Cached,
}

struct NodeInner {
    shape: NodeShape,
    entity: RefCell<Option<Entity>>,
    components: RefCell<Vec<Option<ErasedComponent>>>,
    previous: RefCell<Weak<NodeInner>>,
    next: RefCell<Option<Node>>,
    state: Cell<NodeState>,
    owner: Cell<usize>,
    sequence: Cell<u64>,
}

/// Shared handle to a node.
///
/// # Example
///
/// ```rust
/// use ashlar_core::{Component, Entity, Node, NodeShape};
///
/// struct Position(f32);
/// impl Component for Position {}
///
/// let shape = NodeShape::builder().field::<Position>("position").build();
/// let entity = Entity::new();
/// entity.add(Position(1.0));
///
/// let node = Node::new(&shape);
/// assert!(node.bind(&entity));
/// node.get::<Position>().unwrap().borrow_mut().0 = 2.0;
/// assert_eq!(entity.get::<Position>().unwrap().borrow().0, 2.0);
/// ```
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl Node {
    /// Creates an unbound node for `shape`.
    #[must_use]
    pub fn new(shape: &NodeShape) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                shape: shape.clone(),
                entity: RefCell::new(None),
                components: RefCell::new(vec![None; shape.len()]),
                previous: RefCell::new(Weak::new()),
                next: RefCell::new(None),
                state: Cell::new(NodeState::Idle),
                owner: Cell::new(0),
                sequence: Cell::new(0),
            }),
        }
    }

    /// Binds the node to `entity`, aliasing one component per field.
    ///
    /// # Returns
    ///
    /// `false` (and the node is left untouched) if the entity lacks a
    /// component for some field.
    pub fn bind(&self, entity: &Entity) -> bool {
        let mut bound = Vec::with_capacity(self.inner.shape.len());
        for field in self.inner.shape.fields() {
            match entity.get_type(field.component_type) {
                Some(component) => bound.push(component),
                None => return false,
            }
        }
        let mut components = self.inner.components.borrow_mut();
        for (slot, component) in components.iter_mut().zip(bound) {
            *slot = Some(component);
        }
        *self.inner.entity.borrow_mut() = Some(entity.clone());
        true
    }

    /// The entity this node views.
    #[must_use]
    pub fn entity(&self) -> Option<Entity> {
        self.inner.entity.borrow().clone()
    }

    /// The node's shape.
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &NodeShape {
        &self.inner.shape
    }

    /// Returns the component aliased by the field of type `T`.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<ComponentRef<T>> {
        let index = self.inner.shape.index_of(ComponentType::of::<T>())?;
        self.typed(index)
    }

    /// Returns the component aliased by the field called `name`.
    #[must_use]
    pub fn field<T: 'static>(&self, name: &str) -> Option<ComponentRef<T>> {
        let index = self.inner.shape.index_of_field(name)?;
        self.typed(index)
    }

    /// Returns the type-erased component of field `index`.
    #[must_use]
    pub fn component(&self, index: usize) -> Option<ErasedComponent> {
        self.inner.components.borrow().get(index).cloned().flatten()
    }

    fn typed<T: 'static>(&self, index: usize) -> Option<ComponentRef<T>> {
        self.component(index).and_then(|component| downcast(&component))
    }

    /// Next node in the list.
    #[must_use]
    pub fn next(&self) -> Option<Node> {
        self.inner.next.borrow().clone()
    }

    /// Previous node in the list.
    #[must_use]
    pub fn previous(&self) -> Option<Node> {
        self.inner
            .previous
            .borrow()
            .upgrade()
            .map(|inner| Node { inner })
    }

    /// Lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.inner.state.get()
    }

    /// Returns `true` while the node is part of a list.
    #[inline]
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.inner.state.get() == NodeState::Linked
    }

    /// Points the field aliasing `component_type` at a new component.
    pub(crate) fn rebind(&self, component_type: ComponentType, component: ErasedComponent) -> bool {
        let Some(index) = self.inner.shape.index_of(component_type) else {
            return false;
        };
        self.inner.components.borrow_mut()[index] = Some(component);
        true
    }

    /// Drops the entity and components, keeping the field storage.
    pub(crate) fn clear_payload(&self) {
        for slot in self.inner.components.borrow_mut().iter_mut() {
            *slot = None;
        }
        *self.inner.entity.borrow_mut() = None;
    }

    pub(crate) fn clear_links(&self) {
        *self.inner.previous.borrow_mut() = Weak::new();
        *self.inner.next.borrow_mut() = None;
    }

    /// Returns the node to its freshly built condition.
    pub(crate) fn reset(&self) {
        self.clear_payload();
        self.clear_links();
        self.inner.owner.set(0);
        self.inner.state.set(NodeState::Idle);
    }

    pub(crate) fn set_next(&self, next: Option<&Node>) {
        *self.inner.next.borrow_mut() = next.cloned();
    }

    pub(crate) fn set_previous(&self, previous: Option<&Node>) {
        *self.inner.previous.borrow_mut() = previous.map_or_else(Weak::new, |node| Rc::downgrade(&node.inner));
    }

    pub(crate) fn take_next(&self) -> Option<Node> {
        self.inner.next.borrow_mut().take()
    }

    pub(crate) fn set_state(&self, state: NodeState) {
        self.inner.state.set(state);
    }

    pub(crate) fn owner(&self) -> usize {
        self.inner.owner.get()
    }

    pub(crate) fn set_owner(&self, owner: usize) {
        self.inner.owner.set(owner);
    }

    /// Position stamp of the last append into a list.
    pub(crate) fn sequence(&self) -> u64 {
        self.inner.sequence.get()
    }

    pub(crate) fn set_sequence(&self, sequence: u64) {
        self.inner.sequence.set(sequence);
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("entity", &self.inner.entity.borrow().as_ref().map(Entity::name))
            .field("state", &self.inner.state.get())
            .finish()
    }
}
