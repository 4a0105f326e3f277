//! # Entity Component System
//!
//! Entities carry components; families keep one node list per node shape
//! in step with them; systems iterate those lists.
//!
//! ## Design Philosophy
//!
//! - Node lists are maintained incrementally from entity events, never
//!   rebuilt by scanning
//! - Components are shared cells, so every node of an entity aliases the
//!   same instance
//! - Any mutation is allowed mid-update and mid-iteration
//! - Single-threaded: handles are `Rc`, not `Send`

mod component;
mod engine;
mod entity;
mod family;
mod iterating;
mod node;
mod node_list;
mod registry;
mod system;

pub use component::{
    downcast, erase, same_component, Component, ComponentRef, ComponentType, ErasedComponent,
};
pub use engine::{Engine, WeakEngine};
pub use entity::{ComponentEvent, Entity, EntityId, NameEvent};
pub use family::{component_matching_factory, ComponentMatchingFamily, Family, FamilyFactory};
pub use iterating::ListIteratingSystem;
pub use node::{Node, NodeField, NodeShape, NodeShapeBuilder, NodeState, NodeType};
pub use node_list::{NodeIter, NodeList};
pub use registry::EntityRegistry;
pub use system::System;
