//! # ASHLAR Core Engine
//!
//! Node-list Entity Component System with incrementally maintained families.
//!
//! - Entities are bags of components, announced through signals
//! - A family per node shape keeps its node list equal to the matching
//!   entities, updated per event instead of per frame
//! - Systems run in priority order and may mutate anything mid-update
//!
//! ## Architecture Rules
//!
//! 1. **No allocation churn in steady state** - nodes and listener slots are
//!    pooled and recycled
//! 2. **Traversal safety** - nothing a live iterator can reach is recycled
//!    until the iterator is done
//! 3. **Single-threaded** - handles are `Rc`; one engine per thread
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use ashlar_core::{Component, Engine, Entity, ListIteratingSystem, NodeShape, NodeType};
//!
//! struct Position { x: f32 }
//! impl Component for Position {}
//! struct Velocity { x: f32 }
//! impl Component for Velocity {}
//!
//! struct MoveNode;
//! impl NodeType for MoveNode {
//!     fn shape() -> NodeShape {
//!         NodeShape::builder()
//!             .field::<Position>("position")
//!             .field::<Velocity>("velocity")
//!             .build()
//!     }
//! }
//!
//! let engine = Engine::new();
//! let movement = ListIteratingSystem::for_type::<MoveNode, _>(|node, time| {
//!     if let (Some(p), Some(v)) = (node.get::<Position>(), node.get::<Velocity>()) {
//!         p.borrow_mut().x += v.borrow().x * time as f32;
//!     }
//! });
//! engine.add_system(Rc::new(movement), 0).unwrap();
//!
//! let ship = Entity::named("ship");
//! ship.add(Position { x: 0.0 }).add(Velocity { x: 4.0 });
//! engine.add_entity(&ship).unwrap();
//!
//! engine.update(0.25).unwrap();
//! assert_eq!(ship.get::<Position>().unwrap().borrow().x, 1.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod fsm;
pub mod memory;
pub mod signal;

pub use config::EngineConfig;
pub use ecs::{
    Component, ComponentEvent, ComponentMatchingFamily, ComponentRef, ComponentType, Engine, Entity,
    EntityId, EntityRegistry, ErasedComponent, Family, FamilyFactory, ListIteratingSystem,
    NameEvent, Node, NodeField, NodeIter, NodeList, NodeShape, NodeShapeBuilder, NodeState,
    NodeType, System, WeakEngine,
};
pub use error::{EcsError, EcsResult};
pub use fsm::{
    ComponentProvider, DynamicProvider, EntityState, EntityStateMachine, InstanceProvider,
    ProviderId, SingletonProvider, StateComponentMapping, TypeProvider,
};
pub use memory::{ComponentPool, LinkedPool, NodePool, PoolHandle, SlotState};
pub use signal::{Listener, Signal, Signal0, Signal1, Signal2, Signal3};
