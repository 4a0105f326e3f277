//! # Memory Management
//!
//! Pools that keep steady-state add/remove churn free of allocation.
//!
//! ## Design Philosophy
//!
//! Storage is built once and recycled. During a frame:
//! - Vacated slots and nodes go back to a free list
//! - Anything vacated mid-traversal waits in a cache tier until the
//!   traversal ends, so a parked cursor never sees a reused slot

mod component_pool;
mod node_pool;
mod pool;

pub use component_pool::ComponentPool;
pub use node_pool::NodePool;
pub use pool::{LinkedPool, PoolHandle, SlotState};
