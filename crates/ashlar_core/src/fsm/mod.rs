//! # Entity State Machines
//!
//! Behavior switching by component swapping: each named state maps
//! component keys to providers, and changing state removes and adds
//! components on the entity. Families react as they would to any other
//! component change.

mod machine;
mod provider;
mod state;

pub use machine::EntityStateMachine;
pub use provider::{
    ComponentProvider, DynamicProvider, InstanceProvider, ProviderId, SingletonProvider,
    TypeProvider,
};
pub use state::{EntityState, StateComponentMapping};
