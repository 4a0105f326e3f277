//! # Core Error Types
//!
//! Contract violations reported by the engine. Expected absences (missing
//! component, unknown entity name, unregistered system) are never errors;
//! they come back as `None` or `false`.

use thiserror::Error;

/// Errors that can occur in the core engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Another entity in the same registry already uses this name.
    #[error("entity name {name:?} is already in use by another entity")]
    DuplicateName {
        /// The contested name.
        name: String,
    },

    /// The entity is already a member of a registry.
    #[error("entity {name:?} is already registered with an engine")]
    AlreadyRegistered {
        /// Name of the entity at the time of the attempt.
        name: String,
    },

    /// The entity is not a member of this engine's registry.
    #[error("entity {name:?} is not registered with this engine")]
    NotRegistered {
        /// Name of the entity.
        name: String,
    },

    /// The system instance is already scheduled with this engine.
    #[error("system {system} is already added to the engine")]
    SystemAlreadyAdded {
        /// Type name of the system.
        system: &'static str,
    },

    /// `Engine::update` was called from inside an update.
    #[error("engine update is already in progress")]
    UpdateInProgress,

    /// A node list was released while a traversal still holds it.
    #[error("node list is still being traversed ({traversals} active)")]
    NodeListInUse {
        /// Number of live traversals.
        traversals: usize,
    },

    /// A state machine was asked to enter a state it does not know.
    #[error("entity state {name:?} does not exist")]
    UnknownState {
        /// The requested state name.
        name: String,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for core operations.
pub type EcsResult<T> = Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EcsError::DuplicateName {
            name: "player".into(),
        };
        assert_eq!(
            err.to_string(),
            "entity name \"player\" is already in use by another entity"
        );
        assert_eq!(
            EcsError::NodeListInUse { traversals: 2 }.to_string(),
            "node list is still being traversed (2 active)"
        );
    }
}
