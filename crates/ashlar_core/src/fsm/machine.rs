//! Entity state machine.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::ecs::Entity;
use crate::error::{EcsError, EcsResult};
use crate::fsm::state::EntityState;

/// Swaps an entity's components as it moves between named states.
///
/// On a change, components of the old state are removed unless the new
/// state maps the same key to an equivalent provider (same
/// [`ProviderId`](crate::ProviderId)); components of the new state are then
/// added. Equivalent components stay on the entity untouched.
///
/// # Example
///
/// ```rust
/// use ashlar_core::{Component, Entity, EntityStateMachine};
///
/// #[derive(Default)]
/// struct Walking;
/// impl Component for Walking {}
///
/// #[derive(Default)]
/// struct Flying;
/// impl Component for Flying {}
///
/// let entity = Entity::new();
/// let mut fsm = EntityStateMachine::new(entity.clone());
/// fsm.create_state("ground").add_default::<Walking>();
/// fsm.create_state("air").add_default::<Flying>();
///
/// fsm.change_state("ground").unwrap();
/// assert!(entity.has::<Walking>());
/// fsm.change_state("air").unwrap();
/// assert!(entity.has::<Flying>() && !entity.has::<Walking>());
/// ```
pub struct EntityStateMachine {
    entity: Entity,
    states: HashMap<String, EntityState>,
    current: Option<String>,
}

impl EntityStateMachine {
    /// Creates a machine driving `entity`, in no state.
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            states: HashMap::new(),
            current: None,
        }
    }

    /// The driven entity.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Registers a state, replacing any state with the same name.
    pub fn add_state(&mut self, name: impl Into<String>, state: EntityState) -> &mut Self {
        self.states.insert(name.into(), state);
        self
    }

    /// Registers an empty state and returns it for configuration.
    pub fn create_state(&mut self, name: impl Into<String>) -> &mut EntityState {
        let state = self.states.entry(name.into()).or_default();
        *state = EntityState::new();
        state
    }

    /// Name of the current state.
    #[must_use]
    pub fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Moves the entity into state `name`. Changing to the current state
    /// does nothing.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownState`] if no state is registered under `name`.
    pub fn change_state(&mut self, name: &str) -> EcsResult<()> {
        let Some(next) = self.states.get(name) else {
            warn!(state = name, entity = %self.entity.name(), "unknown entity state");
            return Err(EcsError::UnknownState {
                name: name.to_owned(),
            });
        };
        if self.current.as_deref() == Some(name) {
            return Ok(());
        }

        let mut kept = HashSet::new();
        if let Some(current) = self.current.as_ref().and_then(|current| self.states.get(current)) {
            for (key, provider) in current.providers() {
                let same = next
                    .get(key)
                    .is_some_and(|other| other.identifier() == provider.identifier());
                if same {
                    kept.insert(key);
                } else {
                    self.entity.remove_type(key);
                }
            }
        }
        for (key, provider) in next.providers() {
            if !kept.contains(&key) {
                self.entity.add_erased(key, provider.component());
            }
        }

        debug!(
            entity = %self.entity.name(),
            from = self.current.as_deref().unwrap_or("-"),
            to = name,
            "entity state changed"
        );
        self.current = Some(name.to_owned());
        Ok(())
    }
}
