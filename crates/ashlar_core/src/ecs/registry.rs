//! # Entity Registry
//!
//! The engine's set of live entities, in insertion order, with a name index.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::ecs::entity::{Entity, Membership};
use crate::error::{EcsError, EcsResult};
use crate::memory::{LinkedPool, PoolHandle};

/// Ordered collection of registered entities with unique names.
///
/// Entities record their membership, so removal and rename are O(1).
pub struct EntityRegistry {
    entities: LinkedPool<Entity>,
    names: HashMap<String, PoolHandle>,
}

impl EntityRegistry {
    /// Creates a registry with room for `capacity` entities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: LinkedPool::with_capacity(capacity),
            names: HashMap::with_capacity(capacity),
        }
    }

    /// Registers `entity` with the shared registry.
    ///
    /// # Errors
    ///
    /// - [`EcsError::AlreadyRegistered`] if the entity belongs to a registry
    /// - [`EcsError::DuplicateName`] if its name is taken
    pub fn insert(registry: &Rc<RefCell<Self>>, entity: &Entity) -> EcsResult<()> {
        if entity.is_registered() {
            return Err(EcsError::AlreadyRegistered {
                name: entity.name(),
            });
        }
        let name = entity.name();
        let handle = {
            let mut this = registry.borrow_mut();
            if this.names.contains_key(&name) {
                return Err(EcsError::DuplicateName { name });
            }
            let handle = this.entities.push_back(entity.clone());
            this.names.insert(name, handle);
            handle
        };
        entity.set_membership(Some(Membership {
            registry: Rc::downgrade(registry),
            handle,
        }));
        Ok(())
    }

    /// Unregisters `entity`.
    ///
    /// # Returns
    ///
    /// `true` if the entity was a member of this registry.
    pub fn remove(&mut self, entity: &Entity) -> bool {
        let Some(handle) = self.handle_of(entity) else {
            return false;
        };
        self.entities.remove(handle);
        self.names.remove(&entity.name());
        entity.set_membership(None);
        true
    }

    /// Moves `entity`'s name index entry to `name`.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateName`] if another member already uses `name`.
    pub fn rename(&mut self, entity: &Entity, name: &str) -> EcsResult<()> {
        let Some(handle) = self.handle_of(entity) else {
            return Ok(());
        };
        if self.names.get(name).is_some_and(|other| *other != handle) {
            return Err(EcsError::DuplicateName {
                name: name.to_owned(),
            });
        }
        let previous = entity.name();
        self.names.remove(&previous);
        self.names.insert(name.to_owned(), handle);
        debug!(from = %previous, to = %name, "entity renamed");
        Ok(())
    }

    /// Returns `true` if `entity` is a member of this registry.
    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.handle_of(entity).is_some()
    }

    /// Looks an entity up by name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Entity> {
        let handle = self.names.get(name)?;
        self.entities.get(*handle).cloned()
    }

    /// Returns the oldest member.
    #[must_use]
    pub fn first(&self) -> Option<Entity> {
        self.entities
            .first()
            .and_then(|handle| self.entities.get(handle))
            .cloned()
    }

    /// Snapshot of all members, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Entity> {
        self.entities.iter().map(|(_, entity)| entity.clone()).collect()
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn handle_of(&self, entity: &Entity) -> Option<PoolHandle> {
        let handle = entity.registry_handle()?;
        self.entities
            .get(handle)
            .is_some_and(|member| member.ptr_eq(entity))
            .then_some(handle)
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
