//! # Engine Configuration
//!
//! Capacity hints for the engine's pools. Every field is optional in a
//! config file; missing fields take their default.
//!
//! ```toml
//! entity_capacity = 4096
//! system_capacity = 32
//! node_pool_prealloc = 128
//! listener_capacity = 8
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Entity slots pre-built in the registry.
    pub entity_capacity: usize,
    /// System slots pre-built in the system list.
    pub system_capacity: usize,
    /// Idle nodes pre-built in each family's node pool.
    pub node_pool_prealloc: usize,
    /// Listener slots pre-built in each engine signal.
    pub listener_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 64,
            system_capacity: 16,
            node_pool_prealloc: 0,
            listener_capacity: 4,
        }
    }
}

impl EngineConfig {
    /// Sizing for a full game world.
    #[must_use]
    pub fn production() -> Self {
        Self {
            entity_capacity: 8192,
            system_capacity: 64,
            node_pool_prealloc: 256,
            listener_capacity: 16,
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] on malformed TOML, unknown keys or
    /// mistyped values.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<std::path::Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EcsError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = EngineConfig::from_toml_str("entity_capacity = 10\n").unwrap();
        assert_eq!(config.entity_capacity, 10);
        assert_eq!(config.system_capacity, EngineConfig::default().system_capacity);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            EngineConfig::from_toml_str("entity_capacity = \"many\""),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("thread_count = 4"),
            Err(EcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::load("/nonexistent/ashlar.toml"),
            Err(EcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_production_is_larger() {
        let production = EngineConfig::production();
        assert!(production.entity_capacity > EngineConfig::default().entity_capacity);
        assert!(production.node_pool_prealloc > 0);
    }
}
