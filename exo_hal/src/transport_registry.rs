//! Transport registry.
//!
//! Provides a `TransportRegistry` struct for registering and retrieving
//! transport factories. Constructor-injected, no global state.

use exo_common::hal::transport::{Transport, TransportError, TransportFactory};
use std::collections::HashMap;

/// Registry of available fieldbus transports.
pub struct TransportRegistry {
    factories: HashMap<&'static str, TransportFactory>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with every built-in backend.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::transports::register_builtin(&mut registry);
        registry
    }

    /// Register a transport factory.
    ///
    /// # Panics
    /// Panics if a transport with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: TransportFactory) {
        if self.factories.contains_key(name) {
            panic!("Transport '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a transport factory by name.
    pub fn get_factory(&self, name: &str) -> Option<TransportFactory> {
        self.factories.get(name).copied()
    }

    /// Create a transport instance by name.
    ///
    /// # Errors
    /// Returns `TransportError::NotFound` if no transport with the given name is registered.
    pub fn create(&self, name: &str) -> Result<Box<dyn Transport>, TransportError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered transport names.
    pub fn list(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}
