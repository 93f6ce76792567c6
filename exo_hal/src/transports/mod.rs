//! Transport implementations.
//!
//! - [`simulation`] - Virtual fieldbus for development and testing
//!
//! # Adding New Transports
//!
//! 1. Create a new submodule under `transports/`
//! 2. Implement the `Transport` trait from `exo_common::hal::transport`
//! 3. Register the factory in [`register_builtin`]

pub mod simulation;

use crate::transport_registry::TransportRegistry;
use exo_common::consts::SIMULATION_TRANSPORT;

/// Register all built-in transports.
pub fn register_builtin(registry: &mut TransportRegistry) {
    registry.register(SIMULATION_TRANSPORT, simulation::create_transport);
}
