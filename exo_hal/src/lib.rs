//! # EXO HAL Library
//!
//! Fieldbus transport backends behind the `Transport` trait defined in
//! `exo_common::hal::transport`.
//!
//! # Module Structure
//!
//! - [`transport_registry`] - Transport factory registration
//! - [`transports`] - Transport implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     exo_hal (library)                        │
//! │  ┌──────────────────┐        ┌────────────────────────────┐  │
//! │  │ TransportRegistry│──────► │ Transport (trait object)   │  │
//! │  │  name → factory  │        │  simulation, ...           │  │
//! │  └──────────────────┘        └────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod transport_registry;
pub mod transports;

pub use crate::transport_registry::TransportRegistry;
pub use crate::transports::simulation::SimulationTransport;
