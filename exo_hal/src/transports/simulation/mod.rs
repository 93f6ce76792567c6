//! Simulation transport module.
//!
//! A virtual fieldbus: every configured joint gets an ideal CiA 402 drive
//! that acknowledges service data, follows control words and reaches every
//! target instantly.

mod node;
mod transport;

pub use node::{NmtState, VirtualDrive, VirtualState};
pub use transport::SimulationTransport;

use exo_common::hal::transport::Transport;

/// Factory function to create a simulation transport instance.
pub fn create_transport() -> Box<dyn Transport> {
    Box::new(SimulationTransport::new())
}
