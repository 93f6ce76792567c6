//! Fieldbus transport trait and error types.
//!
//! This module defines:
//! - `Transport` trait - Interface for pluggable fieldbus backends
//! - `TransportError` enum - Error types for transport operations
//! - `TransportFactory` type alias - Factory function type

use crate::drive::{NodeId, ObjectEntry};
use crate::robot::RobotConfig;
use thiserror::Error;

/// Error types for transport operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Backend initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Backend name not present in the registry
    #[error("Transport not found: {0}")]
    NotFound(String),

    /// Bus communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Process data write to a node that does not answer
    #[error("Node {0} not reachable")]
    NodeUnreachable(NodeId),

    /// Operation attempted after `shutdown()`
    #[error("Transport is shut down")]
    Closed,
}

/// Factory function type for creating transport instances.
pub type TransportFactory = fn() -> Box<dyn Transport>;

/// Trait defining the interface for fieldbus transports.
///
/// Two channels are exposed. Service data (configuration, state changes) is
/// sent as batches of opaque command lines of the form
/// `[seq] <node> write <index> <sub> <type> <value>`; the transport answers
/// with the number of acknowledged lines. Process data (targets and
/// telemetry) is exchanged per object entry.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before the control loop starts
/// 2. `send()` / `write_target()` / `read_entry()` - Called from the control tick
/// 3. `shutdown()` - Called after the robot has disabled its drives
///
/// # Timing
///
/// `send()` blocks until every line is acknowledged or the backend timeout
/// expires. A timeout counts as an unacknowledged line, never as an error.
pub trait Transport: Send {
    /// Returns the backend's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Returns the backend's semantic version.
    fn version(&self) -> &'static str;

    /// Initialize the backend for the given robot.
    ///
    /// # Errors
    /// Return `TransportError::InitFailed` if the bus cannot be opened.
    fn init(&mut self, config: &RobotConfig) -> Result<(), TransportError>;

    /// Send a batch of service-data command lines.
    ///
    /// Returns the number of acknowledged lines. The batch succeeded only
    /// if the count equals `batch.len()`.
    fn send(&mut self, batch: &[String]) -> usize;

    /// Write a process-data target (RPDO) for one node.
    fn write_target(
        &mut self,
        node: NodeId,
        entry: ObjectEntry,
        value: i32,
    ) -> Result<(), TransportError>;

    /// Latest value of a telemetry entry for one node.
    ///
    /// `None` when the entry is not mapped or nothing was received yet.
    fn read_entry(&self, node: NodeId, entry: ObjectEntry) -> Option<i32>;

    /// Graceful shutdown of the backend.
    fn shutdown(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn version(&self) -> &'static str {
        (**self).version()
    }

    fn init(&mut self, config: &RobotConfig) -> Result<(), TransportError> {
        (**self).init(config)
    }

    fn send(&mut self, batch: &[String]) -> usize {
        (**self).send(batch)
    }

    fn write_target(
        &mut self,
        node: NodeId,
        entry: ObjectEntry,
        value: i32,
    ) -> Result<(), TransportError> {
        (**self).write_target(node, entry, value)
    }

    fn read_entry(&self, node: NodeId, entry: ObjectEntry) -> Option<i32> {
        (**self).read_entry(node, entry)
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        (**self).shutdown()
    }
}
