//! Actuator protocol state machine (CiA 402 over service/process data).
//!
//! ```text
//!   Disabled ──ready_to_switch_on──► ReadyToSwitchOn ──enable──► Enabled
//!      ▲                                                            │
//!      └──────────────────────── disable (any state) ◄──────────────┘
//! ```
//!
//! A control mode (`Position`, `Velocity`, `Torque`) is only ever held while
//! `Enabled`. Changing mode requires going back through `Disabled`.
//!
//! - [`sdo`] - Command batch generation
//! - [`protocol`] - Per-drive state tracking and transitions
//! - [`variants`] - `Drive` capability trait and the vendor variants

pub mod protocol;
pub mod sdo;
pub mod variants;

use exo_common::drive::{ControlMode, DriveState, NodeId};
use exo_common::hal::transport::TransportError;
use thiserror::Error;

pub use protocol::DriveProtocol;
pub use variants::{CopleyDrive, Drive, SchneiderDrive, TelemetryCaps, build_drive};

/// Errors returned by drive operations.
///
/// All of them are recoverable; the caller decides whether to retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriveError {
    /// Transition not allowed from the current state.
    #[error("node {node}: {operation} not allowed in {state:?}/{mode:?}")]
    InvalidState {
        node: NodeId,
        operation: &'static str,
        state: DriveState,
        mode: ControlMode,
    },

    /// Setpoint for an axis the drive is not configured for.
    #[error("node {node}: expected {expected:?} control, drive is in {actual:?}")]
    ModeMismatch {
        node: NodeId,
        expected: ControlMode,
        actual: ControlMode,
    },

    /// Transport acknowledged fewer commands than were sent.
    #[error("node {node}: {acknowledged}/{sent} commands acknowledged")]
    Unacknowledged {
        node: NodeId,
        acknowledged: usize,
        sent: usize,
    },

    /// Process data write failed.
    #[error("node {node}: {source}")]
    Transport {
        node: NodeId,
        #[source]
        source: TransportError,
    },
}
