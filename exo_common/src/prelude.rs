//! Prelude module for common re-exports.
//!
//! ```rust
//! use exo_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::robot::{
    CalibrationPoints, ControlConfig, FeedbackSource, JointConfig, JointKind, PilotParameters,
    RobotConfig, SimulationConfig, TrajectoryConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CYCLE_TIME_US, MAX_JOINTS, NUM_JOINTS};

// ─── Drives ─────────────────────────────────────────────────────────
pub use crate::drive::{
    ControlMode, ControlWord, DataType, DriveKind, DriveState, MotorProfile, NodeId, ObjectEntry,
    StatusWord,
};

// ─── Gait ───────────────────────────────────────────────────────────
pub use crate::gait::{Foot, GaitPhaseId, JointVector, RobotMode};

// ─── Transport ──────────────────────────────────────────────────────
pub use crate::hal::command::{BusCommand, CommandParseError, NmtCommand, SequencedCommand};
pub use crate::hal::transport::{Transport, TransportError, TransportFactory};

// ─── Status ─────────────────────────────────────────────────────────
pub use crate::status::{JointStatus, TickStatus};
