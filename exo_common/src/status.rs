//! Per-tick status record.
//!
//! Built by the control unit after every tick and handed upward for console
//! or telemetry rendering. Rendering itself lives elsewhere.

use crate::drive::{ControlMode, DriveState};
use crate::gait::{GaitPhaseId, RobotMode};
use serde::Serialize;

/// Snapshot of one joint and its drive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointStatus {
    pub id: usize,
    pub name: String,
    /// Best current angle estimate [deg].
    pub angle_deg: f64,
    pub drive_state: DriveState,
    pub control_mode: ControlMode,
    /// Last status word read from the drive.
    pub status_word: u16,
}

/// Snapshot of the whole kernel after one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickStatus {
    pub cycle: u64,
    pub phase: GaitPhaseId,
    pub current_motion: RobotMode,
    pub next_motion: RobotMode,
    /// Trajectory progress, `None` while no trajectory runs.
    pub trajectory_fraction: Option<f64>,
    pub joints: Vec<JointStatus>,
    /// Tick exceeded the control period.
    pub overrun: bool,
}

impl TickStatus {
    /// Whether every drive reports `Enabled`.
    pub fn all_enabled(&self) -> bool {
        self.joints
            .iter()
            .all(|j| j.drive_state == DriveState::Enabled)
    }
}
