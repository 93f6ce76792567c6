//! Joint unit-conversion layer.
//!
//! A [`Joint`] owns one drive and converts between joint degrees and raw
//! drive counts. It refuses any command outside its configured limits
//! instead of clamping.

pub mod calibration;

use crate::drive::{Drive, DriveError, build_drive};
use calibration::Calibration;
pub use calibration::CalibrationError;
use exo_common::drive::{ControlMode, MotorProfile};
use exo_common::hal::transport::Transport;
use exo_common::robot::{FeedbackSource, JointConfig, JointKind};
use exo_common::status::JointStatus;
use tracing::warn;

/// Outcome of a position command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementResult {
    Success,
    /// Drive is not in position control.
    IncorrectMode,
    /// Angle outside the joint limits; nothing was sent.
    OutOfRange,
    /// Transport or calibration failure.
    Unknown,
}

impl MovementResult {
    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// One actuated degree of freedom.
pub struct Joint {
    id: usize,
    name: String,
    kind: JointKind,
    min_deg: f64,
    max_deg: f64,
    placeholder_deg: f64,
    feedback: FeedbackSource,
    calibration: Calibration,
    drive: Box<dyn Drive>,
    /// Best current angle estimate [deg].
    q: f64,
    /// Last accepted position command [deg].
    commanded: Option<f64>,
    /// `q` reflects a measurement or command rather than the placeholder.
    fresh: bool,
}

impl Joint {
    pub fn new(config: &JointConfig, feedback: FeedbackSource) -> Self {
        Self::with_drive(config, feedback, build_drive(config.drive, config.node_id))
    }

    /// Build around an existing drive instance.
    pub fn with_drive(config: &JointConfig, feedback: FeedbackSource, drive: Box<dyn Drive>) -> Self {
        let placeholder = config.placeholder();
        Self {
            id: config.id,
            name: config.name.clone(),
            kind: config.kind,
            min_deg: config.min_deg,
            max_deg: config.max_deg,
            placeholder_deg: placeholder,
            feedback,
            calibration: Calibration::new(config.calibration),
            drive,
            q: placeholder,
            commanded: None,
            fresh: false,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> JointKind {
        self.kind
    }

    pub fn drive(&self) -> &dyn Drive {
        self.drive.as_ref()
    }

    pub fn drive_mut(&mut self) -> &mut dyn Drive {
        self.drive.as_mut()
    }

    pub fn to_drive_units(&self, deg: f64) -> Result<i32, CalibrationError> {
        self.calibration.to_drive_units(deg)
    }

    pub fn from_drive_units(&self, raw: i32) -> Result<f64, CalibrationError> {
        self.calibration.from_drive_units(raw)
    }

    /// Current angle estimate [deg].
    #[inline]
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Angle estimate only if backed by telemetry or a command.
    pub fn fresh_q(&self) -> Option<f64> {
        self.fresh.then_some(self.q)
    }

    /// Angle for trajectory start capture; placeholder without fresh data.
    pub fn q_or_placeholder(&self) -> f64 {
        self.fresh_q().unwrap_or(self.placeholder_deg)
    }

    fn within_limits(&self, deg: f64) -> bool {
        deg.is_finite() && deg >= self.min_deg && deg <= self.max_deg
    }

    /// Command an absolute angle.
    pub fn set_position(&mut self, transport: &mut dyn Transport, deg: f64) -> MovementResult {
        if !self.within_limits(deg) {
            warn!(
                joint = %self.name,
                deg,
                min = self.min_deg,
                max = self.max_deg,
                "position outside joint limits"
            );
            return MovementResult::OutOfRange;
        }

        let raw = match self.to_drive_units(deg) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(joint = %self.name, error = %e, "calibration failed");
                return MovementResult::Unknown;
            }
        };
        if !self.raw_within_limits(raw) {
            warn!(joint = %self.name, raw, "raw command outside joint limits");
            return MovementResult::OutOfRange;
        }

        match self.drive.set_pos(transport, raw) {
            Ok(()) => {
                self.commanded = Some(deg);
                if self.feedback == FeedbackSource::LastCommand {
                    self.q = deg;
                    self.fresh = true;
                }
                MovementResult::Success
            }
            Err(DriveError::ModeMismatch { .. }) => MovementResult::IncorrectMode,
            Err(e) => {
                warn!(joint = %self.name, error = %e, "position command failed");
                MovementResult::Unknown
            }
        }
    }

    fn raw_within_limits(&self, raw: i32) -> bool {
        match (
            self.to_drive_units(self.min_deg),
            self.to_drive_units(self.max_deg),
        ) {
            (Ok(a), Ok(b)) => raw >= a.min(b) && raw <= a.max(b),
            _ => false,
        }
    }

    /// Refresh `q` from the configured feedback source.
    pub fn update_value(&mut self, transport: &dyn Transport) -> f64 {
        match self.feedback {
            FeedbackSource::Telemetry => {
                match self
                    .drive
                    .get_pos(transport)
                    .map(|raw| self.calibration.from_drive_units(raw))
                {
                    Some(Ok(deg)) => {
                        self.q = deg;
                        self.fresh = true;
                    }
                    Some(Err(_)) | None => self.fresh = false,
                }
            }
            FeedbackSource::LastCommand => {
                if let Some(deg) = self.commanded {
                    self.q = deg;
                    self.fresh = true;
                }
            }
        }
        self.q
    }

    /// Pin the estimate without commanding the drive (virtual robot only).
    pub fn pin_q(&mut self, deg: f64) {
        self.q = deg;
        self.commanded = Some(deg);
        self.fresh = true;
    }

    /// Actual velocity [counts/s]; 0 when not streamed.
    pub fn velocity(&self, transport: &dyn Transport) -> i32 {
        self.drive.get_vel(transport)
    }

    /// Actual torque [drive units]; 0 when not streamed.
    pub fn torque(&self, transport: &dyn Transport) -> i32 {
        self.drive.get_torque(transport)
    }

    /// Put the drive into `mode` and report the mode actually reached.
    ///
    /// `Unconfigured` disables the drive. `profile` defaults to
    /// [`MotorProfile::default`] for position and velocity control.
    pub fn set_mode(
        &mut self,
        transport: &mut dyn Transport,
        mode: ControlMode,
        profile: Option<&MotorProfile>,
    ) -> ControlMode {
        let default_profile = MotorProfile::default();
        let profile = profile.unwrap_or(&default_profile);
        let result = match mode {
            ControlMode::Position => self.drive.init_pos_control(transport, profile),
            ControlMode::Velocity => self.drive.init_vel_control(transport, profile),
            ControlMode::Torque => self.drive.init_torque_control(transport),
            ControlMode::Unconfigured => {
                self.drive.disable(transport);
                Ok(())
            }
            ControlMode::Error => Ok(()),
        };
        if let Err(e) = result {
            warn!(joint = %self.name, requested = ?mode, error = %e, "mode change failed");
        }
        self.drive.mode()
    }

    pub fn status(&self) -> JointStatus {
        JointStatus {
            id: self.id,
            name: self.name.clone(),
            angle_deg: self.q,
            drive_state: self.drive.state(),
            control_mode: self.drive.mode(),
            status_word: self.drive.status_word().bits(),
        }
    }
}

impl std::fmt::Debug for Joint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Joint")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("q", &self.q)
            .field("node", &self.drive.node_id())
            .field("state", &self.drive.state())
            .field("mode", &self.drive.mode())
            .finish()
    }
}
