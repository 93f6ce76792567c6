//! Robot configuration model.
//!
//! One TOML file describes the whole exoskeleton: control tick, motor
//! profile, pilot anthropometrics, and one `[[joints]]` table per actuated
//! joint with its drive variant, limits and two-point calibration.
//!
//! `RobotConfig::default()` is the six-joint reference exoskeleton.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "exo-alex"
//!
//! [control]
//! cycle_time_us = 1000
//! feedback = "telemetry"
//!
//! [[joints]]
//! id = 0
//! name = "left_hip"
//! kind = "hip"
//! node_id = 1
//! drive = "copley"
//! min_deg = 70.0
//! max_deg = 210.0
//!
//! [joints.calibration]
//! raw_a = 250880
//! deg_a = 90.0
//! raw_b = 0
//! deg_b = 180.0
//! ```

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{CYCLE_TIME_US, MAX_JOINTS, SIMULATION_TRANSPORT, STATUS_INTERVAL_CYCLES};
use crate::drive::{DriveKind, MotorProfile, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ─── Joint Indices ──────────────────────────────────────────────────

/// Joint index of the left hip on the reference robot.
pub const LEFT_HIP: usize = 0;
pub const LEFT_KNEE: usize = 1;
pub const RIGHT_HIP: usize = 2;
pub const RIGHT_KNEE: usize = 3;
pub const LEFT_ANKLE: usize = 4;
pub const RIGHT_ANKLE: usize = 5;

// ─── Joint Configuration ────────────────────────────────────────────

/// Anatomical joint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointKind {
    Hip,
    Knee,
    Ankle,
}

/// Two reference points relating raw drive counts to joint degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalibrationPoints {
    pub raw_a: i32,
    pub deg_a: f64,
    pub raw_b: i32,
    pub deg_b: f64,
}

impl CalibrationPoints {
    /// Hip reference pair: 250880 counts at 90°, 0 counts at 180°.
    pub const HIP: Self = Self {
        raw_a: 250_880,
        deg_a: 90.0,
        raw_b: 0,
        deg_b: 180.0,
    };

    /// Knee reference pair: 250880 counts at 90°, 0 counts at 0°.
    pub const KNEE: Self = Self {
        raw_a: 250_880,
        deg_a: 90.0,
        raw_b: 0,
        deg_b: 0.0,
    };

    /// Ankle reference pair: 0 counts at 90°, -800000 counts at 115°.
    pub const ANKLE: Self = Self {
        raw_a: 0,
        deg_a: 90.0,
        raw_b: -800_000,
        deg_b: 115.0,
    };

    /// Two distinct points in both coordinates define a usable affine map.
    pub fn is_degenerate(&self) -> bool {
        self.raw_a == self.raw_b || self.deg_a == self.deg_b || !self.deg_a.is_finite() || !self.deg_b.is_finite()
    }
}

/// Per-joint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointConfig {
    /// Stable joint index (0-based, contiguous).
    pub id: usize,
    pub name: String,
    pub kind: JointKind,
    /// Bus address of the joint's drive.
    pub node_id: NodeId,
    pub drive: DriveKind,
    /// Lower angle limit [deg].
    pub min_deg: f64,
    /// Upper angle limit [deg].
    pub max_deg: f64,
    /// Angle reported to the trajectory generator when no fresh
    /// measurement exists. Defaults to the middle of the range.
    #[serde(default)]
    pub placeholder_deg: Option<f64>,
    pub calibration: CalibrationPoints,
}

impl JointConfig {
    /// Placeholder angle, falling back to the middle of the limits.
    pub fn placeholder(&self) -> f64 {
        self.placeholder_deg
            .unwrap_or((self.min_deg + self.max_deg) / 2.0)
    }
}

// ─── Control / Trajectory / Pilot ───────────────────────────────────

/// Where a joint's angle estimate comes from.
///
/// The two are distinct deployment targets and are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    /// Actual-position telemetry converted back to degrees (hardware).
    #[default]
    Telemetry,
    /// Last commanded angle (no-hardware / virtual robot).
    LastCommand,
}

/// Control loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    /// Control tick period [µs].
    pub cycle_time_us: u64,
    /// Stop the loop on the first overrun instead of logging it.
    pub abort_on_overrun: bool,
    pub feedback: FeedbackSource,
    /// Transport backend name looked up in the registry.
    pub transport: String,
    /// Status record is published every N ticks.
    pub status_interval: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: CYCLE_TIME_US,
            abort_on_overrun: false,
            feedback: FeedbackSource::Telemetry,
            transport: SIMULATION_TRANSPORT.to_string(),
            status_interval: STATUS_INTERVAL_CYCLES,
        }
    }
}

/// Operator anthropometrics consumed by the trajectory generator [m].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PilotParameters {
    pub lowerleg_length: f64,
    pub upperleg_length: f64,
    pub ankle_height: f64,
    pub foot_length: f64,
    pub hip_width: f64,
    pub torso_length: f64,
    pub buttocks_height: f64,
}

impl Default for PilotParameters {
    fn default() -> Self {
        Self {
            lowerleg_length: 0.44,
            upperleg_length: 0.44,
            ankle_height: 0.12,
            foot_length: 0.30,
            hip_width: 0.43,
            torso_length: 0.4,
            buttocks_height: 0.05,
        }
    }
}

/// Nominal trajectory durations [s].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrajectoryConfig {
    pub step_duration_s: f64,
    pub sit_stand_duration_s: f64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            step_duration_s: 2.0,
            sit_stand_duration_s: 4.0,
        }
    }
}

/// Fault injection for the virtual fieldbus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Commands addressed to these nodes are never acknowledged.
    pub unacknowledged_nodes: Vec<NodeId>,
}

// ─── Robot Configuration ────────────────────────────────────────────

/// Complete robot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RobotConfig {
    pub shared: SharedConfig,
    pub control: ControlConfig,
    /// Position-control motor profile.
    pub profile: MotorProfile,
    pub pilot: PilotParameters,
    pub trajectory: TrajectoryConfig,
    pub simulation: SimulationConfig,
    pub joints: Vec<JointConfig>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig {
                service_name: "exo-alex".to_string(),
                ..Default::default()
            },
            control: ControlConfig::default(),
            profile: MotorProfile::default(),
            pilot: PilotParameters::default(),
            trajectory: TrajectoryConfig::default(),
            simulation: SimulationConfig::default(),
            joints: reference_joints(),
        }
    }
}

impl RobotConfig {
    /// Semantic validation.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.control.cycle_time_us == 0 {
            return Err(invalid("control.cycle_time_us must be > 0"));
        }
        if self.control.status_interval == 0 {
            return Err(invalid("control.status_interval must be > 0"));
        }
        if !(self.trajectory.step_duration_s > 0.0 && self.trajectory.sit_stand_duration_s > 0.0) {
            return Err(invalid("trajectory durations must be > 0"));
        }
        if self.joints.is_empty() {
            return Err(invalid("at least one joint is required"));
        }
        if self.joints.len() > MAX_JOINTS {
            return Err(invalid(&format!(
                "{} joints configured, at most {MAX_JOINTS} supported",
                self.joints.len()
            )));
        }

        let mut node_ids = HashSet::new();
        for (idx, joint) in self.joints.iter().enumerate() {
            if joint.id != idx {
                return Err(invalid(&format!(
                    "joint '{}' has id {} but is entry {idx}; ids must be contiguous from 0",
                    joint.name, joint.id
                )));
            }
            if joint.node_id == 0 || joint.node_id > 127 {
                return Err(invalid(&format!(
                    "joint '{}' node_id {} outside 1..=127",
                    joint.name, joint.node_id
                )));
            }
            if !node_ids.insert(joint.node_id) {
                return Err(invalid(&format!("duplicate node_id {}", joint.node_id)));
            }
            if !(joint.min_deg < joint.max_deg) {
                return Err(invalid(&format!(
                    "joint '{}' min_deg {} must be below max_deg {}",
                    joint.name, joint.min_deg, joint.max_deg
                )));
            }
            if joint.calibration.is_degenerate() {
                return Err(invalid(&format!(
                    "joint '{}' calibration points must differ in both raw and degrees",
                    joint.name
                )));
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

/// Joint table of the six-joint reference exoskeleton (node id = index + 1).
fn reference_joints() -> Vec<JointConfig> {
    let joint = |id: usize, name: &str, kind: JointKind| {
        let (drive, min_deg, max_deg, placeholder_deg, calibration) = match kind {
            JointKind::Hip => (DriveKind::Copley, 70.0, 210.0, None, CalibrationPoints::HIP),
            JointKind::Knee => (DriveKind::Copley, 0.0, 120.0, None, CalibrationPoints::KNEE),
            JointKind::Ankle => (
                DriveKind::Schneider,
                75.0,
                105.0,
                Some(85.0),
                CalibrationPoints::ANKLE,
            ),
        };
        JointConfig {
            id,
            name: name.to_string(),
            kind,
            node_id: (id + 1) as NodeId,
            drive,
            min_deg,
            max_deg,
            placeholder_deg,
            calibration,
        }
    };

    vec![
        joint(LEFT_HIP, "left_hip", JointKind::Hip),
        joint(LEFT_KNEE, "left_knee", JointKind::Knee),
        joint(RIGHT_HIP, "right_hip", JointKind::Hip),
        joint(RIGHT_KNEE, "right_knee", JointKind::Knee),
        joint(LEFT_ANKLE, "left_ankle", JointKind::Ankle),
        joint(RIGHT_ANKLE, "right_ankle", JointKind::Ankle),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::consts::NUM_JOINTS;

    #[test]
    fn reference_robot_is_valid() {
        let config = RobotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.joints.len(), NUM_JOINTS);
        assert_eq!(config.joints[LEFT_ANKLE].drive, DriveKind::Schneider);
        assert_eq!(config.joints[RIGHT_HIP].node_id, 3);
        assert_eq!(config.joints[RIGHT_ANKLE].placeholder(), 85.0);
        assert_eq!(config.joints[LEFT_KNEE].placeholder(), 60.0);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RobotConfig::from_toml(
            r#"
[control]
feedback = "last_command"
cycle_time_us = 2000
"#,
        )
        .unwrap();
        assert_eq!(config.control.feedback, FeedbackSource::LastCommand);
        assert_eq!(config.control.cycle_time_us, 2000);
        assert_eq!(config.control.transport, SIMULATION_TRANSPORT);
        assert_eq!(config.joints.len(), NUM_JOINTS);
        assert_eq!(config.profile.velocity, 4_000_000);
    }

    #[test]
    fn unknown_fields_rejected() {
        let result = RobotConfig::from_toml("[control]\ncycle_time = 5\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn validation_rejects_bad_joints() {
        let mut config = RobotConfig::default();
        config.joints[1].id = 4;
        assert!(config.validate().is_err());

        let mut config = RobotConfig::default();
        config.joints[1].node_id = 1;
        assert!(config.validate().is_err());

        let mut config = RobotConfig::default();
        config.joints[0].min_deg = 300.0;
        assert!(config.validate().is_err());

        let mut config = RobotConfig::default();
        config.joints[0].calibration.deg_b = config.joints[0].calibration.deg_a;
        assert!(config.validate().is_err());

        let mut config = RobotConfig::default();
        config.control.cycle_time_us = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn too_many_joints_rejected() {
        let mut config = RobotConfig::default();
        for i in NUM_JOINTS..=MAX_JOINTS {
            let mut extra = config.joints[0].clone();
            extra.id = i;
            extra.node_id = (i + 1) as NodeId;
            config.joints.push(extra);
        }
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
