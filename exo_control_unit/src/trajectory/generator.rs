//! Trajectory generator contract and the built-in pose blender.

use exo_common::consts::NUM_JOINTS;
use exo_common::gait::{Foot, JointVector, RobotMode};
use exo_common::robot::{PilotParameters, TrajectoryConfig};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TrajectoryRangeError {
    /// Requested progress outside `[0, 1]`.
    #[error("trajectory fraction {0} outside [0, 1]")]
    OutOfRange(f64),

    #[error("no trajectory generated")]
    NotGenerated,
}

/// Joint-space trajectory source.
///
/// Angles are radians, ordered like the robot's joints. Progress is the
/// normalized fraction `elapsed / step_duration`.
pub trait TrajectoryGenerator: Send {
    fn set_pilot_parameters(&mut self, params: &PilotParameters);

    /// Select the target for the next motion.
    ///
    /// The start posture is not known yet; it arrives through
    /// [`generate_and_save_spline`](Self::generate_and_save_spline) when the
    /// executor starts the motion.
    fn initialise_trajectory(&mut self, mode: RobotMode, stance: Option<Foot>);

    /// Build the path from `start` to the selected target.
    fn generate_and_save_spline(&mut self, start: &JointVector);

    /// Set point at `fraction` of the current trajectory.
    fn set_point(&self, fraction: f64) -> Result<JointVector, TrajectoryRangeError>;

    /// Duration of the current trajectory [s].
    fn step_duration(&self) -> f64;
}

// ─── Poses ──────────────────────────────────────────────────────────

/// Reference postures of the six-joint robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pose {
    #[default]
    Standing,
    Sitting,
    /// Left foot ahead, weight shifting onto it.
    LeftForward,
    RightForward,
}

impl Pose {
    /// Angles [deg]: left hip, left knee, right hip, right knee, left
    /// ankle, right ankle.
    pub const fn degrees(self) -> [f64; NUM_JOINTS] {
        match self {
            Self::Standing => [180.0, 0.0, 180.0, 0.0, 90.0, 90.0],
            Self::Sitting => [90.0, 90.0, 90.0, 90.0, 90.0, 90.0],
            Self::LeftForward => [140.421, 30.4901, 177.933, 5.74668, 85.0, 85.0],
            Self::RightForward => [178.896, 5.31037, 140.421, 30.4901, 85.0, 85.0],
        }
    }

    /// Target posture of a motion. `stance` is the foot carrying weight.
    pub fn target(mode: RobotMode, stance: Option<Foot>) -> Self {
        match mode {
            RobotMode::SitDown => Self::Sitting,
            RobotMode::StandUp | RobotMode::FeetTogether | RobotMode::Initial => Self::Standing,
            _ => match stance {
                Some(Foot::Left) => Self::RightForward,
                Some(Foot::Right) | None => Self::LeftForward,
            },
        }
    }
}

// ─── Pose Blender ───────────────────────────────────────────────────

/// Minimum-jerk blend from the captured start posture to a [`Pose`].
#[derive(Debug, Clone)]
pub struct PoseTrajectoryGenerator {
    pilot: PilotParameters,
    step_duration_s: f64,
    sit_stand_duration_s: f64,
    pose: Pose,
    duration_s: f64,
    start: JointVector,
    target: JointVector,
    generated: bool,
}

impl PoseTrajectoryGenerator {
    pub fn new(config: &TrajectoryConfig) -> Self {
        Self {
            pilot: PilotParameters::default(),
            step_duration_s: config.step_duration_s,
            sit_stand_duration_s: config.sit_stand_duration_s,
            pose: Pose::Standing,
            duration_s: config.step_duration_s,
            start: JointVector::new(),
            target: JointVector::new(),
            generated: false,
        }
    }

    pub fn pilot(&self) -> &PilotParameters {
        &self.pilot
    }

    /// Pose selected by the last `initialise_trajectory`.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// `10s³ − 15s⁴ + 6s⁵`: zero velocity and acceleration at both ends.
    #[inline]
    fn min_jerk(s: f64) -> f64 {
        s * s * s * (10.0 + s * (-15.0 + 6.0 * s))
    }
}

impl TrajectoryGenerator for PoseTrajectoryGenerator {
    fn set_pilot_parameters(&mut self, params: &PilotParameters) {
        self.pilot = *params;
    }

    fn initialise_trajectory(&mut self, mode: RobotMode, stance: Option<Foot>) {
        self.pose = Pose::target(mode, stance);
        self.duration_s = match mode {
            RobotMode::SitDown | RobotMode::StandUp => self.sit_stand_duration_s,
            _ => self.step_duration_s,
        };
        self.generated = false;
        debug!(?mode, ?stance, pose = ?self.pose, duration_s = self.duration_s, "trajectory selected");
    }

    fn generate_and_save_spline(&mut self, start: &JointVector) {
        let pose = self.pose.degrees();
        self.start = start.clone();
        self.target = start
            .iter()
            .enumerate()
            .map(|(i, &q)| pose.get(i).map_or(q, |deg| deg.to_radians()))
            .collect();
        self.generated = true;
    }

    fn set_point(&self, fraction: f64) -> Result<JointVector, TrajectoryRangeError> {
        if !self.generated {
            return Err(TrajectoryRangeError::NotGenerated);
        }
        if !(0.0..=1.0).contains(&fraction) {
            return Err(TrajectoryRangeError::OutOfRange(fraction));
        }
        let s = Self::min_jerk(fraction);
        Ok(self
            .start
            .iter()
            .zip(&self.target)
            .map(|(a, b)| a + (b - a) * s)
            .collect())
    }

    fn step_duration(&self) -> f64 {
        self.duration_s
    }
}
