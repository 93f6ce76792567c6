//! Time-driven trajectory execution.
//!
//! Progress is accumulated from per-tick deltas rather than measured from
//! the start, so pausing (go released) freezes the motion exactly where it
//! was and resuming continues from there.

use super::generator::{TrajectoryGenerator, TrajectoryRangeError};
use crate::joint::MovementResult;
use crate::robot::Robot;
use exo_common::consts::MAX_JOINTS;
use exo_common::gait::JointVector;
use exo_common::hal::transport::Transport;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorState {
    #[default]
    Idle,
    Running,
}

/// Result of one execution tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No trajectory started.
    Idle,
    /// Go not asserted; time passed without progress.
    Disarmed,
    /// Set points were sent to every joint.
    Dispatched {
        fraction: f64,
        results: heapless::Vec<MovementResult, MAX_JOINTS>,
    },
    /// The generator rejected the fraction; nothing was sent.
    OutOfRange { fraction: f64 },
}

impl TickOutcome {
    /// No joint refused a command and the generator had a set point.
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Idle | Self::Disarmed => true,
            Self::Dispatched { results, .. } => results.iter().all(|r| r.is_success()),
            Self::OutOfRange { .. } => false,
        }
    }

    /// The trajectory ran past its end.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::OutOfRange { fraction } if *fraction > 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrajectoryExecutor {
    state: ExecutorState,
    last_tick: Option<Instant>,
    progress: Duration,
    duration_s: f64,
}

impl TrajectoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Time accumulated along the current trajectory.
    pub fn progress(&self) -> Duration {
        self.progress
    }

    /// Current normalized progress, `None` while idle.
    pub fn fraction(&self) -> Option<f64> {
        match self.state {
            ExecutorState::Idle => None,
            ExecutorState::Running => Some(self.progress.as_secs_f64() / self.duration_s),
        }
    }

    /// Capture the robot's posture, have `generator` build a path from it
    /// and restart the clock at `now`.
    pub fn start_new_traj<T: Transport>(
        &mut self,
        robot: &Robot<T>,
        generator: &mut dyn TrajectoryGenerator,
        now: Instant,
    ) {
        let start: JointVector = robot
            .joint_states()
            .iter()
            .map(|deg| deg.to_radians())
            .collect();
        generator.generate_and_save_spline(&start);
        self.duration_s = generator.step_duration();
        self.progress = Duration::ZERO;
        self.last_tick = Some(now);
        self.state = ExecutorState::Running;
        debug!(duration_s = self.duration_s, "trajectory started");
    }

    /// Advance by the time since the previous tick and command the set
    /// point at the new progress.
    ///
    /// While `armed` is false the reference time still moves on, so the
    /// paused interval never counts as progress.
    pub fn move_through_traj<T: Transport>(
        &mut self,
        robot: &mut Robot<T>,
        generator: &dyn TrajectoryGenerator,
        armed: bool,
        now: Instant,
    ) -> TickOutcome {
        if self.state == ExecutorState::Idle {
            return TickOutcome::Idle;
        }
        let elapsed = self
            .last_tick
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_tick = Some(now);
        if !armed {
            return TickOutcome::Disarmed;
        }

        self.progress += elapsed;
        let fraction = self.progress.as_secs_f64() / self.duration_s;
        let set_point = match generator.set_point(fraction) {
            Ok(set_point) => set_point,
            Err(TrajectoryRangeError::OutOfRange(_)) if fraction > 1.0 => {
                debug!(fraction, "trajectory finished");
                return TickOutcome::OutOfRange { fraction };
            }
            Err(e) => {
                warn!(fraction, error = %e, "trajectory set point unavailable");
                return TickOutcome::OutOfRange { fraction };
            }
        };

        if set_point.len() != robot.num_joints() {
            warn!(
                set_points = set_point.len(),
                joints = robot.num_joints(),
                "set point does not cover every joint"
            );
        }
        // Every joint gets its command even if an earlier one failed.
        let mut results = heapless::Vec::new();
        for index in 0..robot.num_joints() {
            let result = match set_point.get(index) {
                Some(q) => robot.set_position(index, q.to_degrees()),
                None => MovementResult::Unknown,
            };
            let _ = results.push(result);
        }
        TickOutcome::Dispatched { fraction, results }
    }

    /// Drop the current trajectory.
    pub fn stop(&mut self) {
        self.state = ExecutorState::Idle;
        self.last_tick = None;
    }
}
