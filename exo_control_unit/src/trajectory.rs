//! Trajectory generation and execution.
//!
//! A [`TrajectoryGenerator`] turns a start posture into a time-normalized
//! joint-space path. The [`TrajectoryExecutor`] walks that path in wall-clock
//! time and hands each set point to the robot.

pub mod executor;
pub mod generator;

pub use executor::{ExecutorState, TickOutcome, TrajectoryExecutor};
pub use generator::{Pose, PoseTrajectoryGenerator, TrajectoryGenerator, TrajectoryRangeError};
