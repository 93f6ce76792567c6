//! Phase behaviors: what each gait phase does on entry, every tick and on
//! exit.
//!
//! Phases fall into five kinds. Holding phases keep the last posture and
//! wait for the operator; motion phases run one trajectory to its end.

use super::context::ControlContext;
use crate::robot::Robot;
use crate::trajectory::{Pose, TickOutcome, TrajectoryExecutor, TrajectoryGenerator};
use exo_common::gait::{Foot, GaitPhaseId, RobotMode};
use exo_common::hal::transport::Transport;
use exo_common::robot::FeedbackSource;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Init,
    /// Static posture, waiting for go.
    Holding,
    /// One trajectory towards the next posture.
    Motion {
        mode: RobotMode,
        /// Foot carrying weight during the motion.
        stance: Option<Foot>,
    },
    Test,
    Error,
}

impl PhaseKind {
    pub fn of(phase: GaitPhaseId, ctx: &ControlContext) -> Self {
        use GaitPhaseId::*;
        match phase {
            Init => Self::Init,
            Standing | Sitting | LeftForward | RightForward => Self::Holding,
            SittingDown => Self::Motion {
                mode: RobotMode::SitDown,
                stance: None,
            },
            StandingUp => Self::Motion {
                mode: RobotMode::StandUp,
                stance: None,
            },
            SteppingFirstLeft | SteppingLeft => Self::Motion {
                mode: ctx.current_motion,
                stance: Some(Foot::Right),
            },
            SteppingRight => Self::Motion {
                mode: ctx.current_motion,
                stance: Some(Foot::Left),
            },
            SteppingLastLeft => Self::Motion {
                mode: RobotMode::FeetTogether,
                stance: Some(Foot::Right),
            },
            SteppingLastRight => Self::Motion {
                mode: RobotMode::FeetTogether,
                stance: Some(Foot::Left),
            },
            Test => Self::Test,
            Error => Self::Error,
        }
    }
}

/// What a phase reports back to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseSignal {
    #[default]
    Idle,
    /// Trajectory ran to its end.
    Complete,
    Fault,
}

/// Everything a phase may touch during one call.
pub struct PhaseContext<'a, T: Transport> {
    pub robot: &'a mut Robot<T>,
    pub generator: &'a mut dyn TrajectoryGenerator,
    pub executor: &'a mut TrajectoryExecutor,
    pub control: &'a mut ControlContext,
    pub now: Instant,
}

pub fn entry<T: Transport>(phase: GaitPhaseId, cx: &mut PhaseContext<'_, T>) -> PhaseSignal {
    match PhaseKind::of(phase, cx.control) {
        PhaseKind::Init => {
            cx.executor.stop();
            cx.generator.set_pilot_parameters(cx.robot.pilot());
            cx.control.current_motion = RobotMode::NormalWalk;
            cx.control.next_motion = RobotMode::NormalWalk;

            let network = cx.robot.initialise_network();
            let control = cx.robot.init_position_control();
            if cx.robot.feedback() == FeedbackSource::LastCommand {
                cx.robot.set_pose(&Pose::Standing.degrees());
            }
            if network && control {
                info!("initialised, waiting for go");
                PhaseSignal::Idle
            } else {
                error!(network, control, "initialisation failed");
                PhaseSignal::Fault
            }
        }
        PhaseKind::Holding => {
            info!(phase = phase.name(), next = cx.control.next_motion.label(), "holding");
            PhaseSignal::Idle
        }
        PhaseKind::Motion { mode, stance } => {
            cx.control.consume_go();
            cx.generator.initialise_trajectory(mode, stance);
            cx.executor.start_new_traj(cx.robot, cx.generator, cx.now);
            info!(phase = phase.name(), mode = mode.label(), ?stance, "motion started");
            PhaseSignal::Idle
        }
        PhaseKind::Test => {
            info!("test phase: drives held, intent tracked only");
            PhaseSignal::Idle
        }
        PhaseKind::Error => {
            cx.executor.stop();
            for joint in cx.robot.joints() {
                let status = joint.status();
                warn!(
                    joint = %status.name,
                    state = ?status.drive_state,
                    mode = ?status.control_mode,
                    status_word = status.status_word,
                    "error phase"
                );
            }
            PhaseSignal::Idle
        }
    }
}

/// Motion phases advance their trajectory; waiting phases adopt the
/// operator's selection as the current motion.
pub fn during<T: Transport>(phase: GaitPhaseId, cx: &mut PhaseContext<'_, T>) -> PhaseSignal {
    match PhaseKind::of(phase, cx.control) {
        PhaseKind::Motion { .. } => {
            let outcome = cx.executor.move_through_traj(
                cx.robot,
                cx.generator,
                cx.control.go,
                cx.now,
            );
            signal_for(&outcome)
        }
        PhaseKind::Init | PhaseKind::Holding | PhaseKind::Test => {
            cx.control.track_selection();
            PhaseSignal::Idle
        }
        PhaseKind::Error => PhaseSignal::Idle,
    }
}

pub fn exit<T: Transport>(phase: GaitPhaseId, cx: &mut PhaseContext<'_, T>) {
    if let PhaseKind::Motion { .. } = PhaseKind::of(phase, cx.control) {
        cx.executor.stop();
    }
    if phase == GaitPhaseId::SittingDown {
        let angles: Vec<f64> = cx.robot.joints().iter().map(|j| j.q()).collect();
        info!(?angles, "seated posture");
    }
}

fn signal_for(outcome: &TickOutcome) -> PhaseSignal {
    if outcome.is_complete() {
        PhaseSignal::Complete
    } else if outcome.is_ok() {
        PhaseSignal::Idle
    } else {
        warn!(?outcome, "trajectory tick failed");
        PhaseSignal::Fault
    }
}
