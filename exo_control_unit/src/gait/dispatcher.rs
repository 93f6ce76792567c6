//! Gait dispatcher: the state machine that owns the robot.
//!
//! Each tick refreshes the robot, feeds the operator intent into the
//! context, checks the current phase's exit condition and, when it fires,
//! runs exit → entry. The active phase's `during` runs last.

use super::context::ControlContext;
use super::phase::{self, PhaseContext, PhaseSignal};
use crate::input::OperatorIntent;
use crate::robot::Robot;
use crate::trajectory::{TrajectoryExecutor, TrajectoryGenerator};
use exo_common::gait::{GaitPhaseId, RobotMode};
use exo_common::hal::transport::Transport;
use exo_common::status::TickStatus;
use std::time::Instant;
use tracing::{info, warn};

/// Inputs that may move the dispatcher between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaitEvent {
    /// Go from Init.
    Start,
    /// Go from a holding phase with the selected motion.
    Go(RobotMode),
    TrajectoryComplete,
    Fault,
    Reset,
    TestMode,
}

/// Transition table. `None` means the event is ignored in `from`.
///
/// A fault mid-step falls back to bringing the feet together; anywhere
/// else it ends in `Error`.
pub fn next_phase(from: GaitPhaseId, event: GaitEvent) -> Option<GaitPhaseId> {
    use GaitPhaseId::*;
    match (from, event) {
        (Error, GaitEvent::Fault) => None,
        (SteppingFirstLeft | SteppingLeft, GaitEvent::Fault) => Some(SteppingLastRight),
        (SteppingRight, GaitEvent::Fault) => Some(SteppingLastLeft),
        (_, GaitEvent::Fault) => Some(Error),

        (Error | Test, GaitEvent::Reset) => Some(Init),
        (Init, GaitEvent::Start) => Some(Standing),
        (Init, GaitEvent::TestMode) => Some(Test),

        (Standing, GaitEvent::Go(mode)) if mode.is_walking() => Some(SteppingFirstLeft),
        (Standing, GaitEvent::Go(RobotMode::SitDown)) => Some(SittingDown),
        (Sitting, GaitEvent::Go(RobotMode::StandUp)) => Some(StandingUp),
        (LeftForward, GaitEvent::Go(mode)) if mode.is_walking() => Some(SteppingRight),
        (LeftForward, GaitEvent::Go(RobotMode::FeetTogether)) => Some(SteppingLastRight),
        (RightForward, GaitEvent::Go(mode)) if mode.is_walking() => Some(SteppingLeft),
        (RightForward, GaitEvent::Go(RobotMode::FeetTogether)) => Some(SteppingLastLeft),

        (SittingDown, GaitEvent::TrajectoryComplete) => Some(Sitting),
        (StandingUp, GaitEvent::TrajectoryComplete) => Some(Standing),
        (SteppingFirstLeft | SteppingLeft, GaitEvent::TrajectoryComplete) => Some(LeftForward),
        (SteppingRight, GaitEvent::TrajectoryComplete) => Some(RightForward),
        (SteppingLastLeft | SteppingLastRight, GaitEvent::TrajectoryComplete) => Some(Standing),

        _ => None,
    }
}

pub struct GaitDispatcher<T: Transport = Box<dyn Transport>> {
    robot: Robot<T>,
    generator: Box<dyn TrajectoryGenerator>,
    executor: TrajectoryExecutor,
    context: ControlContext,
    phase: GaitPhaseId,
    signal: PhaseSignal,
    started: bool,
    transitions: u64,
}

impl<T: Transport> GaitDispatcher<T> {
    pub fn new(robot: Robot<T>, generator: Box<dyn TrajectoryGenerator>) -> Self {
        Self {
            robot,
            generator,
            executor: TrajectoryExecutor::new(),
            context: ControlContext::default(),
            phase: GaitPhaseId::Init,
            signal: PhaseSignal::Idle,
            started: false,
            transitions: 0,
        }
    }

    #[inline]
    pub fn phase(&self) -> GaitPhaseId {
        self.phase
    }

    pub fn context(&self) -> &ControlContext {
        &self.context
    }

    pub fn robot(&self) -> &Robot<T> {
        &self.robot
    }

    pub fn robot_mut(&mut self) -> &mut Robot<T> {
        &mut self.robot
    }

    pub fn executor(&self) -> &TrajectoryExecutor {
        &self.executor
    }

    /// Phase changes since start.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    fn phase_context(&mut self, now: Instant) -> PhaseContext<'_, T> {
        PhaseContext {
            robot: &mut self.robot,
            generator: self.generator.as_mut(),
            executor: &mut self.executor,
            control: &mut self.context,
            now,
        }
    }

    /// Exit condition of the current phase.
    fn pending_event(&self) -> Option<GaitEvent> {
        let ctx = &self.context;
        match self.phase {
            GaitPhaseId::Init => {
                if self.signal == PhaseSignal::Fault {
                    Some(GaitEvent::Fault)
                } else if ctx.test_requested {
                    Some(GaitEvent::TestMode)
                } else if ctx.go_triggered() {
                    Some(GaitEvent::Start)
                } else {
                    None
                }
            }
            GaitPhaseId::Error => ctx.reset_requested.then_some(GaitEvent::Reset),
            _ if self.robot.has_fault() => Some(GaitEvent::Fault),
            GaitPhaseId::Test => ctx.reset_requested.then_some(GaitEvent::Reset),
            GaitPhaseId::Standing
            | GaitPhaseId::Sitting
            | GaitPhaseId::LeftForward
            | GaitPhaseId::RightForward => ctx
                .go_triggered()
                .then_some(GaitEvent::Go(ctx.next_motion)),
            _ => match self.signal {
                PhaseSignal::Complete => Some(GaitEvent::TrajectoryComplete),
                PhaseSignal::Fault => Some(GaitEvent::Fault),
                PhaseSignal::Idle => None,
            },
        }
    }

    fn transition(&mut self, next: GaitPhaseId, event: GaitEvent, now: Instant) {
        let from = self.phase;
        match event {
            // Arriving somewhere with go still held must not chain motions.
            GaitEvent::Start | GaitEvent::TrajectoryComplete => self.context.consume_go(),
            GaitEvent::Go(mode) => {
                self.context.consume_go();
                self.context.current_motion = mode;
            }
            GaitEvent::Fault => warn!(from = from.name(), to = next.name(), "fault transition"),
            _ => {}
        }

        let mut cx = self.phase_context(now);
        phase::exit(from, &mut cx);
        let signal = phase::entry(next, &mut cx);
        self.phase = next;
        self.signal = signal;
        self.transitions += 1;
        info!(from = from.name(), to = next.name(), ?event, "phase transition");
    }

    /// Run one control tick at time `now`.
    pub fn tick(&mut self, intent: &OperatorIntent, now: Instant) -> GaitPhaseId {
        if !self.started {
            self.started = true;
            let mut cx = self.phase_context(now);
            self.signal = phase::entry(GaitPhaseId::Init, &mut cx);
        }

        self.robot.update_robot();
        self.context.apply_intent(intent);

        if let Some(event) = self.pending_event() {
            match next_phase(self.phase, event) {
                Some(next) => self.transition(next, event, now),
                None => {
                    if !matches!(event, GaitEvent::Go(_)) {
                        warn!(phase = self.phase.name(), ?event, "event ignored");
                    }
                }
            }
        }

        let phase = self.phase;
        let mut cx = self.phase_context(now);
        let signal = phase::during(phase, &mut cx);
        if signal != PhaseSignal::Idle {
            self.signal = signal;
        }

        self.context.rearm();
        self.phase
    }

    /// Snapshot for the status record.
    pub fn status(&self, cycle: u64, overrun: bool) -> TickStatus {
        TickStatus {
            cycle,
            phase: self.phase,
            current_motion: self.context.current_motion,
            next_motion: self.context.next_motion,
            trajectory_fraction: self.executor.fraction(),
            joints: self.robot.joint_statuses(),
            overrun,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::PoseTrajectoryGenerator;
    use exo_common::robot::{FeedbackSource, RobotConfig};
    use exo_hal::SimulationTransport;
    use std::time::Duration;
    use GaitPhaseId::*;

    const TICK: Duration = Duration::from_millis(10);

    struct Harness {
        dispatcher: GaitDispatcher<SimulationTransport>,
        now: Instant,
    }

    impl Harness {
        fn new(feedback: FeedbackSource) -> Self {
            let mut config = RobotConfig::default();
            config.control.feedback = feedback;
            config.trajectory.step_duration_s = 0.1;
            config.trajectory.sit_stand_duration_s = 0.2;
            let robot = Robot::new(&config, SimulationTransport::new()).unwrap();
            let generator = Box::new(PoseTrajectoryGenerator::new(&config.trajectory));
            Self {
                dispatcher: GaitDispatcher::new(robot, generator),
                now: Instant::now(),
            }
        }

        fn tick(&mut self, intent: OperatorIntent) -> GaitPhaseId {
            self.now += TICK;
            self.dispatcher.tick(&intent, self.now)
        }

        fn idle(&mut self) -> GaitPhaseId {
            self.tick(OperatorIntent::default())
        }

        fn go(&mut self) -> GaitPhaseId {
            self.tick(OperatorIntent {
                go: true,
                ..Default::default()
            })
        }

        fn select(&mut self, mode: RobotMode) -> GaitPhaseId {
            self.tick(OperatorIntent {
                selected: Some(mode),
                ..Default::default()
            })
        }

        /// Hold go until the phase changes away from `phase`.
        fn hold_go_through(&mut self, phase: GaitPhaseId) -> GaitPhaseId {
            for _ in 0..100 {
                let now = self.go();
                if now != phase {
                    return now;
                }
            }
            panic!("stuck in {phase:?}");
        }
    }

    #[test]
    fn transition_table_examples() {
        assert_eq!(next_phase(Init, GaitEvent::Start), Some(Standing));
        assert_eq!(
            next_phase(Standing, GaitEvent::Go(RobotMode::NormalWalk)),
            Some(SteppingFirstLeft)
        );
        assert_eq!(next_phase(Standing, GaitEvent::Go(RobotMode::StandUp)), None);
        assert_eq!(
            next_phase(LeftForward, GaitEvent::Go(RobotMode::FeetTogether)),
            Some(SteppingLastRight)
        );
        assert_eq!(
            next_phase(SteppingLastRight, GaitEvent::TrajectoryComplete),
            Some(Standing)
        );
        assert_eq!(next_phase(SteppingLeft, GaitEvent::Fault), Some(SteppingLastRight));
        assert_eq!(next_phase(SteppingRight, GaitEvent::Fault), Some(SteppingLastLeft));
        assert_eq!(next_phase(SteppingLastLeft, GaitEvent::Fault), Some(Error));
        assert_eq!(next_phase(Error, GaitEvent::Fault), None);
        assert_eq!(next_phase(Error, GaitEvent::Reset), Some(Init));
        assert_eq!(next_phase(Standing, GaitEvent::Reset), None);
        assert_eq!(next_phase(Init, GaitEvent::TestMode), Some(Test));
    }

    #[test]
    fn first_tick_initialises_and_waits() {
        let mut h = Harness::new(FeedbackSource::Telemetry);
        assert_eq!(h.go(), Init);
        assert_eq!(h.idle(), Init);
        assert!(h.dispatcher.status(1, false).all_enabled());
        assert_eq!(h.dispatcher.context().current_motion, RobotMode::NormalWalk);
        assert_eq!(h.go(), Standing);
        // Still held: no second motion.
        assert_eq!(h.go(), Standing);
    }

    #[test]
    fn waiting_phases_track_the_selected_motion() {
        let mut h = Harness::new(FeedbackSource::LastCommand);
        assert_eq!(h.select(RobotMode::SitDown), Init);
        assert_eq!(h.dispatcher.context().current_motion, RobotMode::SitDown);
        assert_eq!(h.idle(), Init);
        assert_eq!(h.dispatcher.context().current_motion, RobotMode::SitDown);

        assert_eq!(h.go(), Standing);
        h.select(RobotMode::UpStair);
        let status = h.dispatcher.status(0, false);
        assert_eq!(status.current_motion, RobotMode::UpStair);
        assert_eq!(status.next_motion, RobotMode::UpStair);

        h.select(RobotMode::SitDown);
        assert_eq!(h.go(), SittingDown);
        // A selection during a motion waits for the next holding phase.
        h.tick(OperatorIntent {
            go: true,
            selected: Some(RobotMode::StandUp),
            ..Default::default()
        });
        assert_eq!(h.dispatcher.context().current_motion, RobotMode::SitDown);
        assert_eq!(h.hold_go_through(SittingDown), Sitting);
        assert_eq!(h.dispatcher.context().current_motion, RobotMode::StandUp);
    }

    #[test]
    fn walk_cycle_and_feet_together() {
        let mut h = Harness::new(FeedbackSource::LastCommand);
        h.idle();
        assert_eq!(h.go(), Standing);
        h.idle();

        assert_eq!(h.go(), SteppingFirstLeft);
        assert_eq!(h.hold_go_through(SteppingFirstLeft), LeftForward);
        h.idle();
        assert_eq!(h.go(), SteppingRight);
        assert_eq!(h.hold_go_through(SteppingRight), RightForward);

        h.select(RobotMode::FeetTogether);
        assert_eq!(h.go(), SteppingLastLeft);
        assert_eq!(h.hold_go_through(SteppingLastLeft), Standing);
        let status = h.dispatcher.status(0, false);
        assert_eq!(status.current_motion, RobotMode::FeetTogether);
        assert_eq!(status.trajectory_fraction, None);
    }

    #[test]
    fn released_go_pauses_motion() {
        let mut h = Harness::new(FeedbackSource::LastCommand);
        h.idle();
        h.go();
        h.idle();
        assert_eq!(h.go(), SteppingFirstLeft);
        let paused = h.dispatcher.executor().progress();
        for _ in 0..50 {
            assert_eq!(h.idle(), SteppingFirstLeft);
        }
        assert_eq!(h.dispatcher.executor().progress(), paused);
        assert_eq!(h.hold_go_through(SteppingFirstLeft), LeftForward);
        // Released and pressed mid-motion, but still held on arrival.
        assert_eq!(h.go(), LeftForward);
    }

    #[test]
    fn sit_and_stand() {
        let mut h = Harness::new(FeedbackSource::LastCommand);
        h.idle();
        h.go();
        h.select(RobotMode::SitDown);
        assert_eq!(h.go(), SittingDown);
        assert_eq!(h.hold_go_through(SittingDown), Sitting);
        // Walking is not offered while seated.
        h.select(RobotMode::NormalWalk);
        assert_eq!(h.go(), Sitting);
        h.select(RobotMode::StandUp);
        assert_eq!(h.go(), StandingUp);
        assert_eq!(h.hold_go_through(StandingUp), Standing);
    }

    #[test]
    fn drive_fault_mid_step_recovers_through_reset() {
        let mut h = Harness::new(FeedbackSource::Telemetry);
        h.idle();
        h.go();
        h.idle();
        assert_eq!(h.go(), SteppingFirstLeft);

        h.dispatcher.robot_mut().transport_mut().inject_fault(2, 0x2310);
        assert_eq!(h.go(), SteppingLastRight);
        assert_eq!(h.go(), Error);
        assert_eq!(h.idle(), Error);

        assert_eq!(
            h.tick(OperatorIntent {
                reset: true,
                ..Default::default()
            }),
            Init
        );
        assert!(!h.dispatcher.robot().has_fault());
        assert_eq!(h.go(), Standing);
    }

    #[test]
    fn failed_initialisation_goes_to_error() {
        let mut config = RobotConfig::default();
        config.simulation.unacknowledged_nodes = vec![4];
        let robot = Robot::new(&config, SimulationTransport::new()).unwrap();
        let generator = Box::new(PoseTrajectoryGenerator::new(&config.trajectory));
        let mut dispatcher = GaitDispatcher::new(robot, generator);
        let now = Instant::now();
        assert_eq!(dispatcher.tick(&OperatorIntent::default(), now), Error);
        assert_eq!(dispatcher.tick(&OperatorIntent::default(), now + TICK), Error);
        assert_eq!(dispatcher.transitions(), 1);
    }

    #[test]
    fn test_phase_round_trip() {
        let mut h = Harness::new(FeedbackSource::LastCommand);
        h.idle();
        assert_eq!(
            h.tick(OperatorIntent {
                test: true,
                ..Default::default()
            }),
            Test
        );
        assert_eq!(h.go(), Test);
        assert_eq!(
            h.tick(OperatorIntent {
                reset: true,
                ..Default::default()
            }),
            Init
        );
        assert_eq!(h.dispatcher.transitions(), 2);
    }
}
