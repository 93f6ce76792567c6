//! Integration test: drive failures and operator recovery.
//!
//! Validates: a silent node keeps the robot in `Error` until it answers
//! and the operator resets; a drive fault while holding a posture is
//! cleared by the same reset.

use exo_common::drive::DriveState;
use exo_common::gait::GaitPhaseId;
use exo_common::robot::RobotConfig;
use exo_control_unit::gait::GaitDispatcher;
use exo_control_unit::input::OperatorIntent;
use exo_control_unit::robot::Robot;
use exo_control_unit::trajectory::PoseTrajectoryGenerator;
use exo_hal::SimulationTransport;
use std::time::{Duration, Instant};

use GaitPhaseId::*;

struct Bench {
    dispatcher: GaitDispatcher<SimulationTransport>,
    now: Instant,
}

impl Bench {
    fn new(config: &RobotConfig) -> Self {
        let robot = Robot::new(config, SimulationTransport::new()).unwrap();
        let generator = Box::new(PoseTrajectoryGenerator::new(&config.trajectory));
        Self {
            dispatcher: GaitDispatcher::new(robot, generator),
            now: Instant::now(),
        }
    }

    fn tick(&mut self, intent: OperatorIntent) -> GaitPhaseId {
        self.now += Duration::from_millis(10);
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

    fn reset(&mut self) -> GaitPhaseId {
        self.tick(OperatorIntent {
            reset: true,
            ..Default::default()
        })
    }
}

#[test]
fn silent_node_blocks_until_it_answers() {
    let mut config = RobotConfig::default();
    config.simulation.unacknowledged_nodes = vec![4];
    let mut bench = Bench::new(&config);

    // Bring-up fails on the first tick.
    assert_eq!(bench.idle(), Error);
    // Go is not a way out of Error.
    assert_eq!(bench.go(), Error);
    assert_eq!(bench.idle(), Error);

    // Reset while the node is still silent fails again.
    assert_eq!(bench.reset(), Init);
    assert_eq!(bench.idle(), Error);

    bench
        .dispatcher
        .robot_mut()
        .transport_mut()
        .set_acknowledging(4, true);
    assert_eq!(bench.reset(), Init);
    assert_eq!(bench.idle(), Init);
    assert_eq!(bench.go(), Standing);
    assert!(bench
        .dispatcher
        .robot()
        .joints()
        .iter()
        .all(|j| j.status().drive_state == DriveState::Enabled));
}

#[test]
fn fault_while_standing_needs_reset() {
    let mut bench = Bench::new(&RobotConfig::default());
    bench.idle();
    assert_eq!(bench.go(), Standing);
    bench.idle();

    bench
        .dispatcher
        .robot_mut()
        .transport_mut()
        .inject_fault(1, 0x7300);
    assert_eq!(bench.idle(), Error);
    assert!(bench.dispatcher.robot().has_fault());
    assert_eq!(bench.go(), Error);

    assert_eq!(bench.reset(), Init);
    assert!(!bench.dispatcher.robot().has_fault());
    let node = bench.dispatcher.robot().transport().node(1).unwrap();
    assert_eq!(node.status_word().drive_state(), DriveState::Enabled);

    bench.idle();
    assert_eq!(bench.go(), Standing);
}
