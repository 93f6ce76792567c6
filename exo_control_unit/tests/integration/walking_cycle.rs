//! Integration test: a scripted operator session through the cycle runner.
//!
//! Validates: Init → Standing → two steps → feet together → sit → stand,
//! driven only by key states, with every drive enabled at the end.

use exo_common::gait::{GaitPhaseId, RobotMode};
use exo_common::robot::{FeedbackSource, RobotConfig};
use exo_control_unit::cycle::CycleRunner;
use exo_control_unit::gait::GaitDispatcher;
use exo_control_unit::input::ScriptedIntent;
use exo_control_unit::robot::Robot;
use exo_control_unit::trajectory::PoseTrajectoryGenerator;
use exo_hal::SimulationTransport;
use proptest::prelude::*;
use std::iter;
use std::time::{Duration, Instant};

use GaitPhaseId::*;

/// Simulated control period. Ticks are stamped, not slept.
const TICK: Duration = Duration::from_millis(10);

const SESSION: &str = r#"
[[steps]]
at_cycle = 1
keys = "s"

[[steps]]
at_cycle = 5
keys = "s"
hold_cycles = 20

[[steps]]
at_cycle = 30
keys = "s"
hold_cycles = 20

[[steps]]
at_cycle = 55
keys = "a"

[[steps]]
at_cycle = 56
keys = "s"
hold_cycles = 20

[[steps]]
at_cycle = 80
keys = "1"

[[steps]]
at_cycle = 81
keys = "s"
hold_cycles = 35

[[steps]]
at_cycle = 120
keys = "2"

[[steps]]
at_cycle = 121
keys = "s"
hold_cycles = 35

[[steps]]
at_cycle = 160
keys = "q"
"#;

fn runner(feedback: FeedbackSource) -> CycleRunner<SimulationTransport> {
    let mut config = RobotConfig::default();
    config.control.feedback = feedback;
    config.trajectory.step_duration_s = 0.1;
    config.trajectory.sit_stand_duration_s = 0.2;

    let robot = Robot::new(&config, SimulationTransport::new()).unwrap();
    let generator = Box::new(PoseTrajectoryGenerator::new(&config.trajectory));
    let script = ScriptedIntent::from_toml(SESSION).unwrap();
    CycleRunner::new(
        GaitDispatcher::new(robot, generator),
        Box::new(script),
        &config.control,
    )
}

/// Run until quit, collecting each distinct phase in order.
fn play(runner: &mut CycleRunner<SimulationTransport>) -> (Vec<GaitPhaseId>, u64) {
    play_ticks(runner, iter::repeat(TICK))
}

/// Same, with the spacing of every tick stamp given by `ticks`.
fn play_ticks(
    runner: &mut CycleRunner<SimulationTransport>,
    ticks: impl IntoIterator<Item = Duration>,
) -> (Vec<GaitPhaseId>, u64) {
    let mut now = Instant::now();
    let mut phases = vec![];
    for tick in ticks.into_iter().take(400) {
        now += tick;
        let report = runner.step(now);
        if phases.last() != Some(&report.phase) {
            phases.push(report.phase);
        }
        if report.quit {
            return (phases, report.cycle);
        }
    }
    panic!("session never quit; reached {phases:?}");
}

const EXPECTED: [GaitPhaseId; 12] = [
    Init,
    Standing,
    SteppingFirstLeft,
    LeftForward,
    SteppingRight,
    RightForward,
    SteppingLastLeft,
    Standing,
    SittingDown,
    Sitting,
    StandingUp,
    Standing,
];

#[test]
fn scripted_session_on_virtual_robot() {
    let mut runner = runner(FeedbackSource::LastCommand);
    let (phases, quit_cycle) = play(&mut runner);

    assert_eq!(phases, EXPECTED);
    assert_eq!(quit_cycle, 160);

    let status = runner.status();
    assert_eq!(status.phase, Standing);
    assert_eq!(status.current_motion, RobotMode::StandUp);
    assert!(status.all_enabled());
    assert_eq!(runner.stats().cycle_count, 161);
}

#[test]
fn scripted_session_with_drive_telemetry() {
    let mut runner = runner(FeedbackSource::Telemetry);
    let (phases, _) = play(&mut runner);
    assert_eq!(phases, EXPECTED);

    // Standing pose read back from the drives.
    let angles = runner.dispatcher().robot().joint_states();
    let standing = [180.0, 0.0, 180.0, 0.0, 90.0, 90.0];
    for (angle, expected) in angles.iter().zip(standing) {
        assert!((angle - expected).abs() < 0.01, "{angle} vs {expected}");
    }
    let (_, rejected) = runner.dispatcher().robot().transport().counters();
    assert_eq!(rejected, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Tick spacing between 8 and 12 ms still clears every motion inside
    /// its held window, so the phase sequence must not change.
    #[test]
    fn jittered_tick_stamps_enter_the_same_phases(
        spacing_us in proptest::collection::vec(8_000u64..=12_000, 400)
    ) {
        let mut runner = runner(FeedbackSource::LastCommand);
        let ticks = spacing_us.into_iter().map(Duration::from_micros);
        let (phases, quit_cycle) = play_ticks(&mut runner, ticks);
        prop_assert_eq!(phases, EXPECTED.to_vec());
        prop_assert_eq!(quit_cycle, 160);
        prop_assert!(runner.status().all_enabled());
    }
}
