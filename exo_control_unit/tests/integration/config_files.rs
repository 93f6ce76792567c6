//! Integration test: the shipped configuration files.
//!
//! Validates: `config/robot.toml` loads and describes the reference robot;
//! `config/scenario_walk.toml` parses and holds go for whole motions.

use exo_common::robot::{FeedbackSource, RobotConfig};
use exo_control_unit::config::{Overrides, load_config};
use exo_control_unit::input::{IntentSource, ScriptedIntent};
use std::path::PathBuf;

fn repo_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("config")
        .join(name)
}

#[test]
fn robot_file_is_the_reference_robot() {
    let path = repo_file("robot.toml");
    let loaded = load_config(Some(path.as_path()), &Overrides::default()).unwrap();
    assert_eq!(loaded.robot, RobotConfig::default());
}

#[test]
fn robot_file_accepts_command_line_overrides() {
    let overrides = Overrides {
        transport: None,
        feedback: Some(FeedbackSource::LastCommand),
    };
    let path = repo_file("robot.toml");
    let loaded = load_config(Some(path.as_path()), &overrides).unwrap();
    assert_eq!(loaded.robot.control.feedback, FeedbackSource::LastCommand);
    assert_eq!(loaded.robot.joints.len(), 6);
}

#[test]
fn walk_scenario_holds_go_through_each_motion() {
    let mut script = ScriptedIntent::load(&repo_file("scenario_walk.toml")).unwrap();

    assert!(script.poll(100).go);
    assert!(!script.poll(101).go);

    assert!(script.poll(1000).go);
    assert!(script.poll(3499).go);
    assert!(!script.poll(3500).go);

    assert!(script.poll(21500).quit);
    assert!(!script.poll(21501).quit);
}
