//! System-wide constants for the EXO workspace.
//!
//! Single source of truth for all numeric limits and default paths.

use static_assertions::const_assert;

/// Number of actuated joints on the reference exoskeleton.
pub const NUM_JOINTS: usize = 6;

/// Capacity of fixed-size joint-space vectors.
pub const MAX_JOINTS: usize = 8;

const_assert!(NUM_JOINTS <= MAX_JOINTS);

/// Default control tick in microseconds (1 kHz).
pub const CYCLE_TIME_US: u64 = 1000;

/// Status record is published every N ticks by default.
pub const STATUS_INTERVAL_CYCLES: u64 = 500;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/exo/robot.toml";

/// Name of the built-in virtual fieldbus backend.
pub const SIMULATION_TRANSPORT: &str = "simulation";
