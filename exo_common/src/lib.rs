//! EXO Common Library
//!
//! Shared types, constants and configuration loading for the exoskeleton
//! control workspace. Both the transport backends (`exo_hal`) and the
//! control kernel (`exo_control_unit`) build on these definitions.
//!
//! # Module Structure
//!
//! - [`consts`] - System-wide limits and defaults
//! - [`config`] - Configuration loading traits and types
//! - [`drive`] - CiA 402 drive states, control modes, object dictionary entries
//! - [`gait`] - Motion modes, stance foot and gait phase identifiers
//! - [`robot`] - Robot configuration model (joints, calibration, profile)
//! - [`hal`] - Fieldbus transport contract
//! - [`status`] - Per-tick status record for telemetry rendering
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use exo_common::prelude::*;
//!
//! let config = RobotConfig::default();
//! assert_eq!(config.joints.len(), NUM_JOINTS);
//! ```

pub mod config;
pub mod consts;
pub mod drive;
pub mod gait;
pub mod hal;
pub mod prelude;
pub mod robot;
pub mod status;
