//! Configuration loading for the control unit.
//!
//! The robot file is optional: without one the built-in reference robot is
//! used. Command-line overrides are applied before validation so an
//! override can never slip past the checks.

use exo_common::config::{ConfigError, ConfigLoader};
use exo_common::robot::{FeedbackSource, RobotConfig};
use std::path::{Path, PathBuf};
use tracing::info;

// ─── Overrides ──────────────────────────────────────────────────────

/// Settings the command line may force over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub transport: Option<String>,
    pub feedback: Option<FeedbackSource>,
}

impl Overrides {
    pub fn apply(&self, config: &mut RobotConfig) {
        if let Some(transport) = &self.transport {
            config.control.transport = transport.clone();
        }
        if let Some(feedback) = self.feedback {
            config.control.feedback = feedback;
        }
    }
}

// ─── Loaded Config Bundle ───────────────────────────────────────────

/// Validated configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub robot: RobotConfig,
    /// `None` for the built-in reference robot.
    pub source: Option<PathBuf>,
}

/// Load `path` (or the reference robot), apply `overrides`, validate.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<LoadedConfig, ConfigError> {
    let mut robot = match path {
        Some(path) => RobotConfig::load(path)?,
        None => RobotConfig::default(),
    };
    overrides.apply(&mut robot);
    robot.validate()?;

    info!(
        source = path.map_or("built-in".to_string(), |p| p.display().to_string()),
        joints = robot.joints.len(),
        transport = %robot.control.transport,
        cycle_time_us = robot.control.cycle_time_us,
        "configuration loaded"
    );
    Ok(LoadedConfig {
        robot,
        source: path.map(Path::to_path_buf),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn built_in_robot_without_file() {
        let loaded = load_config(None, &Overrides::default()).unwrap();
        assert_eq!(loaded.robot, RobotConfig::default());
        assert!(loaded.source.is_none());
    }

    #[test]
    fn overrides_win_over_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[shared]
service_name = "exo-bench"

[control]
transport = "canopen"
feedback = "telemetry"
"#
        )
        .unwrap();

        let overrides = Overrides {
            transport: Some("simulation".to_string()),
            feedback: Some(FeedbackSource::LastCommand),
        };
        let loaded = load_config(Some(file.path()), &overrides).unwrap();
        assert_eq!(loaded.robot.shared.service_name, "exo-bench");
        assert_eq!(loaded.robot.control.transport, "simulation");
        assert_eq!(loaded.robot.control.feedback, FeedbackSource::LastCommand);
        assert_eq!(loaded.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn invalid_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[control]\ncycle_time_us = 0").unwrap();
        assert!(matches!(
            load_config(Some(file.path()), &Overrides::default()),
            Err(ConfigError::ValidationError(_))
        ));
        assert_eq!(
            load_config(Some(Path::new("/nonexistent/robot.toml")), &Overrides::default())
                .unwrap_err(),
            ConfigError::FileNotFound
        );
    }
}
