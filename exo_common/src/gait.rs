//! Gait enums: motion modes, stance foot and phase identifiers.
//!
//! `RobotMode` is what the operator selects on the crutch; `GaitPhaseId` is
//! the phase the kernel is executing. Both are published in the status record.

use crate::consts::MAX_JOINTS;
use serde::{Deserialize, Serialize};

/// Fixed-capacity joint-space vector in stable joint order [rad].
pub type JointVector = heapless::Vec<f64, MAX_JOINTS>;

/// Motion profile family selectable by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RobotMode {
    NormalWalk = 0,
    SitDown = 1,
    StandUp = 2,
    UpStair = 3,
    DownStair = 4,
    RampUp = 5,
    RampDown = 6,
    TiltUp = 7,
    TiltDown = 8,
    BackStep = 9,
    /// Bring the trailing foot level with the leading one.
    FeetTogether = 10,
    Uneven = 11,
    /// Nothing selected.
    Initial = 12,
}

impl RobotMode {
    /// Modes offered on the operator menu, in menu order.
    pub const MENU: [RobotMode; 12] = [
        Self::NormalWalk,
        Self::SitDown,
        Self::StandUp,
        Self::UpStair,
        Self::DownStair,
        Self::RampUp,
        Self::RampDown,
        Self::TiltUp,
        Self::TiltDown,
        Self::BackStep,
        Self::FeetTogether,
        Self::Uneven,
    ];

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NormalWalk),
            1 => Some(Self::SitDown),
            2 => Some(Self::StandUp),
            3 => Some(Self::UpStair),
            4 => Some(Self::DownStair),
            5 => Some(Self::RampUp),
            6 => Some(Self::RampDown),
            7 => Some(Self::TiltUp),
            8 => Some(Self::TiltDown),
            9 => Some(Self::BackStep),
            10 => Some(Self::FeetTogether),
            11 => Some(Self::Uneven),
            12 => Some(Self::Initial),
            _ => None,
        }
    }

    /// Stepping variants that share the walking phase sequence.
    #[inline]
    pub const fn is_walking(self) -> bool {
        matches!(
            self,
            Self::NormalWalk
                | Self::UpStair
                | Self::DownStair
                | Self::RampUp
                | Self::RampDown
                | Self::TiltUp
                | Self::TiltDown
                | Self::BackStep
                | Self::Uneven
        )
    }

    /// Human readable label for menus and logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::NormalWalk => "Normal Walk",
            Self::SitDown => "Sit Down",
            Self::StandUp => "Stand Up",
            Self::UpStair => "Up Stairs",
            Self::DownStair => "Down Stairs",
            Self::RampUp => "Ramp Up",
            Self::RampDown => "Ramp Down",
            Self::TiltUp => "Tilt Up",
            Self::TiltDown => "Tilt Down",
            Self::BackStep => "Back Step",
            Self::FeetTogether => "Feet Together",
            Self::Uneven => "Uneven Ground",
            Self::Initial => "Initial",
        }
    }
}

impl Default for RobotMode {
    fn default() -> Self {
        Self::Initial
    }
}

/// Foot carrying the body weight during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Foot {
    Left,
    Right,
}

impl Foot {
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Gait phase identifier, exported for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GaitPhaseId {
    Error = 0,
    Init = 1,
    Standing = 2,
    Sitting = 3,
    SittingDown = 4,
    StandingUp = 5,
    SteppingFirstLeft = 6,
    SteppingLeft = 7,
    SteppingRight = 8,
    SteppingLastLeft = 9,
    SteppingLastRight = 10,
    LeftForward = 11,
    RightForward = 12,
    /// Passthrough phase for bench testing: intent is tracked, no motion.
    Test = 13,
}

impl GaitPhaseId {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Error),
            1 => Some(Self::Init),
            2 => Some(Self::Standing),
            3 => Some(Self::Sitting),
            4 => Some(Self::SittingDown),
            5 => Some(Self::StandingUp),
            6 => Some(Self::SteppingFirstLeft),
            7 => Some(Self::SteppingLeft),
            8 => Some(Self::SteppingRight),
            9 => Some(Self::SteppingLastLeft),
            10 => Some(Self::SteppingLastRight),
            11 => Some(Self::LeftForward),
            12 => Some(Self::RightForward),
            13 => Some(Self::Test),
            _ => None,
        }
    }

    /// Display name used in logs and the status record.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Init => "Init",
            Self::Standing => "Standing",
            Self::Sitting => "Sitting",
            Self::SittingDown => "SittingDown",
            Self::StandingUp => "StandingUp",
            Self::SteppingFirstLeft => "SteppingFirstLeft",
            Self::SteppingLeft => "SteppingLeft",
            Self::SteppingRight => "SteppingRight",
            Self::SteppingLastLeft => "SteppingLastLeft",
            Self::SteppingLastRight => "SteppingLastRight",
            Self::LeftForward => "LeftForward",
            Self::RightForward => "RightForward",
            Self::Test => "Test",
        }
    }
}

impl Default for GaitPhaseId {
    fn default() -> Self {
        Self::Init
    }
}

impl std::fmt::Display for GaitPhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_mode_roundtrip_u8() {
        for mode in RobotMode::MENU {
            assert_eq!(RobotMode::from_u8(mode as u8), Some(mode));
        }
        assert_eq!(RobotMode::from_u8(12), Some(RobotMode::Initial));
        assert_eq!(RobotMode::from_u8(13), None);
    }

    #[test]
    fn walking_family() {
        assert!(RobotMode::NormalWalk.is_walking());
        assert!(RobotMode::UpStair.is_walking());
        assert!(!RobotMode::SitDown.is_walking());
        assert!(!RobotMode::FeetTogether.is_walking());
        assert!(!RobotMode::Initial.is_walking());
    }

    #[test]
    fn phase_id_roundtrip_u8() {
        for v in 0..=13u8 {
            let phase = GaitPhaseId::from_u8(v).unwrap();
            assert_eq!(phase as u8, v);
        }
        assert_eq!(GaitPhaseId::from_u8(14), None);
        assert_eq!(GaitPhaseId::SteppingLastRight.to_string(), "SteppingLastRight");
    }

    #[test]
    fn foot_opposite() {
        assert_eq!(Foot::Left.opposite(), Foot::Right);
        assert_eq!(Foot::Right.opposite(), Foot::Left);
    }
}
