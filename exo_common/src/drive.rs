//! CiA 402 drive definitions shared by the control kernel and transports.
//!
//! Enums use `#[repr]` discriminants so they can be exported verbatim in the
//! status record. The status/control word layouts follow the CiA 402 device
//! profile as implemented by the Copley and Schneider drives on the robot.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Fieldbus node address of a drive (1..=127).
pub type NodeId = u8;

// ─── Drive State ────────────────────────────────────────────────────

/// Coarse drive lifecycle state.
///
/// `Disabled` → `ReadyToSwitchOn` → `Enabled`. Any state may drop back to
/// `Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum DriveState {
    /// Power stage off, control word cleared.
    #[default]
    Disabled = 0,
    /// Shutdown command acknowledged, waiting for enable.
    ReadyToSwitchOn = 1,
    /// Operation enabled; setpoints are followed.
    Enabled = 2,
}

// ─── Control Mode ───────────────────────────────────────────────────

/// Control mode the drive is configured for.
///
/// Only `Position`, `Velocity` and `Torque` are "configured" modes; they are
/// valid exclusively while the drive is `Enabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i8)]
pub enum ControlMode {
    #[default]
    Unconfigured = 0,
    Position = 1,
    Velocity = 2,
    Torque = 3,
    /// Last configuration batch was not acknowledged.
    Error = -1,
}

impl ControlMode {
    /// Whether this is one of the three motion modes.
    #[inline]
    pub const fn is_configured(self) -> bool {
        matches!(self, Self::Position | Self::Velocity | Self::Torque)
    }

    /// Value written to "modes of operation" (0x6060) for this mode.
    #[inline]
    pub const fn mode_of_operation(self) -> Option<i8> {
        match self {
            Self::Position => Some(1),
            Self::Velocity => Some(3),
            Self::Torque => Some(4),
            Self::Unconfigured | Self::Error => None,
        }
    }

    /// Motion mode selected by a raw 0x6060 value.
    pub fn from_mode_of_operation(value: i8) -> Option<Self> {
        [Self::Position, Self::Velocity, Self::Torque]
            .into_iter()
            .find(|mode| mode.mode_of_operation() == Some(value))
    }
}

// ─── Object Dictionary ──────────────────────────────────────────────

/// Object dictionary data types used in service-data commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
}

impl DataType {
    /// Token used on the command line.
    pub const fn token(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "i8" => Some(Self::I8),
            "u8" => Some(Self::U8),
            "i16" => Some(Self::I16),
            "u16" => Some(Self::U16),
            "i32" => Some(Self::I32),
            "u32" => Some(Self::U32),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32)
    }

    /// Whether `value` is representable in this type.
    pub const fn fits(self, value: i64) -> bool {
        let (min, max) = match self {
            Self::I8 => (i8::MIN as i64, i8::MAX as i64),
            Self::U8 => (0, u8::MAX as i64),
            Self::I16 => (i16::MIN as i64, i16::MAX as i64),
            Self::U16 => (0, u16::MAX as i64),
            Self::I32 => (i32::MIN as i64, i32::MAX as i64),
            Self::U32 => (0, u32::MAX as i64),
        };
        value >= min && value <= max
    }
}

/// Object dictionary entries used by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectEntry {
    ControlWord,
    StatusWord,
    ErrorCode,
    ModesOfOperation,
    ActualPosition,
    ActualVelocity,
    ActualTorque,
    TargetPosition,
    TargetVelocity,
    TargetTorque,
    ProfileVelocity,
    ProfileAcceleration,
    ProfileDeceleration,
}

impl ObjectEntry {
    /// Object dictionary index.
    pub const fn index(self) -> u16 {
        match self {
            Self::ControlWord => 0x6040,
            Self::StatusWord => 0x6041,
            Self::ErrorCode => 0x603F,
            Self::ModesOfOperation => 0x6060,
            Self::ActualPosition => 0x6064,
            Self::ActualVelocity => 0x606C,
            Self::ActualTorque => 0x6077,
            Self::TargetPosition => 0x607A,
            Self::TargetVelocity => 0x60FF,
            Self::TargetTorque => 0x6071,
            Self::ProfileVelocity => 0x6081,
            Self::ProfileAcceleration => 0x6083,
            Self::ProfileDeceleration => 0x6084,
        }
    }

    /// Data length in bits, as used in PDO mapping records.
    pub const fn bit_length(self) -> u8 {
        match self {
            Self::ModesOfOperation => 8,
            Self::ControlWord
            | Self::StatusWord
            | Self::ErrorCode
            | Self::ActualTorque
            | Self::TargetTorque => 16,
            Self::ActualPosition
            | Self::ActualVelocity
            | Self::TargetPosition
            | Self::TargetVelocity
            | Self::ProfileVelocity
            | Self::ProfileAcceleration
            | Self::ProfileDeceleration => 32,
        }
    }

    /// Data type of this entry.
    pub const fn data_type(self) -> DataType {
        match self {
            Self::ModesOfOperation => DataType::I8,
            Self::ControlWord | Self::StatusWord | Self::ErrorCode => DataType::U16,
            Self::ActualTorque | Self::TargetTorque => DataType::I16,
            Self::ActualPosition
            | Self::ActualVelocity
            | Self::TargetPosition
            | Self::TargetVelocity => DataType::I32,
            Self::ProfileVelocity | Self::ProfileAcceleration | Self::ProfileDeceleration => {
                DataType::U32
            }
        }
    }

    /// 32-bit PDO mapping record: index (16) | subindex (8) | length (8).
    pub const fn mapping_record(self) -> u32 {
        ((self.index() as u32) << 16) | (self.bit_length() as u32)
    }

    /// Reverse lookup from an object dictionary index.
    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0x6040 => Some(Self::ControlWord),
            0x6041 => Some(Self::StatusWord),
            0x603F => Some(Self::ErrorCode),
            0x6060 => Some(Self::ModesOfOperation),
            0x6064 => Some(Self::ActualPosition),
            0x606C => Some(Self::ActualVelocity),
            0x6077 => Some(Self::ActualTorque),
            0x607A => Some(Self::TargetPosition),
            0x60FF => Some(Self::TargetVelocity),
            0x6071 => Some(Self::TargetTorque),
            0x6081 => Some(Self::ProfileVelocity),
            0x6083 => Some(Self::ProfileAcceleration),
            0x6084 => Some(Self::ProfileDeceleration),
            _ => None,
        }
    }
}

// ─── Status / Control Words ─────────────────────────────────────────

bitflags! {
    /// CiA 402 status word (0x6041).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusWord: u16 {
        const READY_TO_SWITCH_ON = 0x0001;
        const SWITCHED_ON        = 0x0002;
        const OPERATION_ENABLED  = 0x0004;
        const FAULT              = 0x0008;
        const VOLTAGE_ENABLED    = 0x0010;
        const QUICK_STOP         = 0x0020;
        const SWITCH_ON_DISABLED = 0x0040;
        const WARNING            = 0x0080;
        const REMOTE             = 0x0200;
        const TARGET_REACHED     = 0x0400;
        /// Profile position mode: set point acknowledged.
        const SET_POINT_ACK      = 0x1000;
    }
}

impl StatusWord {
    /// Bits that identify the CiA 402 state.
    const STATE_MASK: u16 = 0x006F;

    /// Map the state bits onto the coarse [`DriveState`].
    ///
    /// "Ready to switch on" and "switched on" both map to `ReadyToSwitchOn`;
    /// everything that is not "operation enabled" or one of those is `Disabled`.
    pub const fn drive_state(self) -> DriveState {
        match self.bits() & Self::STATE_MASK {
            0x0027 => DriveState::Enabled,
            0x0021 | 0x0023 => DriveState::ReadyToSwitchOn,
            _ => DriveState::Disabled,
        }
    }

    #[inline]
    pub const fn is_fault(self) -> bool {
        self.contains(Self::FAULT)
    }
}

impl Default for StatusWord {
    fn default() -> Self {
        Self::SWITCH_ON_DISABLED
    }
}

bitflags! {
    /// CiA 402 control word (0x6040).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlWord: u16 {
        const SWITCH_ON              = 0x0001;
        const ENABLE_VOLTAGE         = 0x0002;
        const QUICK_STOP             = 0x0004;
        const ENABLE_OPERATION       = 0x0008;
        /// Profile position mode: latch a new set point on 0 → 1.
        const NEW_SET_POINT          = 0x0010;
        /// Profile position mode: apply new set points immediately.
        const CHANGE_SET_IMMEDIATELY = 0x0020;
        const FAULT_RESET            = 0x0080;
        const HALT                   = 0x0100;

        /// "Shutdown" command: → ready to switch on.
        const SHUTDOWN = Self::ENABLE_VOLTAGE.bits() | Self::QUICK_STOP.bits();
        /// "Enable operation" command: → operation enabled.
        const ENABLE = Self::SWITCH_ON.bits()
            | Self::ENABLE_VOLTAGE.bits()
            | Self::QUICK_STOP.bits()
            | Self::ENABLE_OPERATION.bits();
    }
}

// ─── Motor Profile ──────────────────────────────────────────────────

/// Motion profile handed to the drive's internal trajectory generator.
///
/// Units are drive counts (per second, per second²).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotorProfile {
    pub velocity: u32,
    pub acceleration: u32,
    pub deceleration: u32,
}

impl Default for MotorProfile {
    fn default() -> Self {
        Self {
            velocity: 4_000_000,
            acceleration: 190_000,
            deceleration: 190_000,
        }
    }
}

// ─── Drive Variant ──────────────────────────────────────────────────

/// Drive hardware variant, selected per joint at robot-build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveKind {
    /// Copley Controls drive (hips, knees): full telemetry.
    Copley,
    /// Schneider drive (ankles): position telemetry only.
    Schneider,
}
