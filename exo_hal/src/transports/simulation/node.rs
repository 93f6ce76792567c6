//! Virtual CiA 402 drive.

use exo_common::drive::{ControlMode, NodeId, ObjectEntry, StatusWord};
use std::collections::HashMap;
use tracing::debug;

/// TPDO communication parameter base (0x1800 + n - 1).
const TPDO_COMM_BASE: u16 = 0x1800;
/// TPDO mapping parameter base (0x1A00 + n - 1).
const TPDO_MAP_BASE: u16 = 0x1A00;
/// COB-ID bit 31: PDO not valid.
const COB_ID_INVALID: i64 = 0x8000_0000;
const MAX_TPDOS: u16 = 4;

/// NMT state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmtState {
    PreOperational,
    Operational,
}

/// Internal CiA 402 state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualState {
    SwitchOnDisabled,
    ReadyToSwitchOn,
    SwitchedOn,
    OperationEnabled,
    Fault,
}

impl VirtualState {
    const fn status_bits(self) -> u16 {
        match self {
            Self::SwitchOnDisabled => 0x0040,
            Self::ReadyToSwitchOn => 0x0021,
            Self::SwitchedOn => 0x0023,
            Self::OperationEnabled => 0x0027,
            Self::Fault => 0x0008,
        }
    }
}

/// One simulated drive with its object dictionary.
#[derive(Debug, Clone)]
pub struct VirtualDrive {
    node: NodeId,
    nmt: NmtState,
    state: VirtualState,
    control_word: u16,
    error_code: u16,
    mode_of_operation: i8,
    actual_position: i32,
    actual_velocity: i32,
    actual_torque: i32,
    /// Everything else written to the dictionary (profile, PDO parameters).
    objects: HashMap<(u16, u8), i64>,
    pdo_configured: bool,
}

impl VirtualDrive {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            nmt: NmtState::PreOperational,
            state: VirtualState::SwitchOnDisabled,
            control_word: 0,
            error_code: 0,
            mode_of_operation: 0,
            actual_position: 0,
            actual_velocity: 0,
            actual_torque: 0,
            objects: HashMap::new(),
            pdo_configured: false,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn nmt(&self) -> NmtState {
        self.nmt
    }

    pub fn state(&self) -> VirtualState {
        self.state
    }

    pub fn set_nmt(&mut self, nmt: NmtState) {
        self.nmt = nmt;
    }

    /// Status word as the drive would report it.
    pub fn status_word(&self) -> StatusWord {
        let mut bits = self.state.status_bits() | StatusWord::REMOTE.bits();
        if self.state == VirtualState::OperationEnabled {
            bits |= StatusWord::TARGET_REACHED.bits();
            if self.operating_mode() == Some(ControlMode::Position)
                && self.control_word & 0x0010 != 0
            {
                bits |= StatusWord::SET_POINT_ACK.bits();
            }
        }
        StatusWord::from_bits_truncate(bits)
    }

    /// Motion mode selected through 0x6060.
    pub fn operating_mode(&self) -> Option<ControlMode> {
        ControlMode::from_mode_of_operation(self.mode_of_operation)
    }

    /// Latched raw dictionary value.
    pub fn object(&self, index: u16, sub: u8) -> Option<i64> {
        self.objects.get(&(index, sub)).copied()
    }

    /// Force the drive into FAULT with the given error code.
    pub fn inject_fault(&mut self, error_code: u16) {
        self.state = VirtualState::Fault;
        self.error_code = error_code;
    }

    /// Apply one object dictionary download.
    pub fn apply_write(&mut self, index: u16, sub: u8, value: i64) {
        // Targets are followed only in the mode they belong to.
        let following = if self.state == VirtualState::OperationEnabled {
            self.operating_mode()
        } else {
            None
        };
        match ObjectEntry::from_index(index) {
            Some(ObjectEntry::ControlWord) => self.apply_control_word(value as u16),
            Some(ObjectEntry::ModesOfOperation) => self.mode_of_operation = value as i8,
            Some(ObjectEntry::TargetPosition) => {
                if following == Some(ControlMode::Position) {
                    self.actual_position = value as i32;
                }
                self.objects.insert((index, sub), value);
            }
            Some(ObjectEntry::TargetVelocity) => {
                if following == Some(ControlMode::Velocity) {
                    self.actual_velocity = value as i32;
                }
                self.objects.insert((index, sub), value);
            }
            Some(ObjectEntry::TargetTorque) => {
                if following == Some(ControlMode::Torque) {
                    self.actual_torque = value as i32;
                }
                self.objects.insert((index, sub), value);
            }
            _ => {
                if (TPDO_COMM_BASE..TPDO_COMM_BASE + MAX_TPDOS).contains(&index)
                    || (TPDO_MAP_BASE..TPDO_MAP_BASE + MAX_TPDOS).contains(&index)
                {
                    self.pdo_configured = true;
                }
                self.objects.insert((index, sub), value);
            }
        }
    }

    fn apply_control_word(&mut self, cw: u16) {
        let previous = self.control_word;
        self.control_word = cw;

        if self.state == VirtualState::Fault {
            // Rising edge of fault reset leaves FAULT.
            if cw & 0x0080 != 0 && previous & 0x0080 == 0 {
                self.state = VirtualState::SwitchOnDisabled;
                self.error_code = 0;
            }
            return;
        }

        let from = self.state;
        self.state = if cw & 0x0006 != 0x0006 {
            VirtualState::SwitchOnDisabled
        } else if cw & 0x0001 == 0 {
            VirtualState::ReadyToSwitchOn
        } else if from == VirtualState::SwitchOnDisabled {
            // Switch on / enable without shutdown first is ignored.
            from
        } else if cw & 0x0008 == 0 {
            VirtualState::SwitchedOn
        } else {
            VirtualState::OperationEnabled
        };

        if from != self.state {
            debug!(node = self.node, ?from, to = ?self.state, "virtual drive transition");
        }
    }

    /// Whether `entry` currently reaches the host.
    ///
    /// Before any TPDO is configured everything is visible. Afterwards only
    /// entries mapped into a valid TPDO are, plus the error code (SDO).
    pub fn is_readable(&self, entry: ObjectEntry) -> bool {
        if entry == ObjectEntry::ErrorCode || !self.pdo_configured {
            return true;
        }
        (0..MAX_TPDOS).any(|n| self.tpdo_maps(n, entry))
    }

    fn tpdo_maps(&self, n: u16, entry: ObjectEntry) -> bool {
        let valid = self
            .object(TPDO_COMM_BASE + n, 1)
            .is_some_and(|cob| cob & COB_ID_INVALID == 0);
        if !valid {
            return false;
        }
        let count = self.object(TPDO_MAP_BASE + n, 0).unwrap_or(0).clamp(0, 8) as u8;
        (1..=count).any(|sub| {
            self.object(TPDO_MAP_BASE + n, sub)
                .is_some_and(|record| (record >> 16) as u16 == entry.index())
        })
    }

    /// Current value of an entry, honouring the TPDO mapping.
    pub fn read(&self, entry: ObjectEntry) -> Option<i32> {
        if !self.is_readable(entry) {
            return None;
        }
        let value = match entry {
            ObjectEntry::StatusWord => i32::from(self.status_word().bits()),
            ObjectEntry::ControlWord => i32::from(self.control_word),
            ObjectEntry::ErrorCode => i32::from(self.error_code),
            ObjectEntry::ModesOfOperation => i32::from(self.mode_of_operation),
            ObjectEntry::ActualPosition => self.actual_position,
            ObjectEntry::ActualVelocity => self.actual_velocity,
            ObjectEntry::ActualTorque => self.actual_torque,
            other => self.object(other.index(), 0)? as i32,
        };
        Some(value)
    }
}
