//! Drive capability trait and vendor variants.
//!
//! Joint code only ever sees `dyn Drive`. The variant is chosen from the
//! joint configuration at robot-build time by [`build_drive`].

use super::{DriveError, DriveProtocol};
use exo_common::drive::{ControlMode, DriveKind, DriveState, MotorProfile, NodeId, StatusWord};
use exo_common::hal::transport::Transport;

/// Which telemetry a drive variant streams besides position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryCaps {
    pub velocity: bool,
    pub torque: bool,
}

/// Capability interface shared by all drive variants.
///
/// Every operation has a default built on [`DriveProtocol`]; a variant
/// only has to expose its protocol state and telemetry capabilities.
pub trait Drive: Send {
    fn kind(&self) -> DriveKind;

    fn telemetry(&self) -> TelemetryCaps;

    fn protocol(&self) -> &DriveProtocol;

    fn protocol_mut(&mut self) -> &mut DriveProtocol;

    fn node_id(&self) -> NodeId {
        self.protocol().node()
    }

    fn state(&self) -> DriveState {
        self.protocol().state()
    }

    fn mode(&self) -> ControlMode {
        self.protocol().mode()
    }

    fn status_word(&self) -> StatusWord {
        self.protocol().status_word()
    }

    /// NMT bring-up.
    fn init(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        self.protocol_mut().start_node(transport)
    }

    /// Configure process data channels for this variant's telemetry.
    fn init_pdos(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        let caps = self.telemetry();
        self.protocol_mut()
            .init_pdos(transport, caps.velocity, caps.torque)
    }

    fn ready_to_switch_on(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        self.protocol_mut().ready_to_switch_on(transport)
    }

    fn enable(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        self.protocol_mut().enable(transport)
    }

    fn disable(&mut self, transport: &mut dyn Transport) -> bool {
        self.protocol_mut().disable(transport)
    }

    fn reset_fault(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        self.protocol_mut().reset_fault(transport)
    }

    /// Drive fault latched (status word fault bit or failed mode change).
    fn is_faulted(&self) -> bool {
        self.status_word().is_fault() || self.mode() == ControlMode::Error
    }

    fn init_pos_control(
        &mut self,
        transport: &mut dyn Transport,
        profile: &MotorProfile,
    ) -> Result<(), DriveError> {
        self.protocol_mut().init_position_control(transport, profile)
    }

    fn init_vel_control(
        &mut self,
        transport: &mut dyn Transport,
        profile: &MotorProfile,
    ) -> Result<(), DriveError> {
        self.protocol_mut().init_velocity_control(transport, profile)
    }

    fn init_torque_control(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        self.protocol_mut().init_torque_control(transport)
    }

    fn enable_continuous_profile(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        self.protocol_mut().enable_continuous_profile(transport)
    }

    fn set_pos(&mut self, transport: &mut dyn Transport, raw: i32) -> Result<(), DriveError> {
        self.protocol_mut().set_position(transport, raw)
    }

    fn set_vel(&mut self, transport: &mut dyn Transport, raw: i32) -> Result<(), DriveError> {
        self.protocol_mut().set_velocity(transport, raw)
    }

    fn set_torque(&mut self, transport: &mut dyn Transport, raw: i32) -> Result<(), DriveError> {
        self.protocol_mut().set_torque(transport, raw)
    }

    fn pos_control_confirm_sp(&mut self, transport: &mut dyn Transport) -> bool {
        self.protocol_mut().confirm_set_point(transport)
    }

    fn update_drive_status(&mut self, transport: &dyn Transport) -> DriveState {
        self.protocol_mut().update_status(transport)
    }

    fn get_pos(&self, transport: &dyn Transport) -> Option<i32> {
        self.protocol().actual_position(transport)
    }

    /// Actual velocity; 0 when the variant does not stream it.
    fn get_vel(&self, transport: &dyn Transport) -> i32 {
        if !self.telemetry().velocity {
            return 0;
        }
        self.protocol().actual_velocity(transport).unwrap_or(0)
    }

    /// Actual torque; 0 when the variant does not stream it.
    fn get_torque(&self, transport: &dyn Transport) -> i32 {
        if !self.telemetry().torque {
            return 0;
        }
        self.protocol().actual_torque(transport).unwrap_or(0)
    }
}

// ─── Copley ─────────────────────────────────────────────────────────

/// Copley Controls drive (hips and knees).
#[derive(Debug, Clone)]
pub struct CopleyDrive {
    protocol: DriveProtocol,
}

impl CopleyDrive {
    pub fn new(node: NodeId) -> Self {
        Self {
            protocol: DriveProtocol::new(node),
        }
    }
}

impl Drive for CopleyDrive {
    fn kind(&self) -> DriveKind {
        DriveKind::Copley
    }

    fn telemetry(&self) -> TelemetryCaps {
        TelemetryCaps {
            velocity: true,
            torque: true,
        }
    }

    fn protocol(&self) -> &DriveProtocol {
        &self.protocol
    }

    fn protocol_mut(&mut self) -> &mut DriveProtocol {
        &mut self.protocol
    }
}

// ─── Schneider ──────────────────────────────────────────────────────

/// Schneider drive (ankles). Streams position only.
#[derive(Debug, Clone)]
pub struct SchneiderDrive {
    protocol: DriveProtocol,
}

impl SchneiderDrive {
    pub fn new(node: NodeId) -> Self {
        Self {
            protocol: DriveProtocol::new(node),
        }
    }
}

impl Drive for SchneiderDrive {
    fn kind(&self) -> DriveKind {
        DriveKind::Schneider
    }

    fn telemetry(&self) -> TelemetryCaps {
        TelemetryCaps {
            velocity: false,
            torque: false,
        }
    }

    fn protocol(&self) -> &DriveProtocol {
        &self.protocol
    }

    fn protocol_mut(&mut self) -> &mut DriveProtocol {
        &mut self.protocol
    }
}

/// Instantiate the variant for `kind`.
pub fn build_drive(kind: DriveKind, node: NodeId) -> Box<dyn Drive> {
    match kind {
        DriveKind::Copley => Box::new(CopleyDrive::new(node)),
        DriveKind::Schneider => Box::new(SchneiderDrive::new(node)),
    }
}
