//! Per-drive protocol state.
//!
//! `DriveProtocol` tracks what the host believes about one drive and issues
//! the command batches for every transition. The transport is passed into
//! each call; the drive never owns it.

use super::DriveError;
use super::sdo;
use exo_common::drive::{
    ControlMode, ControlWord, DriveState, MotorProfile, NodeId, ObjectEntry, StatusWord,
};
use exo_common::hal::command::BusCommand;
use exo_common::hal::transport::Transport;
use tracing::{debug, info, warn};

/// Protocol state of one drive.
#[derive(Debug, Clone)]
pub struct DriveProtocol {
    node: NodeId,
    state: DriveState,
    mode: ControlMode,
    status_word: StatusWord,
    error_code: u16,
    /// Last value written to control word bit 4.
    set_point_bit: bool,
    /// Change-set-immediately (bit 5) requested.
    continuous: bool,
}

impl DriveProtocol {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            state: DriveState::Disabled,
            mode: ControlMode::Unconfigured,
            status_word: StatusWord::default(),
            error_code: 0,
            set_point_bit: false,
            continuous: false,
        }
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn state(&self) -> DriveState {
        self.state
    }

    #[inline]
    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    #[inline]
    pub fn status_word(&self) -> StatusWord {
        self.status_word
    }

    #[inline]
    pub fn error_code(&self) -> u16 {
        self.error_code
    }

    #[inline]
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// Send one batch; success only if every line was acknowledged.
    fn send(&self, transport: &mut dyn Transport, cmds: &[BusCommand]) -> Result<(), DriveError> {
        let lines = sdo::render(cmds);
        let acknowledged = transport.send(&lines);
        if acknowledged == lines.len() {
            debug!(node = self.node, lines = lines.len(), "batch acknowledged");
            Ok(())
        } else {
            warn!(
                node = self.node,
                acknowledged,
                sent = lines.len(),
                "batch not fully acknowledged"
            );
            Err(DriveError::Unacknowledged {
                node: self.node,
                acknowledged,
                sent: lines.len(),
            })
        }
    }

    fn invalid(&self, operation: &'static str) -> DriveError {
        DriveError::InvalidState {
            node: self.node,
            operation,
            state: self.state,
            mode: self.mode,
        }
    }

    /// Control word that keeps the current enable/continuous bits.
    fn operating_word(&self, new_set_point: bool) -> ControlWord {
        let mut word = ControlWord::ENABLE;
        if self.continuous {
            word |= ControlWord::CHANGE_SET_IMMEDIATELY;
        }
        if new_set_point {
            word |= ControlWord::NEW_SET_POINT;
        }
        word
    }

    // ─── Network ────────────────────────────────────────────────────

    /// NMT bring-up for this node.
    pub fn start_node(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        self.send(transport, &sdo::nmt_start(self.node))
    }

    /// Configure the process data channels.
    pub fn init_pdos(
        &mut self,
        transport: &mut dyn Transport,
        velocity_telemetry: bool,
        torque_telemetry: bool,
    ) -> Result<(), DriveError> {
        let cmds = sdo::init_pdos(self.node, velocity_telemetry, torque_telemetry);
        self.send(transport, &cmds)?;
        info!(node = self.node, "PDOs configured");
        Ok(())
    }

    // ─── State Transitions ──────────────────────────────────────────

    /// DISABLED → READY_TO_SWITCH_ON.
    pub fn ready_to_switch_on(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        if self.state != DriveState::Disabled {
            return Err(self.invalid("ready_to_switch_on"));
        }
        self.send(transport, &[sdo::control_word(self.node, ControlWord::SHUTDOWN)])?;
        self.state = DriveState::ReadyToSwitchOn;
        debug!(node = self.node, "ready to switch on");
        Ok(())
    }

    /// READY_TO_SWITCH_ON → ENABLED.
    pub fn enable(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        if self.state != DriveState::ReadyToSwitchOn {
            return Err(self.invalid("enable"));
        }
        self.send(transport, &[sdo::control_word(self.node, ControlWord::ENABLE)])?;
        self.state = DriveState::Enabled;
        info!(node = self.node, "drive enabled");
        Ok(())
    }

    /// Any state → DISABLED.
    ///
    /// The local state is forced regardless of the answer; the return
    /// value only reports whether the drive acknowledged.
    pub fn disable(&mut self, transport: &mut dyn Transport) -> bool {
        let acknowledged = self
            .send(transport, &[sdo::control_word(self.node, ControlWord::empty())])
            .is_ok();
        self.state = DriveState::Disabled;
        self.mode = ControlMode::Unconfigured;
        self.set_point_bit = false;
        self.continuous = false;
        info!(node = self.node, acknowledged, "drive disabled");
        acknowledged
    }

    /// FAULT → DISABLED via a fault-reset edge.
    pub fn reset_fault(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        let cmds = [
            sdo::control_word(self.node, ControlWord::FAULT_RESET),
            sdo::control_word(self.node, ControlWord::empty()),
        ];
        self.send(transport, &cmds)?;
        info!(node = self.node, error_code = self.error_code, "fault reset");
        self.state = DriveState::Disabled;
        self.mode = ControlMode::Unconfigured;
        self.status_word = StatusWord::default();
        self.error_code = 0;
        self.set_point_bit = false;
        self.continuous = false;
        Ok(())
    }

    // ─── Control Modes ──────────────────────────────────────────────

    fn configure(
        &mut self,
        transport: &mut dyn Transport,
        target: ControlMode,
        cmds: &[BusCommand],
    ) -> Result<(), DriveError> {
        // Mode changes go back through DISABLED.
        if self.state != DriveState::Enabled || self.mode.is_configured() {
            return Err(self.invalid("init control mode"));
        }
        match self.send(transport, cmds) {
            Ok(()) => {
                self.mode = target;
                info!(node = self.node, mode = ?target, "control mode configured");
                Ok(())
            }
            Err(e) => {
                self.mode = ControlMode::Error;
                Err(e)
            }
        }
    }

    pub fn init_position_control(
        &mut self,
        transport: &mut dyn Transport,
        profile: &MotorProfile,
    ) -> Result<(), DriveError> {
        let cmds = sdo::position_control(self.node, profile);
        self.configure(transport, ControlMode::Position, &cmds)
    }

    pub fn init_velocity_control(
        &mut self,
        transport: &mut dyn Transport,
        profile: &MotorProfile,
    ) -> Result<(), DriveError> {
        let cmds = sdo::velocity_control(self.node, profile);
        self.configure(transport, ControlMode::Velocity, &cmds)
    }

    pub fn init_torque_control(&mut self, transport: &mut dyn Transport) -> Result<(), DriveError> {
        let cmds = sdo::torque_control(self.node);
        self.configure(transport, ControlMode::Torque, &cmds)
    }

    /// Apply new position set points immediately (control word bit 5).
    pub fn enable_continuous_profile(
        &mut self,
        transport: &mut dyn Transport,
    ) -> Result<(), DriveError> {
        if self.state != DriveState::Enabled {
            return Err(self.invalid("enable_continuous_profile"));
        }
        let word = ControlWord::ENABLE | ControlWord::CHANGE_SET_IMMEDIATELY;
        self.send(transport, &[sdo::control_word(self.node, word)])?;
        self.continuous = true;
        self.set_point_bit = false;
        Ok(())
    }

    // ─── Set Points ─────────────────────────────────────────────────

    fn write_target(
        &mut self,
        transport: &mut dyn Transport,
        expected: ControlMode,
        entry: ObjectEntry,
        value: i32,
    ) -> Result<(), DriveError> {
        if self.mode != expected {
            return Err(DriveError::ModeMismatch {
                node: self.node,
                expected,
                actual: self.mode,
            });
        }
        transport
            .write_target(self.node, entry, value)
            .map_err(|source| DriveError::Transport {
                node: self.node,
                source,
            })
    }

    pub fn set_position(&mut self, transport: &mut dyn Transport, raw: i32) -> Result<(), DriveError> {
        self.write_target(transport, ControlMode::Position, ObjectEntry::TargetPosition, raw)
    }

    pub fn set_velocity(&mut self, transport: &mut dyn Transport, raw: i32) -> Result<(), DriveError> {
        self.write_target(transport, ControlMode::Velocity, ObjectEntry::TargetVelocity, raw)
    }

    pub fn set_torque(&mut self, transport: &mut dyn Transport, raw: i32) -> Result<(), DriveError> {
        self.write_target(transport, ControlMode::Torque, ObjectEntry::TargetTorque, raw)
    }

    /// Toggle control word bit 4.
    ///
    /// Returns `true` only when the bit went 0 → 1 and the drive
    /// acknowledged, i.e. a new set point was latched. The next call clears
    /// the bit again and returns `false`.
    pub fn confirm_set_point(&mut self, transport: &mut dyn Transport) -> bool {
        if self.state != DriveState::Enabled || self.mode != ControlMode::Position {
            return false;
        }
        let next = !self.set_point_bit;
        let word = self.operating_word(next);
        if self.send(transport, &[sdo::control_word(self.node, word)]).is_err() {
            return false;
        }
        self.set_point_bit = next;
        next
    }

    // ─── Status ─────────────────────────────────────────────────────

    /// Refresh the cached status word; the drive's answer is authoritative.
    ///
    /// Returns the resulting state. Without a fresh status word the cached
    /// state is kept.
    pub fn update_status(&mut self, transport: &dyn Transport) -> DriveState {
        let Some(raw) = transport.read_entry(self.node, ObjectEntry::StatusWord) else {
            return self.state;
        };
        let status = StatusWord::from_bits_truncate(raw as u16);
        self.status_word = status;

        if status.is_fault() {
            let code = transport
                .read_entry(self.node, ObjectEntry::ErrorCode)
                .unwrap_or(0) as u16;
            if self.state != DriveState::Disabled || code != self.error_code {
                warn!(node = self.node, error_code = code, "drive fault");
            }
            self.error_code = code;
            self.state = DriveState::Disabled;
            self.mode = ControlMode::Error;
            self.set_point_bit = false;
            return self.state;
        }

        let reported = status.drive_state();
        if reported != self.state {
            info!(node = self.node, from = ?self.state, to = ?reported, "drive state changed");
            self.state = reported;
        }
        if self.state != DriveState::Enabled && self.mode.is_configured() {
            self.mode = ControlMode::Unconfigured;
        }
        self.state
    }

    /// Actual position [counts], if received.
    pub fn actual_position(&self, transport: &dyn Transport) -> Option<i32> {
        transport.read_entry(self.node, ObjectEntry::ActualPosition)
    }

    pub fn actual_velocity(&self, transport: &dyn Transport) -> Option<i32> {
        transport.read_entry(self.node, ObjectEntry::ActualVelocity)
    }

    pub fn actual_torque(&self, transport: &dyn Transport) -> Option<i32> {
        transport.read_entry(self.node, ObjectEntry::ActualTorque)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exo_common::robot::RobotConfig;
    use exo_hal::SimulationTransport;
    use proptest::prelude::*;

    fn bus() -> SimulationTransport {
        SimulationTransport::for_robot(&RobotConfig::default()).unwrap()
    }

    fn enabled(bus: &mut SimulationTransport, node: NodeId) -> DriveProtocol {
        let mut drive = DriveProtocol::new(node);
        drive.ready_to_switch_on(bus).unwrap();
        drive.enable(bus).unwrap();
        drive
    }

    #[test]
    fn handshake_and_position_control() {
        let mut bus = bus();
        let mut drive = DriveProtocol::new(1);
        assert_eq!(drive.state(), DriveState::Disabled);
        assert_eq!(drive.mode(), ControlMode::Unconfigured);

        drive.ready_to_switch_on(&mut bus).unwrap();
        assert_eq!(drive.state(), DriveState::ReadyToSwitchOn);
        drive.enable(&mut bus).unwrap();
        assert_eq!(drive.state(), DriveState::Enabled);
        drive
            .init_position_control(&mut bus, &MotorProfile::default())
            .unwrap();
        assert_eq!(drive.mode(), ControlMode::Position);
        drive.set_position(&mut bus, 1000).unwrap();

        assert_eq!(
            drive.set_velocity(&mut bus, 1000),
            Err(DriveError::ModeMismatch {
                node: 1,
                expected: ControlMode::Velocity,
                actual: ControlMode::Position,
            })
        );
        assert_eq!(drive.update_status(&bus), DriveState::Enabled);
        assert_eq!(drive.actual_position(&bus), Some(1000));
    }

    #[test]
    fn transitions_out_of_order_are_rejected() {
        let mut bus = bus();
        let mut drive = DriveProtocol::new(2);
        assert!(matches!(
            drive.enable(&mut bus),
            Err(DriveError::InvalidState { .. })
        ));
        assert!(matches!(
            drive.init_torque_control(&mut bus),
            Err(DriveError::InvalidState { .. })
        ));
        drive.ready_to_switch_on(&mut bus).unwrap();
        assert!(matches!(
            drive.ready_to_switch_on(&mut bus),
            Err(DriveError::InvalidState { .. })
        ));
        assert_eq!(drive.mode(), ControlMode::Unconfigured);
    }

    #[test]
    fn mode_change_requires_disable() {
        let mut bus = bus();
        let mut drive = enabled(&mut bus, 3);
        drive
            .init_position_control(&mut bus, &MotorProfile::default())
            .unwrap();
        assert!(matches!(
            drive.init_velocity_control(&mut bus, &MotorProfile::default()),
            Err(DriveError::InvalidState { .. })
        ));
        assert_eq!(drive.mode(), ControlMode::Position);

        assert!(drive.disable(&mut bus));
        assert_eq!(drive.state(), DriveState::Disabled);
        assert_eq!(drive.mode(), ControlMode::Unconfigured);

        drive.ready_to_switch_on(&mut bus).unwrap();
        drive.enable(&mut bus).unwrap();
        drive
            .init_velocity_control(&mut bus, &MotorProfile::default())
            .unwrap();
        assert_eq!(drive.mode(), ControlMode::Velocity);
        drive.set_velocity(&mut bus, 500).unwrap();
    }

    #[test]
    fn unacknowledged_batch_sets_error_mode() {
        let mut bus = bus();
        let mut drive = enabled(&mut bus, 4);
        bus.set_acknowledging(4, false);

        let err = drive.init_torque_control(&mut bus).unwrap_err();
        assert_eq!(
            err,
            DriveError::Unacknowledged {
                node: 4,
                acknowledged: 0,
                sent: 1
            }
        );
        assert_eq!(drive.mode(), ControlMode::Error);

        // Error mode may be retried once the bus answers again.
        bus.set_acknowledging(4, true);
        drive.init_torque_control(&mut bus).unwrap();
        assert_eq!(drive.mode(), ControlMode::Torque);
    }

    #[test]
    fn disable_forces_state_even_without_ack() {
        let mut bus = bus();
        let mut drive = enabled(&mut bus, 5);
        bus.set_acknowledging(5, false);
        assert!(!drive.disable(&mut bus));
        assert_eq!(drive.state(), DriveState::Disabled);
        assert_eq!(drive.mode(), ControlMode::Unconfigured);
    }

    #[test]
    fn confirm_set_point_latches_once() {
        let mut bus = bus();
        let mut drive = enabled(&mut bus, 1);
        assert!(!drive.confirm_set_point(&mut bus));

        drive
            .init_position_control(&mut bus, &MotorProfile::default())
            .unwrap();
        assert!(drive.confirm_set_point(&mut bus));
        assert!(!drive.confirm_set_point(&mut bus));
        assert!(drive.confirm_set_point(&mut bus));

        let last = bus.history().last().unwrap().to_string();
        assert_eq!(last, "[1] 1 write 0x6040 0 u16 0x1F");
    }

    #[test]
    fn continuous_profile_keeps_bit_five() {
        let mut bus = bus();
        let mut drive = enabled(&mut bus, 2);
        drive
            .init_position_control(&mut bus, &MotorProfile::default())
            .unwrap();
        drive.enable_continuous_profile(&mut bus).unwrap();
        assert!(drive.is_continuous());
        assert!(drive.confirm_set_point(&mut bus));
        let last = bus.history().last().unwrap().to_string();
        assert_eq!(last, "[1] 2 write 0x6040 0 u16 0x3F");
    }

    #[test]
    fn fault_in_status_word_disables() {
        let mut bus = bus();
        let mut drive = enabled(&mut bus, 6);
        drive
            .init_position_control(&mut bus, &MotorProfile::default())
            .unwrap();
        bus.inject_fault(6, 0x2310);

        assert_eq!(drive.update_status(&bus), DriveState::Disabled);
        assert_eq!(drive.mode(), ControlMode::Error);
        assert_eq!(drive.error_code(), 0x2310);
        assert!(drive.status_word().is_fault());

        drive.reset_fault(&mut bus).unwrap();
        assert_eq!(drive.update_status(&bus), DriveState::Disabled);
        assert!(!drive.status_word().is_fault());
        assert_eq!(drive.error_code(), 0);
        drive.ready_to_switch_on(&mut bus).unwrap();
        drive.enable(&mut bus).unwrap();
        assert_eq!(drive.update_status(&bus), DriveState::Enabled);
    }

    #[test]
    fn status_without_telemetry_keeps_cache() {
        let mut bus = bus();
        let mut drive = enabled(&mut bus, 3);
        bus.set_acknowledging(3, false);
        assert_eq!(drive.update_status(&bus), DriveState::Enabled);
    }

    #[derive(Debug, Clone, Copy)]
    enum Call {
        ReadyToSwitchOn,
        Enable,
        Disable,
        ResetFault,
        Position,
        Velocity,
        Torque,
        Continuous,
        UpdateStatus,
        Fault,
        Acknowledging(bool),
    }

    fn call() -> impl Strategy<Value = Call> {
        prop_oneof![
            Just(Call::ReadyToSwitchOn),
            Just(Call::Enable),
            Just(Call::Disable),
            Just(Call::ResetFault),
            Just(Call::Position),
            Just(Call::Velocity),
            Just(Call::Torque),
            Just(Call::Continuous),
            Just(Call::UpdateStatus),
            Just(Call::Fault),
            any::<bool>().prop_map(Call::Acknowledging),
        ]
    }

    proptest! {
        /// A motion mode is only ever held by an enabled drive, whatever
        /// the call order and whether the bus answers.
        #[test]
        fn configured_mode_implies_enabled(calls in proptest::collection::vec(call(), 0..64)) {
            let mut bus = bus();
            let mut drive = DriveProtocol::new(2);
            let profile = MotorProfile::default();
            for call in calls {
                match call {
                    Call::ReadyToSwitchOn => { let _ = drive.ready_to_switch_on(&mut bus); }
                    Call::Enable => { let _ = drive.enable(&mut bus); }
                    Call::Disable => { drive.disable(&mut bus); }
                    Call::ResetFault => { let _ = drive.reset_fault(&mut bus); }
                    Call::Position => { let _ = drive.init_position_control(&mut bus, &profile); }
                    Call::Velocity => { let _ = drive.init_velocity_control(&mut bus, &profile); }
                    Call::Torque => { let _ = drive.init_torque_control(&mut bus); }
                    Call::Continuous => { let _ = drive.enable_continuous_profile(&mut bus); }
                    Call::UpdateStatus => { drive.update_status(&bus); }
                    Call::Fault => { bus.inject_fault(2, 0x2310); }
                    Call::Acknowledging(on) => bus.set_acknowledging(2, on),
                }
                prop_assert!(
                    !drive.mode().is_configured() || drive.state() == DriveState::Enabled,
                    "{:?} left state {:?} with mode {:?}",
                    call,
                    drive.state(),
                    drive.mode()
                );
            }
        }
    }
}
