//! Service-data command batches.
//!
//! Pure functions: every drive operation is first expressed as a list of
//! [`BusCommand`]s, then rendered to text lines for the transport.

use exo_common::drive::{ControlMode, ControlWord, DataType, MotorProfile, NodeId, ObjectEntry};
use exo_common::hal::command::{BusCommand, NmtCommand};

/// PDO transmission type: send on change / apply immediately.
pub const TRANSMIT_ON_EVENT: u8 = 0xFF;
/// PDO transmission type: every SYNC.
pub const TRANSMIT_EVERY_SYNC: u8 = 0x01;
/// COB-ID bit 31: PDO not valid.
const COB_ID_INVALID: u32 = 0x8000_0000;

// ─── PDO Channels ───────────────────────────────────────────────────

/// Process data channel, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdoChannel {
    /// Drive → host.
    Transmit(u8),
    /// Host → drive.
    Receive(u8),
}

impl PdoChannel {
    /// Communication parameter object.
    pub const fn comm_index(self) -> u16 {
        match self {
            Self::Transmit(n) => 0x1800 + n as u16 - 1,
            Self::Receive(n) => 0x1400 + n as u16 - 1,
        }
    }

    /// Mapping parameter object.
    pub const fn map_index(self) -> u16 {
        match self {
            Self::Transmit(n) => 0x1A00 + n as u16 - 1,
            Self::Receive(n) => 0x1600 + n as u16 - 1,
        }
    }

    /// COB-ID for this channel on `node`.
    pub const fn cob_id(self, node: NodeId) -> u32 {
        match self {
            Self::Transmit(n) => 0x100 * n as u32 + 0x80 + node as u32,
            Self::Receive(n) => 0x100 * n as u32 + node as u32,
        }
    }
}

/// Reconfigure one PDO: invalidate, clear mapping, map, count, revalidate.
pub fn pdo_config(
    node: NodeId,
    channel: PdoChannel,
    entries: &[ObjectEntry],
    transmission: u8,
) -> Vec<BusCommand> {
    let comm = channel.comm_index();
    let map = channel.map_index();
    let cob_id = channel.cob_id(node);

    let mut cmds = Vec::with_capacity(entries.len() + 5);
    cmds.push(BusCommand::write(node, comm, 1, DataType::U32, i64::from(cob_id | COB_ID_INVALID)));
    cmds.push(BusCommand::write(node, comm, 2, DataType::U8, i64::from(transmission)));
    cmds.push(BusCommand::write(node, map, 0, DataType::U8, 0));
    for (sub, entry) in entries.iter().enumerate() {
        cmds.push(BusCommand::write(
            node,
            map,
            sub as u8 + 1,
            DataType::U32,
            i64::from(entry.mapping_record()),
        ));
    }
    cmds.push(BusCommand::write(node, map, 0, DataType::U8, entries.len() as i64));
    cmds.push(BusCommand::write(node, comm, 1, DataType::U32, i64::from(cob_id)));
    cmds
}

/// Full process-data layout for one drive.
///
/// TPDO1 status word on event, TPDO2 position (+ velocity) every SYNC,
/// TPDO3 torque every SYNC, RPDO3/4/5 targets applied immediately.
pub fn init_pdos(node: NodeId, velocity_telemetry: bool, torque_telemetry: bool) -> Vec<BusCommand> {
    let mut cmds = pdo_config(
        node,
        PdoChannel::Transmit(1),
        &[ObjectEntry::StatusWord],
        TRANSMIT_ON_EVENT,
    );

    let motion: &[ObjectEntry] = if velocity_telemetry {
        &[ObjectEntry::ActualPosition, ObjectEntry::ActualVelocity]
    } else {
        &[ObjectEntry::ActualPosition]
    };
    cmds.extend(pdo_config(node, PdoChannel::Transmit(2), motion, TRANSMIT_EVERY_SYNC));

    if torque_telemetry {
        cmds.extend(pdo_config(
            node,
            PdoChannel::Transmit(3),
            &[ObjectEntry::ActualTorque],
            TRANSMIT_EVERY_SYNC,
        ));
    }

    for (n, target) in [
        (3, ObjectEntry::TargetPosition),
        (4, ObjectEntry::TargetVelocity),
        (5, ObjectEntry::TargetTorque),
    ] {
        cmds.extend(pdo_config(node, PdoChannel::Receive(n), &[target], TRANSMIT_ON_EVENT));
    }
    cmds
}

// ─── State / Mode Commands ──────────────────────────────────────────

/// NMT bring-up: pre-operational, then operational.
pub fn nmt_start(node: NodeId) -> Vec<BusCommand> {
    vec![
        BusCommand::nmt(node, NmtCommand::PreOperational),
        BusCommand::nmt(node, NmtCommand::Start),
    ]
}

pub fn control_word(node: NodeId, word: ControlWord) -> BusCommand {
    BusCommand::write_entry(node, ObjectEntry::ControlWord, i64::from(word.bits()))
}

/// Select the operating mode (0x6060).
pub fn mode_of_operation(node: NodeId, mode: ControlMode) -> BusCommand {
    let value = mode.mode_of_operation().map_or(0, i64::from);
    BusCommand::write_entry(node, ObjectEntry::ModesOfOperation, value)
}

pub fn position_control(node: NodeId, profile: &MotorProfile) -> Vec<BusCommand> {
    vec![
        mode_of_operation(node, ControlMode::Position),
        BusCommand::write_entry(node, ObjectEntry::ProfileVelocity, i64::from(profile.velocity)),
        BusCommand::write_entry(
            node,
            ObjectEntry::ProfileAcceleration,
            i64::from(profile.acceleration),
        ),
        BusCommand::write_entry(
            node,
            ObjectEntry::ProfileDeceleration,
            i64::from(profile.deceleration),
        ),
    ]
}

pub fn velocity_control(node: NodeId, profile: &MotorProfile) -> Vec<BusCommand> {
    vec![
        mode_of_operation(node, ControlMode::Velocity),
        BusCommand::write_entry(
            node,
            ObjectEntry::ProfileAcceleration,
            i64::from(profile.acceleration),
        ),
        BusCommand::write_entry(
            node,
            ObjectEntry::ProfileDeceleration,
            i64::from(profile.deceleration),
        ),
    ]
}

pub fn torque_control(node: NodeId) -> Vec<BusCommand> {
    vec![mode_of_operation(node, ControlMode::Torque)]
}

/// Render a batch to command lines numbered from 1.
pub fn render(cmds: &[BusCommand]) -> Vec<String> {
    cmds.iter()
        .enumerate()
        .map(|(i, cmd)| cmd.render(i as u32 + 1))
        .collect()
}
