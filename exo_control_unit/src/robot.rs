//! Robot aggregate: the transport plus every joint.
//!
//! The robot is the single owner of the bus. Joints and drives borrow it
//! per call, so every command of one tick goes through one place and
//! nothing is sent once [`Robot::shutdown`] has run.

use crate::joint::{Joint, MovementResult};
use exo_common::consts::MAX_JOINTS;
use exo_common::drive::{ControlMode, DriveState, MotorProfile};
use exo_common::gait::JointVector;
use exo_common::hal::transport::{Transport, TransportError};
use exo_common::robot::{FeedbackSource, PilotParameters, RobotConfig};
use exo_common::status::JointStatus;
use exo_hal::TransportRegistry;
use tracing::{debug, error, info, warn};

pub struct Robot<T: Transport = Box<dyn Transport>> {
    transport: T,
    joints: Vec<Joint>,
    profile: MotorProfile,
    feedback: FeedbackSource,
    pilot: PilotParameters,
    shut_down: bool,
}

impl Robot {
    /// Create the configured transport from `registry` and build the robot.
    pub fn from_registry(
        config: &RobotConfig,
        registry: &TransportRegistry,
    ) -> Result<Self, TransportError> {
        let transport = registry.create(&config.control.transport)?;
        Self::new(config, transport)
    }
}

impl<T: Transport> Robot<T> {
    /// Initialize `transport` for this robot and build one joint per entry.
    pub fn new(config: &RobotConfig, mut transport: T) -> Result<Self, TransportError> {
        transport.init(config)?;
        let feedback = config.control.feedback;
        let joints = config
            .joints
            .iter()
            .map(|j| Joint::new(j, feedback))
            .collect::<Vec<_>>();
        info!(
            transport = transport.name(),
            joints = joints.len(),
            ?feedback,
            "robot built"
        );
        Ok(Self {
            transport,
            joints,
            profile: config.profile,
            feedback,
            pilot: config.pilot,
            shut_down: false,
        })
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn joint_mut(&mut self, index: usize) -> Option<&mut Joint> {
        self.joints.get_mut(index)
    }

    #[inline]
    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn feedback(&self) -> FeedbackSource {
        self.feedback
    }

    pub fn profile(&self) -> &MotorProfile {
        &self.profile
    }

    pub fn pilot(&self) -> &PilotParameters {
        &self.pilot
    }

    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ─── Bring-up ───────────────────────────────────────────────────

    /// NMT start and PDO configuration on every drive.
    ///
    /// Skipped when angles come from the last command: nothing on the bus
    /// is read back, so there is nothing to map.
    pub fn initialise_network(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        if self.feedback == FeedbackSource::LastCommand {
            info!("command feedback configured, skipping PDO setup");
            return true;
        }
        let mut ok = true;
        for joint in &mut self.joints {
            let drive = joint.drive_mut();
            let result = drive
                .init(&mut self.transport)
                .and_then(|()| drive.init_pdos(&mut self.transport));
            if let Err(e) = result {
                error!(joint = joint.name(), error = %e, "network initialisation failed");
                ok = false;
            }
        }
        ok
    }

    /// Bring a joint's drive to ENABLED with no mode configured.
    ///
    /// Clears a latched fault and passes through DISABLED first, so this is
    /// also the recovery path.
    fn enable_joint(transport: &mut T, joint: &mut Joint) -> bool {
        let drive = joint.drive_mut();
        if drive.status_word().is_fault() {
            if let Err(e) = drive.reset_fault(transport) {
                error!(joint = joint.name(), error = %e, "fault reset failed");
                return false;
            }
        }
        if drive.state() != DriveState::Disabled || drive.mode() != ControlMode::Unconfigured {
            drive.disable(transport);
        }
        let result = drive
            .ready_to_switch_on(transport)
            .and_then(|()| drive.enable(transport));
        if let Err(e) = result {
            error!(joint = joint.name(), error = %e, "drive enable failed");
            return false;
        }
        true
    }

    /// Every drive to ENABLED + position control with the robot's profile,
    /// new set points applied immediately.
    pub fn init_position_control(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        let mut ok = true;
        for joint in &mut self.joints {
            if !Self::enable_joint(&mut self.transport, joint) {
                ok = false;
                continue;
            }
            if joint.set_mode(&mut self.transport, ControlMode::Position, Some(&self.profile))
                != ControlMode::Position
            {
                ok = false;
                continue;
            }
            if let Err(e) = joint.drive_mut().enable_continuous_profile(&mut self.transport) {
                error!(joint = joint.name(), error = %e, "continuous profile rejected");
                ok = false;
            }
        }
        if ok {
            info!(joints = self.joints.len(), "position control active");
        }
        ok
    }

    /// Every drive to ENABLED + torque control.
    pub fn init_torque_control(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        let mut ok = true;
        for joint in &mut self.joints {
            if !Self::enable_joint(&mut self.transport, joint)
                || joint.set_mode(&mut self.transport, ControlMode::Torque, None)
                    != ControlMode::Torque
            {
                ok = false;
            }
        }
        ok
    }

    /// Disable every drive. `true` only if all acknowledged.
    pub fn disable_joints(&mut self) -> bool {
        let mut ok = true;
        for joint in &mut self.joints {
            ok &= joint.drive_mut().disable(&mut self.transport);
        }
        ok
    }

    // ─── Cyclic ─────────────────────────────────────────────────────

    /// Refresh drive status and joint angles from the bus.
    pub fn update_robot(&mut self) {
        if self.shut_down {
            return;
        }
        for joint in &mut self.joints {
            joint.drive_mut().update_drive_status(&self.transport);
            joint.update_value(&self.transport);
        }
    }

    /// Current angles [deg]; placeholders where no fresh value exists.
    pub fn joint_states(&self) -> JointVector {
        let mut states = JointVector::new();
        for joint in self.joints.iter().take(MAX_JOINTS) {
            // Capacity is MAX_JOINTS and the iterator is bounded by it.
            let _ = states.push(joint.q_or_placeholder());
        }
        states
    }

    /// Command joint `index` to `deg`.
    pub fn set_position(&mut self, index: usize, deg: f64) -> MovementResult {
        if self.shut_down {
            return MovementResult::Unknown;
        }
        match self.joints.get_mut(index) {
            Some(joint) => joint.set_position(&mut self.transport, deg),
            None => {
                warn!(index, "no such joint");
                MovementResult::Unknown
            }
        }
    }

    /// Toggle the new-set-point bit on every drive.
    ///
    /// Returns how many drives latched a new set point on this call.
    pub fn bit_flip(&mut self) -> usize {
        if self.shut_down {
            return 0;
        }
        let mut latched = 0;
        for joint in &mut self.joints {
            if joint.drive_mut().pos_control_confirm_sp(&mut self.transport) {
                latched += 1;
            }
        }
        latched
    }

    /// Any drive faulted or stuck in a failed mode change.
    pub fn has_fault(&self) -> bool {
        self.joints.iter().any(|j| j.drive().is_faulted())
    }

    /// Command an absolute posture and pin the estimates to it.
    ///
    /// Only meaningful when angles come from the last command; with real
    /// telemetry the request is refused.
    pub fn set_pose(&mut self, degrees: &[f64]) -> bool {
        if self.feedback != FeedbackSource::LastCommand {
            warn!("set_pose ignored with telemetry feedback");
            return false;
        }
        if self.shut_down {
            return false;
        }
        for (joint, &deg) in self.joints.iter_mut().zip(degrees) {
            let result = joint.set_position(&mut self.transport, deg);
            if !result.is_success() {
                debug!(joint = joint.name(), ?result, "pose pinned without command");
            }
            joint.pin_q(deg);
        }
        true
    }

    pub fn joint_statuses(&self) -> Vec<JointStatus> {
        self.joints.iter().map(Joint::status).collect()
    }

    // ─── Shutdown ───────────────────────────────────────────────────

    /// Disable every drive, then close the transport. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        let acknowledged = self.disable_joints();
        if let Err(e) = self.transport.shutdown() {
            warn!(error = %e, "transport shutdown failed");
        }
        self.shut_down = true;
        info!(acknowledged, "robot shut down");
    }
}

impl<T: Transport> Drop for Robot<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Transport> std::fmt::Debug for Robot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Robot")
            .field("transport", &self.transport.name())
            .field("joints", &self.joints)
            .field("feedback", &self.feedback)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exo_common::drive::ObjectEntry;
    use exo_common::robot::{LEFT_ANKLE, LEFT_KNEE, RIGHT_HIP};
    use exo_hal::SimulationTransport;

    fn sim_robot(config: &RobotConfig) -> Robot<SimulationTransport> {
        Robot::new(config, SimulationTransport::new()).unwrap()
    }

    #[test]
    fn position_control_enables_every_drive() {
        let mut robot = sim_robot(&RobotConfig::default());
        assert!(robot.initialise_network());
        assert!(robot.init_position_control());
        robot.update_robot();
        for joint in robot.joints() {
            assert_eq!(joint.drive().state(), DriveState::Enabled);
            assert_eq!(joint.drive().mode(), ControlMode::Position);
            assert!(joint.drive().protocol().is_continuous());
        }
        assert!(!robot.has_fault());
    }

    #[test]
    fn telemetry_replaces_placeholders() {
        let mut robot = sim_robot(&RobotConfig::default());
        let before = robot.joint_states();
        assert_eq!(before[LEFT_ANKLE], 85.0);

        robot.initialise_network();
        robot.init_position_control();
        assert_eq!(robot.set_position(LEFT_KNEE, 45.0), MovementResult::Success);
        robot.update_robot();

        let after = robot.joint_states();
        assert!((after[LEFT_KNEE] - 45.0).abs() < 1e-3);
        assert_eq!(robot.set_position(42, 0.0), MovementResult::Unknown);
    }

    #[test]
    fn unreachable_node_fails_bring_up() {
        let mut config = RobotConfig::default();
        config.simulation.unacknowledged_nodes = vec![3];
        let mut robot = sim_robot(&config);
        assert!(!robot.initialise_network());
        assert!(!robot.init_position_control());
        assert_eq!(
            robot.joint(RIGHT_HIP).unwrap().drive().state(),
            DriveState::Disabled
        );
    }

    #[test]
    fn fault_is_detected_and_recovered() {
        let mut robot = sim_robot(&RobotConfig::default());
        robot.initialise_network();
        robot.init_position_control();
        assert!(robot.transport_mut().inject_fault(2, 0x7300));
        robot.update_robot();
        assert!(robot.has_fault());

        assert!(robot.init_position_control());
        robot.update_robot();
        assert!(!robot.has_fault());
    }

    #[test]
    fn bit_flip_latches_on_alternate_calls() {
        let mut robot = sim_robot(&RobotConfig::default());
        robot.init_position_control();
        assert_eq!(robot.bit_flip(), robot.num_joints());
        assert_eq!(robot.bit_flip(), 0);
    }

    #[test]
    fn set_pose_requires_command_feedback() {
        let mut robot = sim_robot(&RobotConfig::default());
        assert!(!robot.set_pose(&[180.0, 0.0, 180.0, 0.0, 90.0, 90.0]));

        let mut config = RobotConfig::default();
        config.control.feedback = FeedbackSource::LastCommand;
        let mut virtual_robot = sim_robot(&config);
        assert!(virtual_robot.set_pose(&[180.0, 0.0, 180.0, 0.0, 90.0, 90.0]));
        assert_eq!(
            virtual_robot.joint_states().as_slice(),
            &[180.0, 0.0, 180.0, 0.0, 90.0, 90.0]
        );
    }

    #[test]
    fn nothing_is_sent_after_shutdown() {
        let mut robot = sim_robot(&RobotConfig::default());
        robot.init_position_control();
        robot.shutdown();
        assert!(robot.is_shut_down());
        assert_eq!(robot.set_position(LEFT_KNEE, 10.0), MovementResult::Unknown);
        assert!(!robot.init_position_control());
        assert_eq!(robot.transport().read_entry(2, ObjectEntry::StatusWord), None);
        robot.shutdown();
    }
}
