//! Simulation transport implementation.
//!
//! The `SimulationTransport` implements the `Transport` trait on top of a
//! set of [`VirtualDrive`]s, one per configured joint. Nodes listed in
//! `[simulation] unacknowledged_nodes` never answer, which lets tests and
//! bench runs exercise the protocol failure paths.

use super::node::{NmtState, VirtualDrive};
use exo_common::drive::{NodeId, ObjectEntry};
use exo_common::hal::command::{BusCommand, NmtCommand, SequencedCommand};
use exo_common::hal::transport::{Transport, TransportError};
use exo_common::robot::RobotConfig;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Command lines kept for inspection.
const HISTORY_CAPACITY: usize = 512;

/// Virtual fieldbus implementing the `Transport` trait.
pub struct SimulationTransport {
    name: &'static str,
    version: &'static str,
    initialized: bool,
    closed: bool,
    nodes: BTreeMap<NodeId, VirtualDrive>,
    unacknowledged: HashSet<NodeId>,
    history: VecDeque<String>,
    acknowledged_total: u64,
    rejected_total: u64,
}

impl SimulationTransport {
    /// Create an uninitialized transport with no nodes.
    pub fn new() -> Self {
        Self {
            name: "simulation",
            version: env!("CARGO_PKG_VERSION"),
            initialized: false,
            closed: false,
            nodes: BTreeMap::new(),
            unacknowledged: HashSet::new(),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            acknowledged_total: 0,
            rejected_total: 0,
        }
    }

    /// Create and initialize in one step.
    ///
    /// # Errors
    /// Same as [`Transport::init`].
    pub fn for_robot(config: &RobotConfig) -> Result<Self, TransportError> {
        let mut transport = Self::new();
        transport.init(config)?;
        Ok(transport)
    }

    /// Inspect one virtual drive.
    pub fn node(&self, node: NodeId) -> Option<&VirtualDrive> {
        self.nodes.get(&node)
    }

    /// Force a drive into FAULT. Returns `false` for unknown nodes.
    pub fn inject_fault(&mut self, node: NodeId, error_code: u16) -> bool {
        match self.nodes.get_mut(&node) {
            Some(drive) => {
                warn!(node, error_code, "injecting drive fault");
                drive.inject_fault(error_code);
                true
            }
            None => false,
        }
    }

    /// Toggle whether a node acknowledges commands.
    pub fn set_acknowledging(&mut self, node: NodeId, acknowledging: bool) {
        if acknowledging {
            self.unacknowledged.remove(&node);
        } else {
            self.unacknowledged.insert(node);
        }
    }

    /// Most recent command lines, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// (acknowledged, rejected) line counters since init.
    pub fn counters(&self) -> (u64, u64) {
        (self.acknowledged_total, self.rejected_total)
    }

    fn record(&mut self, line: &str) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(line.to_string());
    }

    /// Apply one line; `true` when acknowledged.
    fn apply_line(&mut self, line: &str) -> bool {
        let parsed = match line.parse::<SequencedCommand>() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(line, error = %e, "rejecting malformed command");
                return false;
            }
        };

        let node_id = parsed.command.node();
        if self.unacknowledged.contains(&node_id) {
            debug!(node = node_id, "node configured not to acknowledge");
            return false;
        }
        let Some(drive) = self.nodes.get_mut(&node_id) else {
            warn!(node = node_id, "command for unknown node");
            return false;
        };

        match parsed.command {
            BusCommand::Write {
                index, sub, value, ..
            } => drive.apply_write(index, sub, value),
            BusCommand::Nmt { command, .. } => match command {
                NmtCommand::Start => drive.set_nmt(NmtState::Operational),
                NmtCommand::PreOperational => drive.set_nmt(NmtState::PreOperational),
                NmtCommand::ResetNode => *drive = VirtualDrive::new(node_id),
            },
        }
        true
    }
}

impl Default for SimulationTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimulationTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn init(&mut self, config: &RobotConfig) -> Result<(), TransportError> {
        if config.joints.is_empty() {
            return Err(TransportError::InitFailed(
                "robot has no joints".to_string(),
            ));
        }

        self.nodes = config
            .joints
            .iter()
            .map(|joint| (joint.node_id, VirtualDrive::new(joint.node_id)))
            .collect();
        self.unacknowledged = config.simulation.unacknowledged_nodes.iter().copied().collect();
        self.history.clear();
        self.acknowledged_total = 0;
        self.rejected_total = 0;
        self.closed = false;
        self.initialized = true;

        info!(
            "Simulation transport initialized with {} nodes ({} unacknowledged)",
            self.nodes.len(),
            self.unacknowledged.len()
        );
        Ok(())
    }

    fn send(&mut self, batch: &[String]) -> usize {
        if !self.initialized || self.closed {
            warn!(lines = batch.len(), "send on inactive simulation transport");
            self.rejected_total += batch.len() as u64;
            return 0;
        }

        let mut acknowledged = 0;
        for line in batch {
            self.record(line);
            if self.apply_line(line) {
                acknowledged += 1;
            }
        }
        self.acknowledged_total += acknowledged as u64;
        self.rejected_total += (batch.len() - acknowledged) as u64;
        acknowledged
    }

    fn write_target(
        &mut self,
        node: NodeId,
        entry: ObjectEntry,
        value: i32,
    ) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.unacknowledged.contains(&node) {
            return Err(TransportError::NodeUnreachable(node));
        }
        let drive = self
            .nodes
            .get_mut(&node)
            .ok_or(TransportError::NodeUnreachable(node))?;
        drive.apply_write(entry.index(), 0, i64::from(value));
        Ok(())
    }

    fn read_entry(&self, node: NodeId, entry: ObjectEntry) -> Option<i32> {
        if self.closed || self.unacknowledged.contains(&node) {
            return None;
        }
        self.nodes.get(&node)?.read(entry)
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        info!(
            acknowledged = self.acknowledged_total,
            rejected = self.rejected_total,
            "Shutting down simulation transport"
        );
        self.closed = true;
        self.initialized = false;
        Ok(())
    }
}
