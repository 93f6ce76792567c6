//! Shared control context read and written by every phase.

use crate::input::OperatorIntent;
use exo_common::gait::RobotMode;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlContext {
    /// Motion being executed.
    pub current_motion: RobotMode,
    /// Motion the operator picked for the next go.
    pub next_motion: RobotMode,
    pub go: bool,
    /// Go must be released once before it can start another motion.
    pub reset_armed: bool,
    pub reset_requested: bool,
    pub test_requested: bool,
}

impl Default for ControlContext {
    fn default() -> Self {
        Self {
            current_motion: RobotMode::Initial,
            next_motion: RobotMode::Initial,
            go: false,
            reset_armed: false,
            reset_requested: false,
            test_requested: false,
        }
    }
}

impl ControlContext {
    pub fn apply_intent(&mut self, intent: &OperatorIntent) {
        self.go = intent.go;
        self.reset_requested = intent.reset;
        self.test_requested = intent.test;
        if let Some(mode) = intent.selected {
            if mode != self.next_motion {
                info!(from = self.next_motion.label(), to = mode.label(), "next motion changed");
                self.next_motion = mode;
            }
        }
    }

    /// Adopt the operator's selection while no motion is running.
    pub fn track_selection(&mut self) {
        if self.current_motion != self.next_motion {
            info!(
                from = self.current_motion.label(),
                to = self.next_motion.label(),
                "current motion changed"
            );
            self.current_motion = self.next_motion;
        }
    }

    /// Go asserted and armed.
    #[inline]
    pub fn go_triggered(&self) -> bool {
        self.go && self.reset_armed
    }

    /// A motion start used up this go press.
    pub fn consume_go(&mut self) {
        self.reset_armed = false;
    }

    /// Re-arm once go is released.
    pub fn rearm(&mut self) {
        if !self.go && !self.reset_armed {
            self.reset_armed = true;
            debug!("go re-armed");
        }
    }
}
