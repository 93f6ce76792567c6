//! Gait phase state machine.
//!
//! The [`GaitDispatcher`] owns the robot, the trajectory generator and the
//! executor, and runs one phase at a time:
//!
//! ```text
//! Init          ──go─────────▶ Standing
//! Standing      ──go(walk)───▶ SteppingFirstLeft ──▶ LeftForward
//! LeftForward   ──go(walk)───▶ SteppingRight     ──▶ RightForward
//! RightForward  ──go(walk)───▶ SteppingLeft      ──▶ LeftForward
//! LeftForward   ──go(feet)───▶ SteppingLastRight ──▶ Standing
//! RightForward  ──go(feet)───▶ SteppingLastLeft  ──▶ Standing
//! Standing      ──go(sit)────▶ SittingDown       ──▶ Sitting
//! Sitting       ──go(stand)──▶ StandingUp        ──▶ Standing
//! ```
//!
//! Any fault ends in `Error`, except mid-step where the feet are brought
//! together first. `Error` and `Test` return to `Init` on reset.

pub mod context;
pub mod dispatcher;
pub mod phase;

pub use context::ControlContext;
pub use dispatcher::{GaitDispatcher, GaitEvent, next_phase};
pub use phase::{PhaseKind, PhaseSignal};
