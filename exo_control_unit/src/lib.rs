//! # EXO Control Unit Library
//!
//! Control kernel for a lower-limb exoskeleton. Each tick reads operator
//! intent and drive feedback, advances the gait phase state machine and
//! streams joint set points to the drives over a fieldbus transport.
//!
//! ## Layers
//!
//! 1. **Drive**: CiA 402 state machine per actuator ([`drive`])
//! 2. **Joint**: degrees ↔ drive counts with limit checks ([`joint`])
//! 3. **Robot**: the joint set on one transport ([`robot`])
//! 4. **Trajectory**: generator plus time-scaled executor ([`trajectory`])
//! 5. **Gait**: phase state machine and dispatcher ([`gait`])
//!
//! [`cycle`] paces the ticks; [`input`] turns key states into intent.

pub mod config;
pub mod cycle;
pub mod drive;
pub mod gait;
pub mod input;
pub mod joint;
pub mod robot;
pub mod trajectory;
