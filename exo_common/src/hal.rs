//! Hardware abstraction: the fieldbus transport seam.
//!
//! The control kernel never talks to a bus directly. Service data goes out
//! as [`command`] lines through [`transport::Transport`], implemented by the
//! backends in `exo_hal`.

pub mod command;
pub mod transport;
