//! Stepper-driver protocol types.
//!
//! Logical register map, command set and status-flag semantics shared by
//! the simulation engine and any real-silicon adapter. This is the
//! protocol any implementation must reproduce, not a bit-exact copy of a
//! specific device's register map.
//!
//! - [`command`] - Motion command set and wire opcodes
//! - [`registers`] - Register addresses and per-register legal ranges
//! - [`status`] - Status bitflags, motion phase and fault kinds

pub mod command;
pub mod registers;
pub mod status;

pub use command::{Direction, MotionCommand};
pub use registers::{RegisterFile, RegisterSpec};
pub use status::{FaultKind, MotionPhase, MotorStatus};
