//! Prelude module for common re-exports.
//!
//! # Usage
//!
//! ```rust
//! use dax_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, RigConfig, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_TICK_MS, ENCODER_COUNTS, MAX_AXES};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{HalError, HalResult};

// ─── HAI capabilities ───────────────────────────────────────────────
pub use crate::hal::{
    AddressedBus, DigitalIo, MonotonicClock, PinEdge, PinId, PinMode, RegisterBus, SystemControl,
    TimerControl, WatchdogHw,
};

// ─── Driver protocol ────────────────────────────────────────────────
pub use crate::motor::{Direction, FaultKind, MotionCommand, MotionPhase, MotorStatus};

// ─── Encoder protocol ───────────────────────────────────────────────
pub use crate::encoder::{MagnetStatus, MotionPattern};
