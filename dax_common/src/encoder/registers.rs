//! Encoder register map over the addressed bus.
//!
//! Logical map of a 12-bit magnetic absolute-angle sensor: angle and raw
//! angle split high/low, a magnet status byte, automatic gain control and
//! field magnitude. One byte per address.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Magnet status byte.
pub const STATUS: u8 = 0x0B;
/// Raw angle bits 11..8.
pub const RAW_ANGLE_H: u8 = 0x0C;
/// Raw angle bits 7..0.
pub const RAW_ANGLE_L: u8 = 0x0D;
/// Filtered angle bits 11..8.
pub const ANGLE_H: u8 = 0x0E;
/// Filtered angle bits 7..0.
pub const ANGLE_L: u8 = 0x0F;
/// Automatic gain control value.
pub const AGC: u8 = 0x1A;
/// Field magnitude bits 11..8.
pub const MAGNITUDE_H: u8 = 0x1B;
/// Field magnitude bits 7..0.
pub const MAGNITUDE_L: u8 = 0x1C;

bitflags! {
    /// Magnet status bits.
    ///
    /// Reflect the magnet health independently of the angle computation;
    /// settable externally for fault-injection tests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MagnetStatus: u8 {
        /// Magnet field too strong.
        const TOO_STRONG = 0x08;
        /// Magnet field too weak.
        const TOO_WEAK   = 0x10;
        /// Magnet detected.
        const DETECTED   = 0x20;
    }
}

impl Default for MagnetStatus {
    fn default() -> Self {
        Self::empty()
    }
}

/// Motion pattern driving the simulated angle.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MotionPattern {
    /// Angle unchanged.
    #[default]
    Static,
    /// Angle advances at a constant rate (pattern parameter in deg/s).
    Linear,
    /// Angle follows `amplitude · sin(2π·f_ref·t)` at the fixed reference
    /// frequency (pattern parameter is the amplitude in degrees).
    Sinusoidal,
}
