//! System-wide constants for the DAX workspace.
//!
//! Single source of truth for numeric limits and defaults.
//! Imported by all crates — no duplication permitted.

use static_assertions::const_assert;

/// Number of controlled axes in a rig.
pub const MAX_AXES: usize = 2;

/// Encoder resolution in counts per revolution (12-bit sensor).
pub const ENCODER_COUNTS: u16 = 4096;

/// Default simulation tick period in milliseconds.
pub const DEFAULT_TICK_MS: u32 = 1;

/// Default fault-monitor poll interval in milliseconds.
pub const DEFAULT_MONITOR_INTERVAL_MS: u32 = 10;

/// Default emergency-stop reaction budget in milliseconds.
///
/// From trigger detection to the motor-power output being de-asserted.
pub const DEFAULT_REACTION_BUDGET_MS: u32 = 1;

/// Default watchdog timeout in milliseconds.
pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u32 = 1000;

/// Capacity of the fault monitor's circular log.
pub const FAULT_LOG_CAPACITY: usize = 64;

/// Capacity of a per-axis register file.
///
/// `heapless::FnvIndexMap` requires a power of two.
pub const REGISTER_FILE_CAPACITY: usize = 32;

/// Reference frequency for the encoder's sinusoidal test pattern [Hz].
pub const SINUSOIDAL_REF_FREQ_HZ: f64 = 0.25;

const_assert!(MAX_AXES >= 1 && MAX_AXES <= 8);
const_assert!(REGISTER_FILE_CAPACITY.is_power_of_two());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(ENCODER_COUNTS == 4096);
        assert!(DEFAULT_TICK_MS > 0);
        assert!(DEFAULT_MONITOR_INTERVAL_MS >= DEFAULT_TICK_MS);
        assert!(DEFAULT_WATCHDOG_TIMEOUT_MS > DEFAULT_MONITOR_INTERVAL_MS);
    }
}
