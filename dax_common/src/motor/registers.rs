//! Driver register map and per-register legal ranges.
//!
//! Raw values are stored as `u32`. Signed registers (`ABS_POS`, `MARK`)
//! are encoded two's-complement in 22 bits, as common serial stepper
//! drivers do. Writes are validated against [`REGISTER_TABLE`] before
//! being applied; an illegal write is rejected and never partially
//! applied.

use crate::consts::REGISTER_FILE_CAPACITY;
use heapless::FnvIndexMap;

/// Current absolute position, 22-bit two's complement (read/write).
pub const ABS_POS: u8 = 0x01;
/// Position mark, 22-bit two's complement (read/write).
pub const MARK: u8 = 0x03;
/// Current speed in steps/s, rounded (read-only).
pub const SPEED: u8 = 0x04;
/// Acceleration in steps/s² (read/write).
pub const ACC: u8 = 0x05;
/// Deceleration in steps/s² (read/write).
pub const DEC: u8 = 0x06;
/// Maximum speed in steps/s (read/write).
pub const MAX_SPEED: u8 = 0x07;
/// Minimum speed in steps/s (read/write).
pub const MIN_SPEED: u8 = 0x08;
/// Device configuration word (read/write).
pub const CONFIG: u8 = 0x18;
/// Status word (read-only; reading clears edge-triggered bits).
pub const STATUS: u8 = 0x19;

/// Mask of the 22-bit position registers.
pub const POSITION_MASK: u32 = 0x003F_FFFF;

/// Fixed-size map from register address to raw value.
pub type RegisterFile = FnvIndexMap<u8, u32, REGISTER_FILE_CAPACITY>;

/// Width, mutability and legal range of one register.
#[derive(Debug, Clone, Copy)]
pub struct RegisterSpec {
    /// Register address.
    pub addr: u8,
    /// Value width in bits.
    pub bits: u8,
    /// Whether the host may write this register.
    pub writable: bool,
    /// Minimum legal raw value.
    pub min: u32,
    /// Maximum legal raw value.
    pub max: u32,
    /// Power-on value.
    pub reset: u32,
    /// Register name for logs.
    pub label: &'static str,
}

/// The full register map with per-register legal ranges.
pub const REGISTER_TABLE: [RegisterSpec; 9] = [
    RegisterSpec {
        addr: ABS_POS,
        bits: 22,
        writable: true,
        min: 0,
        max: POSITION_MASK,
        reset: 0,
        label: "ABS_POS",
    },
    RegisterSpec {
        addr: MARK,
        bits: 22,
        writable: true,
        min: 0,
        max: POSITION_MASK,
        reset: 0,
        label: "MARK",
    },
    RegisterSpec {
        addr: SPEED,
        bits: 20,
        writable: false,
        min: 0,
        max: 0x000F_FFFF,
        reset: 0,
        label: "SPEED",
    },
    RegisterSpec {
        addr: ACC,
        bits: 20,
        writable: true,
        min: 1,
        max: 1_000_000,
        reset: 1000,
        label: "ACC",
    },
    RegisterSpec {
        addr: DEC,
        bits: 20,
        writable: true,
        min: 1,
        max: 1_000_000,
        reset: 1000,
        label: "DEC",
    },
    RegisterSpec {
        addr: MAX_SPEED,
        bits: 17,
        writable: true,
        min: 1,
        max: 100_000,
        reset: 500,
        label: "MAX_SPEED",
    },
    RegisterSpec {
        addr: MIN_SPEED,
        bits: 14,
        writable: true,
        min: 0,
        max: 10_000,
        reset: 0,
        label: "MIN_SPEED",
    },
    RegisterSpec {
        addr: CONFIG,
        bits: 16,
        writable: true,
        min: 0,
        max: 0xFFFF,
        reset: 0x2E88,
        label: "CONFIG",
    },
    RegisterSpec {
        addr: STATUS,
        bits: 16,
        writable: false,
        min: 0,
        max: 0xFFFF,
        reset: 0,
        label: "STATUS",
    },
];

/// Look up the spec for a register address.
pub fn spec(addr: u8) -> Option<&'static RegisterSpec> {
    REGISTER_TABLE.iter().find(|s| s.addr == addr)
}

/// Encode a signed step position into 22-bit two's complement.
#[inline]
pub const fn encode_position(position: i32) -> u32 {
    (position as u32) & POSITION_MASK
}

/// Decode a 22-bit two's-complement raw value into a signed position.
#[inline]
pub const fn decode_position(raw: u32) -> i32 {
    let raw = raw & POSITION_MASK;
    if raw & 0x0020_0000 != 0 {
        (raw | !POSITION_MASK) as i32
    } else {
        raw as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lookup() {
        assert_eq!(spec(ACC).unwrap().label, "ACC");
        assert!(spec(0x7F).is_none());
    }

    #[test]
    fn test_status_is_read_only() {
        assert!(!spec(STATUS).unwrap().writable);
        assert!(!spec(SPEED).unwrap().writable);
    }

    #[test]
    fn test_position_encoding_round_trip() {
        for pos in [0, 1, -1, 1000, -1000, 2_097_151, -2_097_152] {
            assert_eq!(decode_position(encode_position(pos)), pos);
        }
    }

    #[test]
    fn test_table_ranges_fit_width() {
        for s in &REGISTER_TABLE {
            let width_max = if s.bits >= 32 {
                u32::MAX
            } else {
                (1u32 << s.bits) - 1
            };
            assert!(s.max <= width_max, "{} range exceeds width", s.label);
            assert!(s.min <= s.max, "{} min above max", s.label);
            assert!(
                s.reset >= s.min && s.reset <= s.max,
                "{} reset outside range",
                s.label
            );
        }
    }
}
