//! Motor status flags, motion phase and fault kinds.
//!
//! The status word is a derived view: it is recomputed every tick from the
//! motion phase, direction and active fault, plus the latched
//! edge-triggered bits. It is never hand-set anywhere else, so the bitset
//! and the enum state cannot drift apart.

use bitflags::bitflags;

bitflags! {
    /// Driver status word.
    ///
    /// `WRONG_CMD` is edge-triggered: it latches on an unrecognized opcode
    /// and clears on a status read. The fault bits mirror the active fault
    /// and clear only when the fault itself is cleared.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MotorStatus: u16 {
        /// Power stage released (high impedance).
        const HIZ          = 0x0001;
        /// Motion in progress.
        const BUSY         = 0x0002;
        /// Direction bit (set = forward).
        const DIR          = 0x0010;
        /// Velocity ramping up.
        const ACCELERATING = 0x0020;
        /// Cruising at target speed.
        const CONST_SPEED  = 0x0040;
        /// Velocity ramping down.
        const DECELERATING = 0x0080;
        /// Unrecognized command received. Edge-triggered.
        const WRONG_CMD    = 0x0100;
        /// Supply undervoltage.
        const UVLO         = 0x0200;
        /// Thermal warning.
        const TH_WRN       = 0x0400;
        /// Overcurrent detected.
        const OCD          = 0x0800;
        /// Stall detected.
        const STALL        = 0x1000;
    }
}

impl MotorStatus {
    /// Mask of all fault bits.
    pub const FAULT_MASK: Self = Self::from_bits_truncate(
        Self::UVLO.bits() | Self::TH_WRN.bits() | Self::OCD.bits() | Self::STALL.bits(),
    );

    /// Mask of edge-triggered bits cleared by a status read.
    pub const EDGE_MASK: Self = Self::from_bits_truncate(Self::WRONG_CMD.bits());

    /// Returns true if any fault bit is set.
    #[inline]
    pub const fn has_fault(&self) -> bool {
        self.intersects(Self::FAULT_MASK)
    }
}

impl Default for MotorStatus {
    fn default() -> Self {
        Self::empty()
    }
}

/// Trapezoidal-profile state of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionPhase {
    /// Velocity held at zero.
    #[default]
    Stopped,
    /// Velocity increasing toward target speed.
    Accelerating,
    /// Velocity held at target speed.
    ConstantSpeed,
    /// Velocity decreasing toward zero.
    Decelerating,
}

impl MotionPhase {
    /// The status bit contributed by this phase.
    pub const fn flag(self) -> MotorStatus {
        match self {
            MotionPhase::Stopped => MotorStatus::empty(),
            MotionPhase::Accelerating => MotorStatus::ACCELERATING,
            MotionPhase::ConstantSpeed => MotorStatus::CONST_SPEED,
            MotionPhase::Decelerating => MotorStatus::DECELERATING,
        }
    }

    /// An axis is busy iff it is not stopped.
    #[inline]
    pub const fn is_busy(self) -> bool {
        !matches!(self, MotionPhase::Stopped)
    }
}

/// Injectable driver fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Phase overcurrent.
    Overcurrent,
    /// Bridge thermal warning.
    Overheat,
    /// Supply undervoltage.
    Undervoltage,
    /// Rotor stall.
    Stall,
}

impl FaultKind {
    /// The status bit mirroring this fault.
    pub const fn flag(self) -> MotorStatus {
        match self {
            FaultKind::Overcurrent => MotorStatus::OCD,
            FaultKind::Overheat => MotorStatus::TH_WRN,
            FaultKind::Undervoltage => MotorStatus::UVLO,
            FaultKind::Stall => MotorStatus::STALL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_flags_are_disjoint() {
        let phases = [
            MotionPhase::Accelerating,
            MotionPhase::ConstantSpeed,
            MotionPhase::Decelerating,
        ];
        for (i, a) in phases.iter().enumerate() {
            for b in &phases[i + 1..] {
                assert!((a.flag() & b.flag()).is_empty());
            }
        }
        assert!(MotionPhase::Stopped.flag().is_empty());
    }

    #[test]
    fn test_busy_iff_not_stopped() {
        assert!(!MotionPhase::Stopped.is_busy());
        assert!(MotionPhase::Accelerating.is_busy());
        assert!(MotionPhase::ConstantSpeed.is_busy());
        assert!(MotionPhase::Decelerating.is_busy());
    }

    #[test]
    fn test_fault_bits_in_fault_mask() {
        for fault in [
            FaultKind::Overcurrent,
            FaultKind::Overheat,
            FaultKind::Undervoltage,
            FaultKind::Stall,
        ] {
            assert!(MotorStatus::FAULT_MASK.contains(fault.flag()));
        }
    }

    #[test]
    fn test_wrong_cmd_is_edge_triggered() {
        assert!(MotorStatus::EDGE_MASK.contains(MotorStatus::WRONG_CMD));
        assert!(!MotorStatus::EDGE_MASK.intersects(MotorStatus::FAULT_MASK));
    }
}
