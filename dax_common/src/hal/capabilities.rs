//! HAI capability traits.
//!
//! Every operation returns a [`HalResult`](crate::error::HalResult)
//! distinguishing success from `NotInitialized`, `InvalidParameter`,
//! `Busy`, `Timeout` and `HardwareFailure`. No operation may silently
//! succeed when the requested resource was never configured.
//!
//! Bus operations carry an explicit timeout; none of them block — the
//! simulated adapter completes synchronously, a real adapter is expected
//! to bound its transfer time by the timeout.
//!
//! A platform adapter implements all of these traits on one type, so the
//! method names are kept globally unique.

use crate::error::HalResult;

/// Identifies a digital pin.
pub type PinId = u8;

/// Identifies a hardware timer slot.
pub type TimerId = u8;

/// Configuration mode for a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Floating input.
    Input,
    /// Input with internal pull-up.
    InputPullUp,
    /// Push-pull output.
    Output,
    /// Open-drain output.
    OutputOpenDrain,
}

/// Edge selection for pin interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEdge {
    /// Trigger on the rising edge.
    Rising,
    /// Trigger on the falling edge.
    Falling,
    /// Trigger on both edges.
    Both,
}

/// Digital I/O capability: configure, read, write, toggle, interrupt
/// enable.
pub trait DigitalIo {
    /// Configure a pin. Must be called before any other pin operation.
    fn configure(&mut self, pin: PinId, mode: PinMode) -> HalResult<()>;

    /// Read the current level of a configured pin.
    fn read(&self, pin: PinId) -> HalResult<bool>;

    /// Drive a configured output pin.
    fn write(&mut self, pin: PinId, level: bool) -> HalResult<()>;

    /// Invert a configured output pin.
    fn toggle(&mut self, pin: PinId) -> HalResult<()>;

    /// Enable edge interrupts on a configured input pin.
    fn enable_interrupt(&mut self, pin: PinId, edge: PinEdge) -> HalResult<()>;
}

/// Register-style serial bus (SPI-like), full-duplex exchange.
pub trait RegisterBus {
    /// Exchange a frame with the device on chip-select `select`.
    ///
    /// `tx` is clocked out while `rx` is filled; both slices must have the
    /// same length.
    fn exchange(&mut self, select: u8, tx: &[u8], rx: &mut [u8], timeout_ms: u32)
    -> HalResult<()>;
}

/// Byte-addressed bus (I2C-like), with or without a sub-address.
pub trait AddressedBus {
    /// Read raw bytes from a device, starting at its default pointer.
    fn read_bytes(&mut self, device: u8, buf: &mut [u8], timeout_ms: u32) -> HalResult<()>;

    /// Write raw bytes to a device.
    fn write_bytes(&mut self, device: u8, buf: &[u8], timeout_ms: u32) -> HalResult<()>;

    /// Read starting at a register sub-address, auto-incrementing.
    fn read_reg(&mut self, device: u8, reg: u8, buf: &mut [u8], timeout_ms: u32) -> HalResult<()>;

    /// Write starting at a register sub-address.
    fn write_reg(&mut self, device: u8, reg: u8, buf: &[u8], timeout_ms: u32) -> HalResult<()>;
}

/// Hardware timer capability.
pub trait TimerControl {
    /// Initialize a timer slot with the given period.
    fn timer_init(&mut self, timer: TimerId, period_us: u32) -> HalResult<()>;

    /// Start a configured timer.
    fn timer_start(&mut self, timer: TimerId) -> HalResult<()>;

    /// Stop a running timer.
    fn timer_stop(&mut self, timer: TimerId) -> HalResult<()>;

    /// Read the counter of a configured timer in microseconds.
    fn timer_read(&self, timer: TimerId) -> HalResult<u32>;
}

/// Hardware watchdog primitive.
///
/// This is the raw liveness device; policy (refresh cadence, statistics,
/// escalation) lives in `dax_safety`'s watchdog manager.
pub trait WatchdogHw {
    /// Arm the watchdog with a hard timeout.
    fn watchdog_init(&mut self, timeout_ms: u32) -> HalResult<()>;

    /// Refresh the watchdog. Must be called before the timeout elapses.
    fn watchdog_refresh(&mut self) -> HalResult<()>;
}

/// Monotonic time source.
pub trait MonotonicClock {
    /// Milliseconds since platform start.
    fn now_ms(&self) -> u64;

    /// Microseconds since platform start.
    fn now_us(&self) -> u64;
}

/// Process-wide control: interrupt masking and reset.
pub trait SystemControl {
    /// Globally disable interrupt dispatch (enter critical section).
    fn disable_interrupts(&mut self);

    /// Re-enable interrupt dispatch (leave critical section).
    fn enable_interrupts(&mut self);

    /// Request a process reset (power-cycle equivalent).
    fn reset(&mut self) -> HalResult<()>;
}
