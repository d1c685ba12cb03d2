//! `SimPlatform`: the simulated HAI adapter.
//!
//! Satisfies every capability trait of `dax_common::hal` by delegating to
//! the engines in [`crate::sim`] instead of touching physical registers.
//! Control and safety code written against the traits cannot tell this
//! adapter from the real-hardware one.

use crate::rig::SimRig;
use crate::sim::driver::FRAME_LEN;
use dax_common::encoder::registers as enc_reg;
use dax_common::error::{HalError, HalResult};
use dax_common::hal::{
    AddressedBus, DigitalIo, MonotonicClock, PinEdge, PinId, PinMode, RegisterBus, SystemControl,
    TimerControl, TimerId, WatchdogHw,
};
use tracing::{debug, info};

/// Number of simulated timer slots.
pub const TIMER_COUNT: usize = 4;

/// Addressed-bus device address of the axis-0 encoder; axis N lives at
/// `ENCODER_DEVICE_BASE + N`.
pub const ENCODER_DEVICE_BASE: u8 = 0x36;

#[derive(Debug, Clone, Copy)]
struct TimerSlot {
    period_us: u32,
    running: bool,
    started_us: u64,
}

#[derive(Debug, Clone, Copy)]
struct WatchdogSlot {
    timeout_ms: u32,
    last_refresh_ms: u64,
}

/// Simulated platform adapter over a [`SimRig`].
pub struct SimPlatform {
    rig: SimRig,
    timers: [Option<TimerSlot>; TIMER_COUNT],
    watchdog: Option<WatchdogSlot>,
    interrupts_enabled: bool,
    reset_requested: bool,
}

impl SimPlatform {
    /// Wrap a rig in the HAI adapter.
    pub fn new(rig: SimRig) -> Self {
        Self {
            rig,
            timers: [None; TIMER_COUNT],
            watchdog: None,
            interrupts_enabled: true,
            reset_requested: false,
        }
    }

    /// The underlying rig.
    pub fn rig(&self) -> &SimRig {
        &self.rig
    }

    /// The underlying rig, mutable (fault injection, world-side inputs).
    pub fn rig_mut(&mut self) -> &mut SimRig {
        &mut self.rig
    }

    /// Advance the rig; see [`SimRig::advance`].
    pub fn advance(&mut self, delta_ms: u32) {
        self.rig.advance(delta_ms);
    }

    /// Whether interrupt dispatch is currently enabled.
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Whether a process reset has been requested.
    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// True when the hardware watchdog deadline has been blown.
    pub fn watchdog_expired(&self) -> bool {
        self.watchdog.is_some_and(|wd| {
            self.rig.now_ms().saturating_sub(wd.last_refresh_ms) > u64::from(wd.timeout_ms)
        })
    }

    fn timer_slot(&self, timer: TimerId) -> HalResult<&TimerSlot> {
        self.timers
            .get(usize::from(timer))
            .ok_or(HalError::InvalidParameter("timer index"))?
            .as_ref()
            .ok_or(HalError::NotInitialized("timer"))
    }

    fn timer_slot_mut(&mut self, timer: TimerId) -> HalResult<&mut TimerSlot> {
        self.timers
            .get_mut(usize::from(timer))
            .ok_or(HalError::InvalidParameter("timer index"))?
            .as_mut()
            .ok_or(HalError::NotInitialized("timer"))
    }
}

impl DigitalIo for SimPlatform {
    fn configure(&mut self, pin: PinId, mode: PinMode) -> HalResult<()> {
        self.rig.io_mut().configure(pin, mode)
    }

    fn read(&self, pin: PinId) -> HalResult<bool> {
        self.rig.io().read(pin)
    }

    fn write(&mut self, pin: PinId, level: bool) -> HalResult<()> {
        self.rig.io_mut().write(pin, level)
    }

    fn toggle(&mut self, pin: PinId) -> HalResult<()> {
        self.rig.io_mut().toggle(pin)
    }

    fn enable_interrupt(&mut self, pin: PinId, edge: PinEdge) -> HalResult<()> {
        self.rig.io_mut().enable_interrupt(pin, edge)
    }
}

impl RegisterBus for SimPlatform {
    fn exchange(
        &mut self,
        select: u8,
        tx: &[u8],
        rx: &mut [u8],
        timeout_ms: u32,
    ) -> HalResult<()> {
        if timeout_ms == 0 {
            return Err(HalError::InvalidParameter("zero timeout"));
        }
        if tx.len() != rx.len() || tx.len() != FRAME_LEN {
            return Err(HalError::InvalidParameter("frame length"));
        }
        self.rig
            .motor_mut(usize::from(select))?
            .handle_frame(tx, rx)
    }
}

impl AddressedBus for SimPlatform {
    fn read_bytes(&mut self, device: u8, buf: &mut [u8], timeout_ms: u32) -> HalResult<()> {
        // Pointer-less read starts at the filtered angle.
        self.read_reg(device, enc_reg::ANGLE_H, buf, timeout_ms)
    }

    fn write_bytes(&mut self, _device: u8, _buf: &[u8], _timeout_ms: u32) -> HalResult<()> {
        Err(HalError::InvalidParameter("encoder registers are read-only"))
    }

    fn read_reg(&mut self, device: u8, reg: u8, buf: &mut [u8], timeout_ms: u32) -> HalResult<()> {
        if timeout_ms == 0 {
            return Err(HalError::InvalidParameter("zero timeout"));
        }
        let axis = device
            .checked_sub(ENCODER_DEVICE_BASE)
            .ok_or(HalError::InvalidParameter("device address"))?;
        let encoder = self.rig.encoder(usize::from(axis))?;

        // Sequential read with register auto-increment.
        for (offset, byte) in buf.iter_mut().enumerate() {
            let addr = reg
                .checked_add(offset as u8)
                .ok_or(HalError::InvalidParameter("register overflow"))?;
            *byte = encoder.read_register(addr)?;
        }
        Ok(())
    }

    fn write_reg(
        &mut self,
        _device: u8,
        _reg: u8,
        _buf: &[u8],
        _timeout_ms: u32,
    ) -> HalResult<()> {
        Err(HalError::InvalidParameter("encoder registers are read-only"))
    }
}

impl TimerControl for SimPlatform {
    fn timer_init(&mut self, timer: TimerId, period_us: u32) -> HalResult<()> {
        if period_us == 0 {
            return Err(HalError::InvalidParameter("zero timer period"));
        }
        let slot = self
            .timers
            .get_mut(usize::from(timer))
            .ok_or(HalError::InvalidParameter("timer index"))?;
        *slot = Some(TimerSlot {
            period_us,
            running: false,
            started_us: 0,
        });
        debug!("timer {timer} configured: period {period_us} us");
        Ok(())
    }

    fn timer_start(&mut self, timer: TimerId) -> HalResult<()> {
        let now_us = self.rig.clock().now_us();
        let slot = self.timer_slot_mut(timer)?;
        slot.running = true;
        slot.started_us = now_us;
        Ok(())
    }

    fn timer_stop(&mut self, timer: TimerId) -> HalResult<()> {
        self.timer_slot_mut(timer)?.running = false;
        Ok(())
    }

    fn timer_read(&self, timer: TimerId) -> HalResult<u32> {
        let slot = self.timer_slot(timer)?;
        if !slot.running {
            return Ok(0);
        }
        let elapsed = self.rig.clock().now_us().saturating_sub(slot.started_us);
        Ok((elapsed % u64::from(slot.period_us)) as u32)
    }
}

impl WatchdogHw for SimPlatform {
    fn watchdog_init(&mut self, timeout_ms: u32) -> HalResult<()> {
        if timeout_ms == 0 {
            return Err(HalError::InvalidParameter("zero watchdog timeout"));
        }
        self.watchdog = Some(WatchdogSlot {
            timeout_ms,
            last_refresh_ms: self.rig.now_ms(),
        });
        info!("hardware watchdog armed: {timeout_ms} ms");
        Ok(())
    }

    fn watchdog_refresh(&mut self) -> HalResult<()> {
        let now_ms = self.rig.now_ms();
        let wd = self
            .watchdog
            .as_mut()
            .ok_or(HalError::NotInitialized("watchdog"))?;
        wd.last_refresh_ms = now_ms;
        Ok(())
    }
}

impl MonotonicClock for SimPlatform {
    fn now_ms(&self) -> u64 {
        self.rig.clock().now_ms()
    }

    fn now_us(&self) -> u64 {
        self.rig.clock().now_us()
    }
}

impl SystemControl for SimPlatform {
    fn disable_interrupts(&mut self) {
        self.interrupts_enabled = false;
    }

    fn enable_interrupts(&mut self) {
        self.interrupts_enabled = true;
    }

    fn reset(&mut self) -> HalResult<()> {
        info!("process reset requested");
        self.reset_requested = true;
        Ok(())
    }
}
