//! Digital pin bank simulator.
//!
//! Pins must be configured before use; access to an unconfigured pin is
//! rejected `NotInitialized`, never silently defaulted. The world side of
//! an input pin (e.g. the emergency button) is driven through
//! [`IoSimulator::set_input`].

use dax_common::error::{HalError, HalResult};
use dax_common::hal::{PinEdge, PinId, PinMode};
use tracing::{debug, trace};

/// Number of simulated pins.
pub const PIN_COUNT: usize = 16;

#[derive(Debug, Clone, Copy)]
struct PinState {
    mode: PinMode,
    level: bool,
    interrupt: Option<PinEdge>,
}

/// Digital pin bank.
pub struct IoSimulator {
    pins: [Option<PinState>; PIN_COUNT],
}

impl IoSimulator {
    /// Create a bank with all pins unconfigured.
    pub fn new() -> Self {
        Self {
            pins: [None; PIN_COUNT],
        }
    }

    /// Configure a pin.
    pub fn configure(&mut self, pin: PinId, mode: PinMode) -> HalResult<()> {
        let slot = self
            .pins
            .get_mut(usize::from(pin))
            .ok_or(HalError::InvalidParameter("pin index"))?;
        let level = matches!(mode, PinMode::InputPullUp);
        *slot = Some(PinState {
            mode,
            level,
            interrupt: None,
        });
        debug!("pin {pin} configured as {mode:?}");
        Ok(())
    }

    /// Read the current level of a configured pin.
    pub fn read(&self, pin: PinId) -> HalResult<bool> {
        Ok(self.get(pin)?.level)
    }

    /// Drive a configured output pin.
    pub fn write(&mut self, pin: PinId, level: bool) -> HalResult<()> {
        let state = self.get_mut(pin)?;
        if !is_output(state.mode) {
            return Err(HalError::InvalidParameter("pin not an output"));
        }
        state.level = level;
        trace!("pin {pin} <- {level}");
        Ok(())
    }

    /// Invert a configured output pin.
    pub fn toggle(&mut self, pin: PinId) -> HalResult<()> {
        let state = self.get_mut(pin)?;
        if !is_output(state.mode) {
            return Err(HalError::InvalidParameter("pin not an output"));
        }
        state.level = !state.level;
        Ok(())
    }

    /// Enable edge interrupts on a configured input pin.
    pub fn enable_interrupt(&mut self, pin: PinId, edge: PinEdge) -> HalResult<()> {
        let state = self.get_mut(pin)?;
        if is_output(state.mode) {
            return Err(HalError::InvalidParameter("pin not an input"));
        }
        state.interrupt = Some(edge);
        Ok(())
    }

    /// Drive the world side of a configured input pin.
    pub fn set_input(&mut self, pin: PinId, level: bool) -> HalResult<()> {
        let state = self.get_mut(pin)?;
        if is_output(state.mode) {
            return Err(HalError::InvalidParameter("pin not an input"));
        }
        state.level = level;
        trace!("pin {pin} (world) <- {level}");
        Ok(())
    }

    fn get(&self, pin: PinId) -> HalResult<&PinState> {
        self.pins
            .get(usize::from(pin))
            .ok_or(HalError::InvalidParameter("pin index"))?
            .as_ref()
            .ok_or(HalError::NotInitialized("pin"))
    }

    fn get_mut(&mut self, pin: PinId) -> HalResult<&mut PinState> {
        self.pins
            .get_mut(usize::from(pin))
            .ok_or(HalError::InvalidParameter("pin index"))?
            .as_mut()
            .ok_or(HalError::NotInitialized("pin"))
    }
}

impl Default for IoSimulator {
    fn default() -> Self {
        Self::new()
    }
}

const fn is_output(mode: PinMode) -> bool {
    matches!(mode, PinMode::Output | PinMode::OutputOpenDrain)
}
