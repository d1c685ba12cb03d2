//! `SafetyCore`: the context handle owning the safety subsystems.
//!
//! Explicitly owned state passed through one handle — no file-scope
//! statics. All mutation funnels through [`SafetyCore::poll`],
//! [`SafetyCore::trigger`] and [`SafetyCore::request_reset`], so the
//! trigger path and the periodic monitor cannot tear each other's
//! updates; on a preemptive target these three are the only sections that
//! need the global-interrupt-disable guard.

use crate::estop::{EmergencyStop, ResetResult, SafetyOutputs, SafetyState, TriggerSource};
use crate::interrupt::InterruptTable;
use crate::monitor::{FaultMonitor, FaultRecord, MonitorSample};
use crate::watchdog::{WatchdogManager, WatchdogStats, WatchdogVerdict};
use dax_common::config::SafetyConfig;
use dax_common::error::{HalError, HalResult};
use dax_common::hal::{DigitalIo, PinId};
use tracing::info;

/// Inputs sampled by the caller and handed to [`SafetyCore::poll`].
///
/// The sample must be no older than one tick period.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyInputs {
    /// Emergency-button level (asserted = pressed).
    pub button_pressed: bool,
    /// Driver/encoder/communication health snapshot.
    pub sample: MonitorSample,
}

/// [`SafetyOutputs`] over two digital pins of any HAI adapter.
pub struct PinSafetyOutputs<'a, D: DigitalIo> {
    io: &'a mut D,
    power_pin: PinId,
    indicator_pin: PinId,
}

impl<'a, D: DigitalIo> PinSafetyOutputs<'a, D> {
    /// Bind the motor-power and fault-indicator pins.
    pub fn new(io: &'a mut D, power_pin: PinId, indicator_pin: PinId) -> Self {
        Self {
            io,
            power_pin,
            indicator_pin,
        }
    }
}

impl<D: DigitalIo> SafetyOutputs for PinSafetyOutputs<'_, D> {
    fn cut_motor_power(&mut self) -> HalResult<()> {
        self.io.write(self.power_pin, false)
    }

    fn set_fault_indicator(&mut self, on: bool) -> HalResult<()> {
        self.io.write(self.indicator_pin, on)
    }
}

/// The safety core: emergency stop + fault monitor + watchdog manager.
pub struct SafetyCore {
    estop: EmergencyStop,
    monitor: FaultMonitor,
    watchdog: WatchdogManager,
    initialized: bool,
    prev_button: bool,
}

impl SafetyCore {
    /// Create an uninitialized core from configuration.
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            estop: EmergencyStop::new(config.reset_cooldown_ms),
            monitor: FaultMonitor::new(config.monitor_interval_ms),
            watchdog: WatchdogManager::new(),
            initialized: false,
            prev_button: false,
        }
    }

    /// Initialize: validate the interrupt table, arm the watchdog, arm the
    /// emergency stop.
    ///
    /// A table violation aborts initialization; nothing is armed.
    pub fn init(
        &mut self,
        table: &InterruptTable,
        config: &SafetyConfig,
        now_ms: u64,
    ) -> HalResult<()> {
        table.validate()?;
        self.watchdog.init(&config.watchdog, now_ms)?;
        self.estop.arm()?;
        self.initialized = true;
        info!("safety core initialized");
        Ok(())
    }

    /// Current safety state.
    pub fn state(&self) -> SafetyState {
        self.estop.state()
    }

    /// True while the emergency stop is asserted in any form.
    pub fn is_active(&self) -> bool {
        self.estop.is_active()
    }

    /// Number of accepted triggers since init.
    pub fn trigger_count(&self) -> u32 {
        self.estop.trigger_count()
    }

    /// Most recent trigger source.
    pub fn last_trigger_source(&self) -> Option<TriggerSource> {
        self.estop.last_source()
    }

    /// One safety evaluation pass.
    ///
    /// Order matters: the button edge is the most urgent trigger and runs
    /// first, then the watchdog deadline, then the periodic fault monitor
    /// (at its own interval). Returns the resulting state.
    pub fn poll(
        &mut self,
        inputs: &SafetyInputs,
        outputs: &mut dyn SafetyOutputs,
        now_ms: u64,
    ) -> HalResult<SafetyState> {
        if !self.initialized {
            return Err(HalError::NotInitialized("safety core"));
        }

        let button_edge = inputs.button_pressed && !self.prev_button;
        self.prev_button = inputs.button_pressed;
        if button_edge {
            self.estop.trigger(TriggerSource::Button, outputs, now_ms)?;
        }

        if self.watchdog.check(now_ms) == WatchdogVerdict::Expired {
            self.estop
                .trigger(TriggerSource::Watchdog, outputs, now_ms)?;
        }

        if self.monitor.due(now_ms) {
            if let Some(source) = self.monitor.poll(&inputs.sample, now_ms) {
                self.estop.trigger(source, outputs, now_ms)?;
            }
        }

        Ok(self.estop.state())
    }

    /// Explicit trigger (software request or escalation from outside the
    /// monitored surfaces).
    pub fn trigger(
        &mut self,
        source: TriggerSource,
        outputs: &mut dyn SafetyOutputs,
        now_ms: u64,
    ) -> HalResult<()> {
        self.estop.trigger(source, outputs, now_ms)
    }

    /// Request an emergency-stop reset.
    ///
    /// The trigger condition is re-validated from live inputs: a button
    /// that is still pressed keeps the system in `ResetPending`.
    pub fn request_reset(
        &mut self,
        inputs: &SafetyInputs,
        outputs: &mut dyn SafetyOutputs,
        now_ms: u64,
    ) -> HalResult<ResetResult> {
        self.estop
            .request_reset(!inputs.button_pressed, outputs, now_ms)
    }

    /// Refresh the watchdog.
    pub fn refresh_watchdog(&mut self, now_ms: u64) -> HalResult<()> {
        self.watchdog.refresh(now_ms)
    }

    /// Watchdog audit counters.
    pub fn watchdog_stats(&self) -> WatchdogStats {
        self.watchdog.statistics()
    }

    /// Milliseconds until the next watchdog refresh is due.
    pub fn time_until_refresh(&self, now_ms: u64) -> u64 {
        self.watchdog.time_until_refresh(now_ms)
    }

    /// Fault log, oldest first.
    pub fn fault_log(&self) -> impl Iterator<Item = &FaultRecord> {
        self.monitor.records()
    }

    /// Power-cycle-equivalent reinitialization: the only way out of the
    /// terminal `Fault` state. Requires a fresh [`Self::init`].
    pub fn reinitialize(&mut self) {
        self.estop.reinitialize();
        self.watchdog.disarm();
        self.initialized = false;
        self.prev_button = false;
    }
}
