//! Emergency-stop state machine.
//!
//! `Uninitialized → Armed` on successful init, `Armed → Triggered` on any
//! trigger source, `Triggered → ResetPending` only via an explicit reset
//! request, `ResetPending → Armed` only after re-validating that the
//! trigger condition is no longer asserted. `Fault` is terminal until a
//! power-cycle-equivalent reinitialization. No code path clears
//! `Triggered` silently.
//!
//! The trigger path de-asserts the motor-power output through
//! [`SafetyOutputs`] before any bookkeeping, so the reaction latency is
//! the latency of that single output write.

use dax_common::error::{HalError, HalResult};
use tracing::{error, info, warn};

/// System-wide emergency-stop lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyState {
    /// Not yet initialized; triggers are rejected.
    #[default]
    Uninitialized,
    /// Ready; motion permitted.
    Armed,
    /// Emergency stop active; motor power cut.
    Triggered,
    /// Reset requested, waiting for the trigger condition to clear.
    ResetPending,
    /// Internal contradiction; terminal until reinitialization.
    Fault,
}

/// What tripped the emergency stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Physical emergency button.
    Button,
    /// Explicit software request.
    Software,
    /// Communication-health escalation.
    Communication,
    /// Periodic safety monitor.
    SafetyMonitor,
    /// Driver fault classified critical.
    MotorFault,
    /// Encoder fault classified critical.
    EncoderFault,
    /// Watchdog deadline blown.
    Watchdog,
    /// Internal system fault.
    SystemFault,
}

/// Outcome of a reset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetResult {
    /// Trigger condition clear; system re-armed.
    Armed,
    /// Trigger condition still asserted; system stays in `ResetPending`.
    StillTriggered,
    /// Reset requested inside the post-trigger cooldown; state unchanged.
    TooSoon,
}

/// Safety-critical outputs driven by the trigger path.
///
/// Implementations must make `cut_motor_power` the cheapest possible
/// operation; it runs inside the trigger handler itself.
pub trait SafetyOutputs {
    /// De-assert the motor-power output.
    fn cut_motor_power(&mut self) -> HalResult<()>;

    /// Drive the fault-indicator output.
    fn set_fault_indicator(&mut self, on: bool) -> HalResult<()>;
}

/// The emergency-stop state machine.
#[derive(Debug)]
pub struct EmergencyStop {
    state: SafetyState,
    last_source: Option<TriggerSource>,
    trigger_count: u32,
    last_trigger_ms: u64,
    reset_cooldown_ms: u32,
}

impl EmergencyStop {
    /// Create an uninitialized state machine.
    pub const fn new(reset_cooldown_ms: u32) -> Self {
        Self {
            state: SafetyState::Uninitialized,
            last_source: None,
            trigger_count: 0,
            last_trigger_ms: 0,
            reset_cooldown_ms,
        }
    }

    /// Current state.
    #[inline]
    pub const fn state(&self) -> SafetyState {
        self.state
    }

    /// True while the emergency stop is asserted in any form.
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(
            self.state,
            SafetyState::Triggered | SafetyState::ResetPending | SafetyState::Fault
        )
    }

    /// Number of accepted trigger events since initialization.
    #[inline]
    pub const fn trigger_count(&self) -> u32 {
        self.trigger_count
    }

    /// The most recent trigger source.
    #[inline]
    pub const fn last_source(&self) -> Option<TriggerSource> {
        self.last_source
    }

    /// Timestamp of the most recent trigger.
    #[inline]
    pub const fn last_trigger_ms(&self) -> u64 {
        self.last_trigger_ms
    }

    /// Arm the system after init/self-test.
    ///
    /// Only valid from `Uninitialized`; `Fault` stays terminal and an
    /// already-armed or triggered system is left untouched.
    pub fn arm(&mut self) -> HalResult<()> {
        match self.state {
            SafetyState::Uninitialized => {
                self.state = SafetyState::Armed;
                info!("emergency stop armed");
                Ok(())
            }
            SafetyState::Fault => Err(HalError::InvalidState("terminal fault")),
            _ => Err(HalError::InvalidState("already initialized")),
        }
    }

    /// Power-cycle-equivalent reinitialization: everything, including the
    /// terminal `Fault` state and the audit counters, starts over.
    pub fn reinitialize(&mut self) {
        warn!("emergency stop reinitialized");
        self.state = SafetyState::Uninitialized;
        self.last_source = None;
        self.trigger_count = 0;
        self.last_trigger_ms = 0;
    }

    /// Trigger the emergency stop.
    ///
    /// The motor power is cut first, unconditionally; state bookkeeping
    /// follows. A failure to cut power is an internal contradiction and
    /// moves the machine to `Fault`.
    pub fn trigger(
        &mut self,
        source: TriggerSource,
        outputs: &mut dyn SafetyOutputs,
        now_ms: u64,
    ) -> HalResult<()> {
        // Power cut before anything else; latency budget lives here.
        if let Err(e) = outputs.cut_motor_power() {
            error!("power cut failed ({e}); entering terminal fault");
            self.state = SafetyState::Fault;
            return Err(HalError::SafetyViolation("power cut failed"));
        }
        let _ = outputs.set_fault_indicator(true);

        match self.state {
            SafetyState::Uninitialized => Err(HalError::InvalidState("not armed")),
            SafetyState::Fault => Err(HalError::InvalidState("terminal fault")),
            SafetyState::Armed | SafetyState::Triggered | SafetyState::ResetPending => {
                self.state = SafetyState::Triggered;
                self.last_source = Some(source);
                self.last_trigger_ms = now_ms;
                self.trigger_count += 1;
                warn!("emergency stop triggered by {source:?} (count {})", self.trigger_count);
                Ok(())
            }
        }
    }

    /// Request a reset.
    ///
    /// Inside the cooldown window the request is refused `TooSoon`. After
    /// the cooldown the machine moves to `ResetPending` and re-validates
    /// the trigger condition: while it is still asserted the machine stays
    /// in `ResetPending` and reports `StillTriggered`; once clear it
    /// re-arms.
    pub fn request_reset(
        &mut self,
        condition_clear: bool,
        outputs: &mut dyn SafetyOutputs,
        now_ms: u64,
    ) -> HalResult<ResetResult> {
        match self.state {
            SafetyState::Triggered | SafetyState::ResetPending => {}
            SafetyState::Fault => return Err(HalError::InvalidState("terminal fault")),
            _ => return Err(HalError::InvalidState("not triggered")),
        }

        if now_ms.saturating_sub(self.last_trigger_ms) < u64::from(self.reset_cooldown_ms) {
            return Ok(ResetResult::TooSoon);
        }

        self.state = SafetyState::ResetPending;
        if !condition_clear {
            warn!("reset refused: trigger condition still asserted");
            return Ok(ResetResult::StillTriggered);
        }

        outputs.set_fault_indicator(false)?;
        self.state = SafetyState::Armed;
        info!("emergency stop reset; system re-armed");
        Ok(ResetResult::Armed)
    }

    /// Record an internal contradiction; terminal until [`Self::reinitialize`].
    pub fn declare_fault(&mut self, reason: &'static str) {
        error!("safety fault: {reason}");
        self.state = SafetyState::Fault;
    }
}
