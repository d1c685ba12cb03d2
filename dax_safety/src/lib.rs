//! # DAX Safety Core
//!
//! Emergency-stop state machine, fault aggregation, watchdog supervision
//! and the static interrupt-priority hierarchy. Everything here is
//! explicitly owned state passed through [`SafetyCore`] — no file-scope
//! statics — with a single guarded mutation path so the trigger handler
//! and the periodic monitor cannot tear each other's updates.
//!
//! # Module Structure
//!
//! - [`core`] - `SafetyCore` context handle and output seams
//! - [`estop`] - Emergency-stop state machine
//! - [`interrupt`] - Static priority table and startup validation
//! - [`monitor`] - Periodic fault monitor with bounded circular log
//! - [`sched`] - Deterministic priority dispatcher for hosted builds
//! - [`watchdog`] - Watchdog manager with audit counters

pub mod core;
pub mod estop;
pub mod interrupt;
pub mod monitor;
pub mod sched;
pub mod watchdog;

pub use crate::core::{PinSafetyOutputs, SafetyCore, SafetyInputs};
pub use crate::estop::{EmergencyStop, ResetResult, SafetyOutputs, SafetyState, TriggerSource};
pub use crate::interrupt::{InterruptClass, InterruptEntry, InterruptId, InterruptTable};
pub use crate::monitor::{
    EncoderHealth, FaultClass, FaultMonitor, FaultRecord, MonitorSample, MotorHealth,
};
pub use crate::sched::{InterruptHandlers, PendingSet, PriorityScheduler};
pub use crate::watchdog::{WatchdogManager, WatchdogStats, WatchdogVerdict};
