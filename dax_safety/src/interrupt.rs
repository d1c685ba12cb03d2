//! Static interrupt-priority table and startup validation.
//!
//! Lower numeric priority preempts higher. The required ordering, highest
//! to lowest urgency: emergency-stop trigger, safety-monitor tick,
//! control-loop tick, driver-bus, sensor-bus, general communication,
//! housekeeping. The validation routine runs at init and fails loudly —
//! initialization aborts — rather than silently degrading.

use dax_common::error::{HalError, HalResult};
use static_assertions::const_assert;
use tracing::{debug, error};

/// Number of interrupt sources in the table.
pub const INTERRUPT_COUNT: usize = 7;

// PendingSet in `sched` packs the table into a u16.
const_assert!(INTERRUPT_COUNT <= 16);

/// Interrupt source identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptId {
    /// Emergency-stop trigger (button edge, fault escalation).
    EmergencyStop,
    /// Periodic safety-monitor tick.
    SafetyMonitor,
    /// Real-time control-loop tick.
    ControlLoop,
    /// Stepper-driver register bus.
    DriverBus,
    /// Encoder addressed bus.
    SensorBus,
    /// Console/network communication.
    SystemComm,
    /// Background housekeeping.
    Housekeeping,
}

impl InterruptId {
    /// Stable table index.
    pub const fn index(self) -> usize {
        match self {
            InterruptId::EmergencyStop => 0,
            InterruptId::SafetyMonitor => 1,
            InterruptId::ControlLoop => 2,
            InterruptId::DriverBus => 3,
            InterruptId::SensorBus => 4,
            InterruptId::SystemComm => 5,
            InterruptId::Housekeeping => 6,
        }
    }

    /// All sources in table order.
    pub const ALL: [InterruptId; INTERRUPT_COUNT] = [
        InterruptId::EmergencyStop,
        InterruptId::SafetyMonitor,
        InterruptId::ControlLoop,
        InterruptId::DriverBus,
        InterruptId::SensorBus,
        InterruptId::SystemComm,
        InterruptId::Housekeeping,
    ];
}

/// Urgency class of an interrupt source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptClass {
    /// Safety-critical: emergency stop, safety monitor.
    Safety,
    /// Real-time control.
    Control,
    /// Bus and network communication.
    Communication,
    /// Background work.
    Housekeeping,
}

/// One row of the priority table.
#[derive(Debug, Clone, Copy)]
pub struct InterruptEntry {
    /// Source identifier.
    pub id: InterruptId,
    /// Urgency class.
    pub class: InterruptClass,
    /// Preemption priority; lower preempts higher.
    pub priority: u8,
    /// Tie-break priority within the same level.
    pub sub_priority: u8,
    /// Whether the source is dispatched at all.
    pub enabled: bool,
    /// Name for logs.
    pub label: &'static str,
}

/// The static priority table.
#[derive(Debug, Clone)]
pub struct InterruptTable {
    entries: [InterruptEntry; INTERRUPT_COUNT],
}

impl Default for InterruptTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptTable {
    /// The required default ordering.
    pub const fn new() -> Self {
        Self {
            entries: [
                InterruptEntry {
                    id: InterruptId::EmergencyStop,
                    class: InterruptClass::Safety,
                    priority: 0,
                    sub_priority: 0,
                    enabled: true,
                    label: "emergency_stop",
                },
                InterruptEntry {
                    id: InterruptId::SafetyMonitor,
                    class: InterruptClass::Safety,
                    priority: 1,
                    sub_priority: 0,
                    enabled: true,
                    label: "safety_monitor",
                },
                InterruptEntry {
                    id: InterruptId::ControlLoop,
                    class: InterruptClass::Control,
                    priority: 2,
                    sub_priority: 0,
                    enabled: true,
                    label: "control_loop",
                },
                InterruptEntry {
                    id: InterruptId::DriverBus,
                    class: InterruptClass::Communication,
                    priority: 3,
                    sub_priority: 0,
                    enabled: true,
                    label: "driver_bus",
                },
                InterruptEntry {
                    id: InterruptId::SensorBus,
                    class: InterruptClass::Communication,
                    priority: 4,
                    sub_priority: 0,
                    enabled: true,
                    label: "sensor_bus",
                },
                InterruptEntry {
                    id: InterruptId::SystemComm,
                    class: InterruptClass::Communication,
                    priority: 5,
                    sub_priority: 1,
                    enabled: true,
                    label: "system_comm",
                },
                InterruptEntry {
                    id: InterruptId::Housekeeping,
                    class: InterruptClass::Housekeeping,
                    priority: 6,
                    sub_priority: 0,
                    enabled: true,
                    label: "housekeeping",
                },
            ],
        }
    }

    /// All entries in table order.
    pub fn entries(&self) -> &[InterruptEntry; INTERRUPT_COUNT] {
        &self.entries
    }

    /// The entry of one source.
    pub fn entry(&self, id: InterruptId) -> &InterruptEntry {
        &self.entries[id.index()]
    }

    /// Override a priority (test rigs and board-specific tuning); the
    /// result must still pass [`Self::validate`] before use.
    pub fn set_priority(&mut self, id: InterruptId, priority: u8) {
        self.entries[id.index()].priority = priority;
    }

    /// Enable or disable a source.
    pub fn set_enabled(&mut self, id: InterruptId, enabled: bool) {
        self.entries[id.index()].enabled = enabled;
    }

    /// Validate the safety invariants of the table.
    ///
    /// (a) The emergency-stop entry holds the single lowest numeric
    /// priority. (b) No communication-class entry has a priority
    /// numerically less than or equal to any safety-class entry. Failure
    /// aborts initialization.
    pub fn validate(&self) -> HalResult<()> {
        let estop = self.entry(InterruptId::EmergencyStop);

        for entry in &self.entries {
            if entry.id != InterruptId::EmergencyStop && entry.priority <= estop.priority {
                error!(
                    "interrupt table invalid: {} (prio {}) outranks emergency stop (prio {})",
                    entry.label, entry.priority, estop.priority
                );
                return Err(HalError::SafetyViolation(
                    "emergency stop must hold the unique lowest priority",
                ));
            }
        }

        for comm in self.entries.iter().filter(|e| e.class == InterruptClass::Communication) {
            for safety in self.entries.iter().filter(|e| e.class == InterruptClass::Safety) {
                if comm.priority <= safety.priority {
                    error!(
                        "interrupt table invalid: {} (prio {}) outranks {} (prio {})",
                        comm.label, comm.priority, safety.label, safety.priority
                    );
                    return Err(HalError::SafetyViolation(
                        "communication priority within safety band",
                    ));
                }
            }
        }

        debug!("interrupt table validated: {INTERRUPT_COUNT} entries");
        Ok(())
    }
}
