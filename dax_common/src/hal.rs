//! Hardware Abstraction Interface (HAI).
//!
//! Capability-oriented boundary between control/safety logic and the
//! platform. Two adapters satisfy it: a thin real-hardware adapter (out of
//! tree) and the simulated adapter in `dax_hal`. Consumers are oblivious to
//! which one is linked.
//!
//! - [`capabilities`] - The capability traits and their operand types

pub mod capabilities;

pub use capabilities::{
    AddressedBus, DigitalIo, MonotonicClock, PinEdge, PinId, PinMode, RegisterBus, SystemControl,
    TimerControl, TimerId, WatchdogHw,
};
