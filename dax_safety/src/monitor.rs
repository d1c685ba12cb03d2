//! Periodic fault monitor.
//!
//! Polls driver/encoder status and communication health at a fixed
//! interval, classifies each finding, and on a Critical classification
//! hands the caller a trigger source for immediate emergency stop.
//! Everything else is recorded with a severity and a monotonic timestamp
//! into a bounded circular buffer — the oldest entry is overwritten, the
//! system never halts for a warning.

use crate::estop::TriggerSource;
use dax_common::consts::{FAULT_LOG_CAPACITY, MAX_AXES};
use dax_common::encoder::MagnetStatus;
use dax_common::motor::{FaultKind, MotorStatus};
use heapless::HistoryBuffer;
use tracing::{debug, warn};

/// Comm-error burst (per poll interval) that escalates to Critical.
const COMM_BURST_THRESHOLD: u32 = 10;

/// Severity of one monitor finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Forces an immediate emergency stop.
    Critical,
    /// Logged; operation continues.
    Warning,
    /// Logged for diagnostics only.
    Informational,
    /// Transient; expected to clear on its own.
    Recoverable,
}

/// One entry in the circular fault log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultRecord {
    /// Monotonic timestamp of the finding.
    pub timestamp_ms: u64,
    /// Severity classification.
    pub class: FaultClass,
    /// Subsystem the finding maps to.
    pub source: TriggerSource,
    /// Raw status bits backing the finding.
    pub code: u16,
}

/// Per-axis driver health snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotorHealth {
    /// Raw status word.
    pub status: MotorStatus,
    /// Active injected/detected fault.
    pub fault: Option<FaultKind>,
}

/// Per-axis encoder health snapshot.
#[derive(Debug, Clone, Copy)]
pub struct EncoderHealth {
    /// Magnet status bits.
    pub magnet: MagnetStatus,
}

impl Default for EncoderHealth {
    fn default() -> Self {
        Self {
            magnet: MagnetStatus::DETECTED,
        }
    }
}

/// Snapshot handed to [`FaultMonitor::poll`], no older than one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorSample {
    /// Driver health per axis.
    pub motors: [MotorHealth; MAX_AXES],
    /// Encoder health per axis.
    pub encoders: [EncoderHealth; MAX_AXES],
    /// Cumulative communication error counter.
    pub comm_errors: u32,
}

/// The periodic fault monitor.
pub struct FaultMonitor {
    interval_ms: u32,
    last_poll_ms: Option<u64>,
    last_comm_errors: u32,
    log: HistoryBuffer<FaultRecord, FAULT_LOG_CAPACITY>,
}

impl FaultMonitor {
    /// Create a monitor polling every `interval_ms`.
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_poll_ms: None,
            last_comm_errors: 0,
            log: HistoryBuffer::new(),
        }
    }

    /// Whether a poll is due at `now_ms`.
    pub fn due(&self, now_ms: u64) -> bool {
        match self.last_poll_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= u64::from(self.interval_ms),
        }
    }

    /// Classify a snapshot.
    ///
    /// Returns the trigger source of the first Critical finding, if any;
    /// the caller invokes the emergency stop with it. Non-critical
    /// findings are recorded and do not interrupt operation.
    pub fn poll(&mut self, sample: &MonitorSample, now_ms: u64) -> Option<TriggerSource> {
        self.last_poll_ms = Some(now_ms);
        let mut critical: Option<TriggerSource> = None;

        for motor in &sample.motors {
            if let Some(class) = classify_motor_fault(motor.fault) {
                self.record(now_ms, class, TriggerSource::MotorFault, motor.status.bits());
                if class == FaultClass::Critical {
                    critical.get_or_insert(TriggerSource::MotorFault);
                }
            }
            if motor.status.contains(MotorStatus::WRONG_CMD) {
                self.record(
                    now_ms,
                    FaultClass::Informational,
                    TriggerSource::MotorFault,
                    motor.status.bits(),
                );
            }
        }

        for encoder in &sample.encoders {
            if let Some(class) = classify_magnet(encoder.magnet) {
                self.record(
                    now_ms,
                    class,
                    TriggerSource::EncoderFault,
                    u16::from(encoder.magnet.bits()),
                );
                if class == FaultClass::Critical {
                    critical.get_or_insert(TriggerSource::EncoderFault);
                }
            }
        }

        let comm_delta = sample.comm_errors.saturating_sub(self.last_comm_errors);
        self.last_comm_errors = sample.comm_errors;
        if comm_delta > COMM_BURST_THRESHOLD {
            self.record(
                now_ms,
                FaultClass::Critical,
                TriggerSource::Communication,
                comm_delta.min(u32::from(u16::MAX)) as u16,
            );
            critical.get_or_insert(TriggerSource::Communication);
        } else if comm_delta > 0 {
            self.record(
                now_ms,
                FaultClass::Recoverable,
                TriggerSource::Communication,
                comm_delta as u16,
            );
        }

        if let Some(source) = critical {
            warn!("critical fault detected: {source:?}");
        } else {
            debug!("fault monitor poll clean");
        }
        critical
    }

    /// Fault log, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &FaultRecord> {
        self.log.oldest_ordered()
    }

    /// Number of retained records (bounded by the buffer capacity).
    pub fn record_count(&self) -> usize {
        self.log.len()
    }

    fn record(&mut self, timestamp_ms: u64, class: FaultClass, source: TriggerSource, code: u16) {
        self.log.write(FaultRecord {
            timestamp_ms,
            class,
            source,
            code,
        });
    }
}

/// Severity of a driver fault.
fn classify_motor_fault(fault: Option<FaultKind>) -> Option<FaultClass> {
    match fault {
        None => None,
        // Thermal warning leaves time to react; everything else does not.
        Some(FaultKind::Overheat) => Some(FaultClass::Warning),
        Some(FaultKind::Overcurrent | FaultKind::Undervoltage | FaultKind::Stall) => {
            Some(FaultClass::Critical)
        }
    }
}

/// Severity of a magnet-health reading.
fn classify_magnet(magnet: MagnetStatus) -> Option<FaultClass> {
    if !magnet.contains(MagnetStatus::DETECTED) {
        return Some(FaultClass::Critical);
    }
    if magnet.intersects(MagnetStatus::TOO_WEAK | MagnetStatus::TOO_STRONG) {
        return Some(FaultClass::Warning);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_sample() -> MonitorSample {
        MonitorSample::default()
    }

    #[test]
    fn clean_sample_yields_nothing() {
        let mut monitor = FaultMonitor::new(10);
        assert!(monitor.poll(&clean_sample(), 0).is_none());
        assert_eq!(monitor.record_count(), 0);
    }

    #[test]
    fn due_respects_interval() {
        let mut monitor = FaultMonitor::new(10);
        assert!(monitor.due(0));
        monitor.poll(&clean_sample(), 0);
        assert!(!monitor.due(5));
        assert!(monitor.due(10));
    }

    #[test]
    fn stall_is_critical_motor_fault() {
        let mut monitor = FaultMonitor::new(10);
        let mut sample = clean_sample();
        sample.motors[0].fault = Some(FaultKind::Stall);
        sample.motors[0].status = MotorStatus::STALL;

        assert_eq!(
            monitor.poll(&sample, 100),
            Some(TriggerSource::MotorFault)
        );
        let record = monitor.records().next().unwrap();
        assert_eq!(record.class, FaultClass::Critical);
        assert_eq!(record.timestamp_ms, 100);
    }

    #[test]
    fn overheat_is_warning_not_critical() {
        let mut monitor = FaultMonitor::new(10);
        let mut sample = clean_sample();
        sample.motors[1].fault = Some(FaultKind::Overheat);
        sample.motors[1].status = MotorStatus::TH_WRN;

        assert!(monitor.poll(&sample, 0).is_none());
        assert_eq!(monitor.records().next().unwrap().class, FaultClass::Warning);
    }

    #[test]
    fn magnet_loss_is_critical() {
        let mut monitor = FaultMonitor::new(10);
        let mut sample = clean_sample();
        sample.encoders[0].magnet = MagnetStatus::empty();

        assert_eq!(
            monitor.poll(&sample, 0),
            Some(TriggerSource::EncoderFault)
        );
    }

    #[test]
    fn weak_magnet_is_warning() {
        let mut monitor = FaultMonitor::new(10);
        let mut sample = clean_sample();
        sample.encoders[1].magnet = MagnetStatus::DETECTED | MagnetStatus::TOO_WEAK;

        assert!(monitor.poll(&sample, 0).is_none());
        assert_eq!(
            monitor.records().next().unwrap().source,
            TriggerSource::EncoderFault
        );
    }

    #[test]
    fn comm_errors_escalate_on_burst() {
        let mut monitor = FaultMonitor::new(10);

        let mut sample = clean_sample();
        sample.comm_errors = 3;
        assert!(monitor.poll(&sample, 0).is_none());
        assert_eq!(
            monitor.records().next().unwrap().class,
            FaultClass::Recoverable
        );

        // 20 new errors inside one interval: burst.
        sample.comm_errors = 23;
        assert_eq!(
            monitor.poll(&sample, 10),
            Some(TriggerSource::Communication)
        );
    }

    #[test]
    fn motor_fault_outranks_comm_burst() {
        let mut monitor = FaultMonitor::new(10);
        let mut sample = clean_sample();
        sample.motors[0].fault = Some(FaultKind::Overcurrent);
        sample.comm_errors = 100;

        assert_eq!(
            monitor.poll(&sample, 0),
            Some(TriggerSource::MotorFault)
        );
    }

    #[test]
    fn log_overwrites_oldest_when_full() {
        let mut monitor = FaultMonitor::new(10);
        let mut sample = clean_sample();
        sample.motors[0].fault = Some(FaultKind::Overheat);

        for i in 0..(FAULT_LOG_CAPACITY as u64 + 8) {
            monitor.poll(&sample, i * 10);
        }

        assert_eq!(monitor.record_count(), FAULT_LOG_CAPACITY);
        // Oldest surviving record is from poll 8, not poll 0.
        assert_eq!(monitor.records().next().unwrap().timestamp_ms, 80);
    }
}
