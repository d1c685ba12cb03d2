//! Watchdog manager.
//!
//! Policy layer over the hardware watchdog primitive: refresh cadence,
//! early-warning margin and audit counters. A refresh gap above the warn
//! threshold counts as missed; a gap reaching the hard timeout counts as
//! a timeout, once per expiry episode, and the caller escalates it to an
//! emergency-stop trigger. The three counters survive everything except
//! re-initialization, giving an audit trail across the whole uptime.

use dax_common::config::WatchdogConfig;
use dax_common::error::{HalError, HalResult};
use tracing::{debug, info, warn};

/// Audit counters exposed by [`WatchdogManager::statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchdogStats {
    /// Total refresh calls since init.
    pub refresh_count: u64,
    /// Hard timeouts since init.
    pub timeout_count: u32,
    /// Refreshes that arrived after the warn threshold.
    pub missed_count: u32,
}

/// Result of a deadline check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Deadline not reached.
    Ok,
    /// The hard timeout elapsed since the last refresh; escalate.
    Expired,
}

/// Watchdog manager.
#[derive(Debug, Default)]
pub struct WatchdogManager {
    enabled: bool,
    timeout_ms: u32,
    warn_threshold_ms: u32,
    refresh_count: u64,
    missed_count: u32,
    timeout_count: u32,
    last_refresh_ms: u64,
    expired_latched: bool,
}

impl WatchdogManager {
    /// Create a disabled manager; call [`Self::init`] to arm it.
    pub const fn new() -> Self {
        Self {
            enabled: false,
            timeout_ms: 0,
            warn_threshold_ms: 0,
            refresh_count: 0,
            missed_count: 0,
            timeout_count: 0,
            last_refresh_ms: 0,
            expired_latched: false,
        }
    }

    /// Arm the watchdog and reset all counters.
    ///
    /// The warn threshold must be strictly below the timeout; the config
    /// type enforces that through its fraction representation, and this
    /// re-checks it so a hand-built config cannot bypass the invariant.
    pub fn init(&mut self, config: &WatchdogConfig, now_ms: u64) -> HalResult<()> {
        let warn_threshold_ms = config.warn_threshold_ms();
        if config.timeout_ms == 0 || warn_threshold_ms >= config.timeout_ms {
            return Err(HalError::ConfigOutOfRange("watchdog warn threshold"));
        }

        self.enabled = true;
        self.timeout_ms = config.timeout_ms;
        self.warn_threshold_ms = warn_threshold_ms;
        self.refresh_count = 0;
        self.missed_count = 0;
        self.timeout_count = 0;
        self.last_refresh_ms = now_ms;
        self.expired_latched = false;

        info!(
            "watchdog armed: timeout {} ms, warn at {} ms",
            self.timeout_ms, self.warn_threshold_ms
        );
        Ok(())
    }

    /// Whether the manager has been armed.
    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Refresh the watchdog.
    ///
    /// A gap above the warn threshold is recorded as missed even when the
    /// refresh still beat the hard timeout — the early-warning margin is
    /// what keeps a drifting loop visible before it kills the system.
    pub fn refresh(&mut self, now_ms: u64) -> HalResult<()> {
        if !self.enabled {
            return Err(HalError::NotInitialized("watchdog manager"));
        }

        let gap = now_ms.saturating_sub(self.last_refresh_ms);
        if gap > u64::from(self.warn_threshold_ms) {
            self.missed_count += 1;
            warn!("late watchdog refresh: gap {gap} ms (warn at {} ms)", self.warn_threshold_ms);
        }

        self.refresh_count += 1;
        self.last_refresh_ms = now_ms;
        self.expired_latched = false;
        Ok(())
    }

    /// Check the deadline.
    ///
    /// Returns `Expired` exactly once per expiry episode; the caller is
    /// expected to escalate it to an emergency-stop trigger.
    pub fn check(&mut self, now_ms: u64) -> WatchdogVerdict {
        if !self.enabled {
            return WatchdogVerdict::Ok;
        }

        let gap = now_ms.saturating_sub(self.last_refresh_ms);
        if gap >= u64::from(self.timeout_ms) && !self.expired_latched {
            self.expired_latched = true;
            self.timeout_count += 1;
            warn!("watchdog timeout: gap {gap} ms (limit {} ms)", self.timeout_ms);
            return WatchdogVerdict::Expired;
        }
        WatchdogVerdict::Ok
    }

    /// Milliseconds until the next refresh is due (the warn threshold).
    ///
    /// Zero means the deadline is already blown; a caller that sees the
    /// margin shrinking can refresh before a miss is recorded.
    pub fn time_until_refresh(&self, now_ms: u64) -> u64 {
        if !self.enabled {
            return 0;
        }
        let due = self.last_refresh_ms + u64::from(self.warn_threshold_ms);
        due.saturating_sub(now_ms)
    }

    /// The audit counters.
    pub fn statistics(&self) -> WatchdogStats {
        WatchdogStats {
            refresh_count: self.refresh_count,
            timeout_count: self.timeout_count,
            missed_count: self.missed_count,
        }
    }

    /// Disarm without clearing counters (used at shutdown).
    pub fn disarm(&mut self) {
        debug!("watchdog disarmed");
        self.enabled = false;
    }
}
