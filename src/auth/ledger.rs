//! Failed-login ledger keyed by origin.
//!
//! A sliding-window counter of failed login timestamps per origin (usually a
//! client IP). Stale timestamps for an origin are pruned whenever that origin
//! is accessed, and the whole map is swept at most every
//! [`LEDGER_SWEEP_INTERVAL_SECS`] so origins that never return are evicted.
//! The sweep runs inline under the map lock; there is no background task.
//! State is in-memory only and is lost on restart. A `max_attempts` of zero
//! disables throttling.

use parking_lot::Mutex;
use std::collections::HashMap;

/// How often the ledger sweeps idle origins from its map.
pub const LEDGER_SWEEP_INTERVAL_SECS: i64 = 300; // 5 minutes

/// Outcome of a lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutStatus {
    /// The origin may attempt a login.
    Open {
        /// Failures still tolerated before lockout.
        remaining: u32,
    },
    /// Too many recent failures.
    Locked {
        /// Seconds until the oldest counted failure leaves the window.
        retry_after_secs: u64,
    },
}

/// Per-origin failure timestamps (epoch seconds), oldest first, plus the
/// time of the last whole-map sweep.
#[derive(Debug)]
pub struct FailedAttemptLedger {
    max_attempts: u32,
    window_secs: u64,
    failures: Mutex<(HashMap<String, Vec<i64>>, i64)>,
}

impl FailedAttemptLedger {
    pub fn new(max_attempts: u32, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window_secs,
            failures: Mutex::new((HashMap::new(), i64::MIN)),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Prune stale entries for `origin` and report whether it is locked out.
    pub fn check_at(&self, origin: &str, now: i64) -> LockoutStatus {
        if self.max_attempts == 0 {
            return LockoutStatus::Open {
                remaining: u32::MAX,
            };
        }

        let mut guard = self.failures.lock();
        let (failures, last_sweep) = &mut *guard;
        self.sweep_if_due(failures, last_sweep, now);

        let Some(entry) = failures.get_mut(origin) else {
            return LockoutStatus::Open {
                remaining: self.max_attempts,
            };
        };

        self.prune(entry, now);
        if entry.is_empty() {
            failures.remove(origin);
            return LockoutStatus::Open {
                remaining: self.max_attempts,
            };
        }

        let count = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        if count >= self.max_attempts {
            let oldest = entry[0];
            let unlock_at = oldest.saturating_add(self.window_i64());
            let retry_after_secs = u64::try_from(unlock_at.saturating_sub(now))
                .unwrap_or(0)
                .max(1);
            return LockoutStatus::Locked { retry_after_secs };
        }

        LockoutStatus::Open {
            remaining: self.max_attempts - count,
        }
    }

    /// Record a failed attempt for `origin` at `now`.
    pub fn record_failure_at(&self, origin: &str, now: i64) {
        if self.max_attempts == 0 {
            return;
        }
        let mut guard = self.failures.lock();
        let (failures, last_sweep) = &mut *guard;
        self.sweep_if_due(failures, last_sweep, now);

        let entry = failures.entry(origin.to_owned()).or_default();
        self.prune(entry, now);
        entry.push(now);
    }

    /// Forget every failure recorded for `origin`.
    pub fn clear(&self, origin: &str) {
        self.failures.lock().0.remove(origin);
    }

    /// Number of failures currently counted for `origin`.
    pub fn failures_at(&self, origin: &str, now: i64) -> usize {
        let mut guard = self.failures.lock();
        let failures = &mut guard.0;
        let Some(entry) = failures.get_mut(origin) else {
            return 0;
        };
        self.prune(entry, now);
        let count = entry.len();
        if count == 0 {
            failures.remove(origin);
        }
        count
    }

    /// Number of origins with at least one stored timestamp.
    pub fn tracked_origins(&self) -> usize {
        self.failures.lock().0.len()
    }

    fn window_i64(&self) -> i64 {
        i64::try_from(self.window_secs).unwrap_or(i64::MAX)
    }

    /// Drop every origin whose failures have all aged out.
    fn sweep_if_due(
        &self,
        failures: &mut HashMap<String, Vec<i64>>,
        last_sweep: &mut i64,
        now: i64,
    ) {
        if now.saturating_sub(*last_sweep) < LEDGER_SWEEP_INTERVAL_SECS {
            return;
        }
        failures.retain(|_, entry| {
            self.prune(entry, now);
            !entry.is_empty()
        });
        *last_sweep = now;
    }

    fn prune(&self, entry: &mut Vec<i64>, now: i64) {
        let cutoff = now.saturating_sub(self.window_i64());
        entry.retain(|&ts| ts > cutoff);
    }
}
