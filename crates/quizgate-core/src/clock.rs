//! Drift-resistant session countdown.
//!
//! The clock is a wall-clock-based countdown. It has no internal thread --
//! the caller (normally the session orchestrator, driven by the hub's
//! interval) passes `now` into `remaining()`. Remaining time is always
//! recomputed from `(now, started_at, total_seconds)`, never decremented,
//! so missed or delayed ticks cannot accumulate error: the next call simply
//! recomputes from the absolute timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Fraction of total time at which the warning threshold sits.
pub const DEFAULT_WARNING_RATIO: f64 = 0.10;
/// Fraction of total time at which the critical threshold sits.
pub const DEFAULT_CRITICAL_RATIO: f64 = 0.05;

/// Display snapshot exposed to collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSnapshot {
    pub time_left_seconds: u32,
    pub formatted_time: String,
    pub is_warning: bool,
    pub is_critical: bool,
}

/// Countdown clock for one session attempt.
///
/// `started_at` is set exactly once per attempt and only cleared by
/// `reset()`. `cancel()` stops the external tick loop (via `is_armed`)
/// without clearing the baseline, so the final state stays inspectable.
/// There is no pause support: a paused countdown would need a compensating
/// offset which this model deliberately does not carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClock {
    total_seconds: u32,
    started_at: Option<DateTime<Utc>>,
    /// Whether an external tick loop should be running.
    #[serde(default)]
    armed: bool,
    warning_ratio: f64,
    critical_ratio: f64,
}

impl SessionClock {
    pub fn new(total_seconds: u32) -> Self {
        Self::with_ratios(total_seconds, DEFAULT_WARNING_RATIO, DEFAULT_CRITICAL_RATIO)
    }

    pub fn with_ratios(total_seconds: u32, warning_ratio: f64, critical_ratio: f64) -> Self {
        Self {
            total_seconds,
            started_at: None,
            armed: false,
            warning_ratio,
            critical_ratio,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// True between `start()` and `cancel()`/`reset()`; the hub only runs
    /// its interval while this holds.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Remaining whole seconds at `now`.
    ///
    /// Clock skew (`now` before `started_at`) clamps elapsed to zero;
    /// elapsed beyond the total clamps the result to zero. Never started
    /// means the full duration remains.
    pub fn remaining(&self, now: DateTime<Utc>) -> u32 {
        match self.started_at {
            Some(started) => {
                let elapsed = (now - started).num_seconds().max(0);
                u64::from(self.total_seconds)
                    .saturating_sub(elapsed as u64)
                    .min(u64::from(u32::MAX)) as u32
            }
            None => self.total_seconds,
        }
    }

    /// `ceil(total * warning_ratio)` seconds.
    pub fn warning_threshold(&self) -> u32 {
        ratio_threshold(self.total_seconds, self.warning_ratio)
    }

    /// `ceil(total * critical_ratio)` seconds.
    pub fn critical_threshold(&self) -> u32 {
        ratio_threshold(self.total_seconds, self.critical_ratio)
    }

    pub fn is_warning(&self, now: DateTime<Utc>) -> bool {
        self.started_at.is_some() && self.remaining(now) <= self.warning_threshold()
    }

    pub fn is_critical(&self, now: DateTime<Utc>) -> bool {
        self.started_at.is_some() && self.remaining(now) <= self.critical_threshold()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimeSnapshot {
        let left = self.remaining(now);
        TimeSnapshot {
            time_left_seconds: left,
            formatted_time: format_mm_ss(left),
            is_warning: self.is_warning(now),
            is_critical: self.is_critical(now),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Arm the countdown. Requires a positive duration; sets `started_at`
    /// exactly once per attempt (a second call is rejected by the
    /// orchestrator's state machine before it reaches here, but the clock
    /// keeps the original baseline regardless).
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.total_seconds == 0 {
            return Err(SessionError::UntimedClock);
        }
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.armed = true;
        Ok(())
    }

    /// Stop the tick loop without clearing `started_at`.
    pub fn cancel(&mut self) {
        self.armed = false;
    }

    /// Clear the baseline and disarm; remaining time returns to the total.
    pub fn reset(&mut self) {
        self.started_at = None;
        self.armed = false;
    }
}

/// `MM:SS` rendering; minutes are not capped at 59.
pub fn format_mm_ss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn ratio_threshold(total_seconds: u32, ratio: f64) -> u32 {
    (f64::from(total_seconds) * ratio).ceil() as u32
}
