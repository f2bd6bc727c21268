use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::TimeSnapshot;
use crate::model::GatingStatus;
use crate::scoring::ScoreSummary;
use crate::session::SessionStatus;

/// Every session lifecycle transition produces an Event.
/// Collaborators subscribe to react: persist results, show toasts, navigate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Gating was satisfied; the session moved from Locked to Unlocked.
    GatingReady {
        gating: GatingStatus,
        at: DateTime<Utc>,
    },
    SessionStarted {
        quiz_id: String,
        duration_seconds: u32,
        /// False for sessions with no positive duration; no clock is armed.
        timed: bool,
        at: DateTime<Utc>,
    },
    /// Remaining time crossed the warning threshold (10% by default).
    TimeWarning {
        time_left_seconds: u32,
        at: DateTime<Utc>,
    },
    /// Remaining time crossed the critical threshold (5% by default).
    TimeCritical {
        time_left_seconds: u32,
        at: DateTime<Utc>,
    },
    /// Countdown hit zero; auto-submit fired exactly once.
    SessionExpired {
        quiz_id: String,
        score: ScoreSummary,
        at: DateTime<Utc>,
    },
    SessionSubmitted {
        quiz_id: String,
        score: ScoreSummary,
        at: DateTime<Utc>,
    },
    SessionReset {
        quiz_id: String,
        at: DateTime<Utc>,
    },
    /// Full state snapshot for pollers.
    StateSnapshot {
        quiz_id: String,
        status: SessionStatus,
        time: TimeSnapshot,
        gating: GatingStatus,
        answered: usize,
        at: DateTime<Utc>,
    },
}
