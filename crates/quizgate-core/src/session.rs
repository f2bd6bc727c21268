//! Session orchestrator.
//!
//! The orchestrator is a wall-clock-based state machine tying the gating
//! engine to the session clock. It has no internal thread: the caller
//! drives `tick()` periodically (the hub runs one interval per session).
//!
//! ## State Transitions
//!
//! ```text
//! Locked -> Unlocked -> Active -> Warning -> Critical -> Expired
//!                          \---------\----------\------> Submitted
//! any -> Locked (reset)
//! ```
//!
//! One orchestrator per (quiz, user) session context; nothing else mutates
//! its fields. The whole struct serializes, so callers can park it in the
//! kv store between invocations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{SessionClock, TimeSnapshot, DEFAULT_CRITICAL_RATIO, DEFAULT_WARNING_RATIO};
use crate::error::SessionError;
use crate::events::Event;
use crate::gating::{GatingEngine, GatingPolicy, ProgressOutcome, ProgressUpdate};
use crate::model::{GatingStatus, QuizDefinition, ResourceProgress};
use crate::scoring::{self, ScoreSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Gating not yet satisfied.
    Locked,
    /// Gating satisfied; the learner may start.
    Unlocked,
    Active,
    /// Active with remaining time at or under the warning threshold.
    Warning,
    /// Active with remaining time at or under the critical threshold.
    Critical,
    /// Countdown hit zero; terminal, answers frozen.
    Expired,
    /// Learner submitted; terminal.
    Submitted,
}

impl SessionStatus {
    /// Answer recording is only open while the countdown can still run.
    pub fn accepts_answers(self) -> bool {
        matches!(
            self,
            SessionStatus::Active | SessionStatus::Warning | SessionStatus::Critical
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Locked => "locked",
            SessionStatus::Unlocked => "unlocked",
            SessionStatus::Active => "active",
            SessionStatus::Warning => "warning",
            SessionStatus::Critical => "critical",
            SessionStatus::Expired => "expired",
            SessionStatus::Submitted => "submitted",
        };
        f.write_str(s)
    }
}

/// Policy knobs for one session; defaults match production behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPolicy {
    pub gating: GatingPolicy,
    pub warning_ratio: f64,
    pub critical_ratio: f64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            gating: GatingPolicy::default(),
            warning_ratio: DEFAULT_WARNING_RATIO,
            critical_ratio: DEFAULT_CRITICAL_RATIO,
        }
    }
}

/// State machine for one learner's quiz attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOrchestrator {
    quiz: QuizDefinition,
    user_id: String,
    status: SessionStatus,
    gating: GatingEngine,
    clock: SessionClock,
    answers: BTreeMap<String, String>,
    /// Single-fire latch: expiry auto-submit runs at most once even if
    /// several ticks observe zero remaining time.
    #[serde(default)]
    has_triggered_expiry: bool,
}

impl SessionOrchestrator {
    pub fn new(quiz: QuizDefinition, user_id: impl Into<String>, policy: SessionPolicy) -> Self {
        Self::with_progress(quiz, user_id, policy, Vec::new())
    }

    /// Resume with persisted progress rows (resume-on-reload).
    pub fn with_progress(
        quiz: QuizDefinition,
        user_id: impl Into<String>,
        policy: SessionPolicy,
        progress: Vec<ResourceProgress>,
    ) -> Self {
        let clock = SessionClock::with_ratios(
            quiz.duration_seconds,
            policy.warning_ratio,
            policy.critical_ratio,
        );
        Self {
            quiz,
            user_id: user_id.into(),
            status: SessionStatus::Locked,
            gating: GatingEngine::with_entries(policy.gating, progress),
            clock,
            answers: BTreeMap::new(),
            has_triggered_expiry: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn quiz(&self) -> &QuizDefinition {
        &self.quiz
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn gating(&self) -> &GatingEngine {
        &self.gating
    }

    pub fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    pub fn gating_status(&self) -> GatingStatus {
        self.gating.compute_status(&self.quiz)
    }

    /// Questions with no recorded answer, in quiz order.
    pub fn unanswered_question_ids(&self) -> Vec<&str> {
        self.quiz
            .questions
            .iter()
            .filter(|q| !self.answers.contains_key(&q.id))
            .map(|q| q.id.as_str())
            .collect()
    }

    /// Score of the answers as they stand.
    pub fn current_score(&self) -> ScoreSummary {
        scoring::score(&self.quiz.questions, &self.answers)
    }

    /// Whole seconds spent since the clock was armed; zero for untimed
    /// sessions, capped at the total once expired.
    pub fn time_spent_secs(&self, now: DateTime<Utc>) -> u32 {
        match self.clock.started_at() {
            Some(_) => self.clock.total_seconds() - self.clock.remaining(now),
            None => 0,
        }
    }

    /// Display snapshot. The urgency flags also reflect the state machine,
    /// so a skewed clock cannot flip them back off mid-session.
    pub fn time_snapshot(&self, now: DateTime<Utc>) -> TimeSnapshot {
        let mut time = self.clock.snapshot(now);
        time.is_warning |= matches!(
            self.status,
            SessionStatus::Warning | SessionStatus::Critical | SessionStatus::Expired
        );
        time.is_critical |= matches!(self.status, SessionStatus::Critical | SessionStatus::Expired);
        time
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            quiz_id: self.quiz.id.clone(),
            status: self.status,
            time: self.time_snapshot(now),
            gating: self.gating_status(),
            answered: self.answers.len(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Re-check gating and take the Locked -> Unlocked edge if satisfied.
    pub fn refresh_gating(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.status != SessionStatus::Locked {
            return None;
        }
        let gating = self.gating_status();
        if gating.ready {
            self.status = SessionStatus::Unlocked;
            Some(Event::GatingReady { gating, at: now })
        } else {
            None
        }
    }

    /// Merge a progress report; may unlock the session as a side effect.
    pub fn record_progress(
        &mut self,
        resource_id: &str,
        update: ProgressUpdate,
        now: DateTime<Utc>,
    ) -> (ProgressOutcome, Option<Event>) {
        let outcome = self
            .gating
            .record_progress(&self.quiz, resource_id, update, now);
        let event = self.refresh_gating(now);
        (outcome, event)
    }

    /// Start the attempt: arms the clock for timed quizzes, or goes
    /// straight to Active for untimed ones. Declined with the missing
    /// resource ids while gating is unsatisfied.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<Event, SessionError> {
        match self.status {
            SessionStatus::Locked | SessionStatus::Unlocked => {
                let gating = self.gating_status();
                if !gating.ready {
                    return Err(SessionError::NotReady {
                        missing: gating.missing_resource_ids,
                    });
                }
                if self.quiz.is_timed() {
                    self.clock.start(now)?;
                }
                self.status = SessionStatus::Active;
                Ok(Event::SessionStarted {
                    quiz_id: self.quiz.id.clone(),
                    duration_seconds: self.quiz.duration_seconds,
                    timed: self.quiz.is_timed(),
                    at: now,
                })
            }
            status => Err(SessionError::NotStartable { status }),
        }
    }

    /// Advance the countdown-driven part of the state machine.
    ///
    /// Remaining time is recomputed from absolute timestamps, so missed
    /// ticks need no catch-up: a single late tick lands in the right state
    /// (possibly skipping the Warning event straight to Critical).
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !self.status.accepts_answers() || !self.clock.is_armed() {
            return None;
        }
        let left = self.clock.remaining(now);
        if left == 0 {
            if self.has_triggered_expiry {
                return None;
            }
            self.has_triggered_expiry = true;
            self.clock.cancel();
            self.status = SessionStatus::Expired;
            return Some(Event::SessionExpired {
                quiz_id: self.quiz.id.clone(),
                score: self.current_score(),
                at: now,
            });
        }
        if left <= self.clock.critical_threshold() && self.status != SessionStatus::Critical {
            self.status = SessionStatus::Critical;
            return Some(Event::TimeCritical {
                time_left_seconds: left,
                at: now,
            });
        }
        if left <= self.clock.warning_threshold() && self.status == SessionStatus::Active {
            self.status = SessionStatus::Warning;
            return Some(Event::TimeWarning {
                time_left_seconds: left,
                at: now,
            });
        }
        None
    }

    /// Record an answer, last-write-wins. Declined once the session is
    /// expired or submitted (or not yet started).
    pub fn record_answer(
        &mut self,
        question_id: impl Into<String>,
        answer_id: impl Into<String>,
    ) -> Result<(), SessionError> {
        if !self.status.accepts_answers() {
            return Err(SessionError::AnswersClosed {
                status: self.status,
            });
        }
        self.answers.insert(question_id.into(), answer_id.into());
        Ok(())
    }

    /// Manual submission. The second call (and any call after expiry) is a
    /// no-op returning `None`.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !self.status.accepts_answers() {
            return None;
        }
        self.clock.cancel();
        self.status = SessionStatus::Submitted;
        Some(Event::SessionSubmitted {
            quiz_id: self.quiz.id.clone(),
            score: self.current_score(),
            at: now,
        })
    }

    /// Full reset back to Locked: fresh clock, cleared answers, expiry
    /// latch released. Resource progress survives; call `refresh_gating`
    /// afterwards to take the unlock edge again.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Event {
        self.clock.reset();
        self.answers.clear();
        self.has_triggered_expiry = false;
        self.status = SessionStatus::Locked;
        Event::SessionReset {
            quiz_id: self.quiz.id.clone(),
            at: now,
        }
    }

    /// Explicit learner restart: reset plus discarded resource progress.
    pub fn restart(&mut self, now: DateTime<Utc>) -> Event {
        self.gating.clear_progress();
        self.reset(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn quiz(duration_seconds: u32) -> QuizDefinition {
        QuizDefinition::from_json(&format!(
            r#"{{
                "id": "quiz-1",
                "duration_seconds": {duration_seconds},
                "resources": [
                    {{"id": "intro", "kind": "video", "required": true}},
                    {{"id": "notes", "kind": "pdf", "required": true}}
                ],
                "questions": [
                    {{"id": "q1", "options": [
                        {{"id": "a", "correct": true}}, {{"id": "b"}}
                    ]}},
                    {{"id": "q2", "options": [
                        {{"id": "a"}}, {{"id": "b", "correct": true}}
                    ]}}
                ]
            }}"#
        ))
        .unwrap()
    }

    fn unlocked(duration_seconds: u32) -> SessionOrchestrator {
        let mut orch =
            SessionOrchestrator::new(quiz(duration_seconds), "user-1", SessionPolicy::default());
        let now = Utc::now();
        orch.record_progress("intro", ProgressUpdate::ratio(0.9), now);
        orch.record_progress("notes", ProgressUpdate::viewed(), now);
        assert_eq!(orch.status(), SessionStatus::Unlocked);
        orch
    }

    #[test]
    fn starts_locked_and_unlocks_when_gating_ready() {
        let mut orch = SessionOrchestrator::new(quiz(600), "user-1", SessionPolicy::default());
        assert_eq!(orch.status(), SessionStatus::Locked);
        let now = Utc::now();

        let (outcome, event) = orch.record_progress("intro", ProgressUpdate::ratio(0.9), now);
        assert!(outcome.newly_completed());
        assert!(event.is_none());
        assert_eq!(orch.status(), SessionStatus::Locked);

        let (_, event) = orch.record_progress("notes", ProgressUpdate::viewed(), now);
        assert!(matches!(event, Some(Event::GatingReady { .. })));
        assert_eq!(orch.status(), SessionStatus::Unlocked);
    }

    #[test]
    fn start_is_declined_with_missing_resources_while_locked() {
        let mut orch = SessionOrchestrator::new(quiz(600), "user-1", SessionPolicy::default());
        let err = orch.start(Utc::now()).unwrap_err();
        match err {
            SessionError::NotReady { missing } => {
                assert_eq!(missing, vec!["intro".to_string(), "notes".to_string()]);
            }
            other => panic!("expected NotReady, got {other}"),
        }
        assert_eq!(orch.status(), SessionStatus::Locked);
    }

    #[test]
    fn start_arms_clock_and_tick_walks_warning_critical_expired() {
        let mut orch = unlocked(100);
        let start = Utc::now();
        orch.start(start).unwrap();
        assert_eq!(orch.status(), SessionStatus::Active);
        assert!(orch.clock().is_armed());

        assert!(orch.tick(start + Duration::seconds(50)).is_none());

        // 90s elapsed -> 10 left -> warning threshold (10).
        match orch.tick(start + Duration::seconds(90)) {
            Some(Event::TimeWarning {
                time_left_seconds, ..
            }) => assert_eq!(time_left_seconds, 10),
            other => panic!("expected TimeWarning, got {other:?}"),
        }
        assert_eq!(orch.status(), SessionStatus::Warning);

        // 95s elapsed -> 5 left -> critical threshold (5).
        assert!(matches!(
            orch.tick(start + Duration::seconds(95)),
            Some(Event::TimeCritical { .. })
        ));
        assert_eq!(orch.status(), SessionStatus::Critical);

        match orch.tick(start + Duration::seconds(101)) {
            Some(Event::SessionExpired { score, .. }) => assert_eq!(score.total, 2),
            other => panic!("expected SessionExpired, got {other:?}"),
        }
        assert_eq!(orch.status(), SessionStatus::Expired);
    }

    #[test]
    fn expiry_fires_exactly_once() {
        let mut orch = unlocked(60);
        let start = Utc::now();
        orch.start(start).unwrap();

        let late = start + Duration::seconds(120);
        assert!(matches!(
            orch.tick(late),
            Some(Event::SessionExpired { .. })
        ));
        assert!(orch.tick(late + Duration::seconds(1)).is_none());
        assert!(orch.tick(late + Duration::seconds(2)).is_none());
        assert_eq!(orch.status(), SessionStatus::Expired);
    }

    #[test]
    fn missed_ticks_jump_straight_to_critical() {
        let mut orch = unlocked(100);
        let start = Utc::now();
        orch.start(start).unwrap();
        // Suspended caller: first tick arrives inside the critical band.
        assert!(matches!(
            orch.tick(start + Duration::seconds(96)),
            Some(Event::TimeCritical { .. })
        ));
        assert_eq!(orch.status(), SessionStatus::Critical);
    }

    #[test]
    fn answers_are_frozen_after_expiry() {
        let mut orch = unlocked(60);
        let start = Utc::now();
        orch.start(start).unwrap();
        orch.record_answer("q1", "a").unwrap();
        orch.tick(start + Duration::seconds(61));

        let err = orch.record_answer("q2", "b").unwrap_err();
        assert!(matches!(err, SessionError::AnswersClosed { .. }));
        assert_eq!(orch.answers().len(), 1);
    }

    #[test]
    fn answer_overwrites_are_last_write_wins() {
        let mut orch = unlocked(600);
        orch.start(Utc::now()).unwrap();
        orch.record_answer("q1", "a").unwrap();
        orch.record_answer("q1", "b").unwrap();
        assert_eq!(orch.answers().get("q1").map(String::as_str), Some("b"));
    }

    #[test]
    fn second_submit_is_a_no_op() {
        let mut orch = unlocked(100);
        let start = Utc::now();
        orch.start(start).unwrap();
        // Drive into the critical band first.
        orch.tick(start + Duration::seconds(96));
        assert_eq!(orch.status(), SessionStatus::Critical);
        orch.record_answer("q1", "a").unwrap();

        let first = orch.submit(start + Duration::seconds(97));
        match first {
            Some(Event::SessionSubmitted { score, .. }) => {
                assert_eq!(score.correct, 1);
                assert_eq!(score.total, 2);
            }
            other => panic!("expected SessionSubmitted, got {other:?}"),
        }
        assert!(orch.submit(start + Duration::seconds(98)).is_none());
        assert_eq!(orch.status(), SessionStatus::Submitted);
    }

    #[test]
    fn untimed_quiz_activates_without_arming_the_clock() {
        let mut orch = unlocked(0);
        let now = Utc::now();
        let event = orch.start(now).unwrap();
        match event {
            Event::SessionStarted { timed, .. } => assert!(!timed),
            other => panic!("expected SessionStarted, got {other:?}"),
        }
        assert_eq!(orch.status(), SessionStatus::Active);
        assert!(!orch.clock().is_armed());
        assert!(orch.tick(now + Duration::seconds(3600)).is_none());
        // Still answerable arbitrarily late.
        orch.record_answer("q1", "a").unwrap();
    }

    #[test]
    fn reset_keeps_progress_restart_discards_it() {
        let mut orch = unlocked(100);
        let start = Utc::now();
        orch.start(start).unwrap();
        orch.record_answer("q1", "a").unwrap();

        orch.reset(start + Duration::seconds(10));
        assert_eq!(orch.status(), SessionStatus::Locked);
        assert!(orch.answers().is_empty());
        assert!(orch.clock().started_at().is_none());
        // Progress survived: gating is still satisfied.
        assert!(orch.refresh_gating(start).is_some());

        orch.restart(start + Duration::seconds(11));
        assert_eq!(orch.status(), SessionStatus::Locked);
        assert!(orch.refresh_gating(start).is_none());
        assert_eq!(orch.gating_status().completed_count, 0);
    }

    #[test]
    fn snapshot_reports_status_and_time() {
        let mut orch = unlocked(1800);
        let start = Utc::now();
        orch.start(start).unwrap();
        match orch.snapshot(start + Duration::seconds(5)) {
            Event::StateSnapshot { status, time, .. } => {
                assert_eq!(status, SessionStatus::Active);
                assert_eq!(time.time_left_seconds, 1795);
                assert_eq!(time.formatted_time, "29:55");
                assert!(!time.is_warning);
            }
            other => panic!("expected StateSnapshot, got {other:?}"),
        }
    }

    #[test]
    fn orchestrator_round_trips_through_json() {
        let mut orch = unlocked(300);
        let start = Utc::now();
        orch.start(start).unwrap();
        orch.record_answer("q1", "a").unwrap();

        let json = serde_json::to_string(&orch).unwrap();
        let restored: SessionOrchestrator = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.status(), SessionStatus::Active);
        assert_eq!(restored.answers().len(), 1);
        assert_eq!(restored.user_id(), "user-1");
        assert!(restored.clock().is_armed());
    }
}
