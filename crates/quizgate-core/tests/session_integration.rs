//! Integration tests for the full session lifecycle: gating, countdown,
//! submission, and resume-on-reload through the storage layer.

use chrono::{Duration, Utc};
use quizgate_core::storage::{Database, ResultRecord};
use quizgate_core::{
    Event, ProgressUpdate, QuizDefinition, SessionOrchestrator, SessionPolicy, SessionStatus,
};

fn sample_quiz() -> QuizDefinition {
    QuizDefinition::from_json(
        r#"{
            "id": "rust-basics",
            "title": "Rust Basics",
            "duration_seconds": 1800,
            "resources": [
                {"id": "intro-video", "kind": "video", "title": "Intro", "required": true},
                {"id": "ownership-notes", "kind": "pdf", "title": "Notes", "required": true},
                {"id": "extra-reading", "kind": "link", "title": "Extra"}
            ],
            "questions": [
                {"id": "q1", "prompt": "Who owns a moved value?", "options": [
                    {"id": "a", "text": "The new binding", "correct": true},
                    {"id": "b", "text": "Both bindings"}
                ]},
                {"id": "q2", "prompt": "What does ? do?", "options": [
                    {"id": "a", "text": "Panics"},
                    {"id": "b", "text": "Propagates the error", "correct": true}
                ]},
                {"id": "q3", "prompt": "Is String Copy?", "options": [
                    {"id": "a", "text": "Yes"},
                    {"id": "b", "text": "No", "correct": true}
                ]}
            ]
        }"#,
    )
    .unwrap()
}

#[test]
fn gated_session_runs_to_manual_submission() {
    let mut orch = SessionOrchestrator::new(sample_quiz(), "learner-1", SessionPolicy::default());
    let now = Utc::now();

    // Locked until both required resources complete; the optional link
    // plays no part in readiness.
    assert!(orch.start(now).is_err());
    orch.record_progress("extra-reading", ProgressUpdate::viewed(), now);
    assert_eq!(orch.status(), SessionStatus::Locked);

    orch.record_progress("intro-video", ProgressUpdate::ratio(0.82), now);
    let (_, unlock) = orch.record_progress("ownership-notes", ProgressUpdate::viewed(), now);
    assert!(matches!(unlock, Some(Event::GatingReady { .. })));

    let started = orch.start(now).unwrap();
    assert!(matches!(started, Event::SessionStarted { timed: true, .. }));

    orch.record_answer("q1", "a").unwrap();
    orch.record_answer("q2", "b").unwrap();
    orch.record_answer("q3", "a").unwrap();
    assert!(orch.unanswered_question_ids().is_empty());

    let event = orch.submit(now + Duration::seconds(600)).unwrap();
    match event {
        Event::SessionSubmitted { score, .. } => {
            assert_eq!(score.correct, 2);
            assert_eq!(score.total, 3);
            assert_eq!(score.percentage, 67);
        }
        other => panic!("expected SessionSubmitted, got {other:?}"),
    }
    assert_eq!(orch.time_spent_secs(now + Duration::seconds(600)), 600);
}

#[test]
fn progress_resumes_across_reload() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("quizgate.db")).unwrap();
    let quiz = sample_quiz();
    let now = Utc::now();

    // First visit: watch the video, persist, leave.
    {
        let mut orch = SessionOrchestrator::new(quiz.clone(), "learner-1", SessionPolicy::default());
        orch.record_progress("intro-video", ProgressUpdate::ratio(0.9), now);
        for entry in orch.gating().entries() {
            db.upsert_progress(&quiz.id, "learner-1", entry).unwrap();
        }
    }

    // Reload: the watermark survives, gating picks up where it left off.
    let persisted = db.load_progress(&quiz.id, "learner-1").unwrap();
    let mut orch = SessionOrchestrator::with_progress(
        quiz.clone(),
        "learner-1",
        SessionPolicy::default(),
        persisted,
    );
    let status = orch.gating_status();
    assert_eq!(status.completed_count, 1);
    assert_eq!(
        status.missing_resource_ids,
        vec!["ownership-notes".to_string()]
    );

    let (_, unlock) = orch.record_progress("ownership-notes", ProgressUpdate::viewed(), now);
    assert!(unlock.is_some());
    assert!(orch.start(now).is_ok());
}

#[test]
fn parked_session_survives_the_kv_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("quizgate.db")).unwrap();
    let now = Utc::now();

    let mut orch = SessionOrchestrator::new(sample_quiz(), "learner-1", SessionPolicy::default());
    orch.record_progress("intro-video", ProgressUpdate::ratio(0.95), now);
    orch.record_progress("ownership-notes", ProgressUpdate::viewed(), now);
    orch.start(now).unwrap();
    orch.record_answer("q1", "a").unwrap();

    db.kv_set("session_current", &serde_json::to_string(&orch).unwrap())
        .unwrap();

    let json = db.kv_get("session_current").unwrap().unwrap();
    let mut restored: SessionOrchestrator = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.status(), SessionStatus::Active);

    // The countdown keeps running off the original baseline: a restored
    // session that slept past its deadline expires on the first tick.
    let event = restored.tick(now + Duration::seconds(3600));
    assert!(matches!(event, Some(Event::SessionExpired { .. })));
    assert_eq!(restored.answers().len(), 1);
}

#[test]
fn expiry_result_is_recorded_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("quizgate.db")).unwrap();
    let quiz = sample_quiz();
    let now = Utc::now();

    let mut orch = SessionOrchestrator::new(quiz.clone(), "learner-1", SessionPolicy::default());
    orch.record_progress("intro-video", ProgressUpdate::ratio(1.0), now);
    orch.record_progress("ownership-notes", ProgressUpdate::viewed(), now);
    orch.start(now).unwrap();
    orch.record_answer("q1", "a").unwrap();

    let late = now + Duration::seconds(1801);
    let mut recorded = 0;
    for i in 0..3 {
        if let Some(Event::SessionExpired { score, at, .. }) = orch.tick(late + Duration::seconds(i))
        {
            let record = ResultRecord::new(
                &quiz.id,
                orch.user_id(),
                score,
                orch.time_spent_secs(at),
                true,
                at,
            );
            db.record_result(&record).unwrap();
            recorded += 1;
        }
    }
    assert_eq!(recorded, 1);

    let results = db.recent_results(10).unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].expired);
    assert_eq!(results[0].correct, 1);
    assert_eq!(results[0].time_spent_secs, 1800);
}

#[test]
fn untimed_quiz_never_expires() {
    let quiz = QuizDefinition::from_json(
        r#"{
            "id": "untimed",
            "questions": [
                {"id": "q1", "options": [{"id": "a", "correct": true}]}
            ]
        }"#,
    )
    .unwrap();
    let mut orch = SessionOrchestrator::new(quiz, "learner-1", SessionPolicy::default());
    let now = Utc::now();

    // No resources at all: trivially ready.
    assert!(orch.refresh_gating(now).is_some());
    orch.start(now).unwrap();
    assert!(orch.tick(now + Duration::days(2)).is_none());
    orch.record_answer("q1", "a").unwrap();
    let event = orch.submit(now + Duration::days(2)).unwrap();
    assert!(matches!(event, Event::SessionSubmitted { .. }));
}
