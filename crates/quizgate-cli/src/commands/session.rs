use chrono::Utc;
use clap::Subcommand;
use quizgate_core::storage::{Config, Database, ResultRecord};
use quizgate_core::{CoreError, Event, QuizDefinition, SessionOrchestrator};

use super::{load_session, save_session, SESSION_KEY};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Open a session for a quiz file, resuming persisted progress
    Open {
        /// Path to a quiz definition JSON file
        #[arg(long)]
        quiz: String,
        /// Learner id keying progress and results
        #[arg(long)]
        user: String,
    },
    /// Start the attempt (arms the countdown for timed quizzes)
    Start,
    /// Advance the countdown once and print any transition
    Tick,
    /// Record an answer
    Answer {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
    },
    /// Submit the attempt and record the result
    Submit,
    /// Print current session state as JSON
    Status,
    /// Back to locked; keeps resource progress
    Reset,
    /// Back to locked; discards resource progress
    Restart,
    /// Close the session and drop its parked state
    Exit,
}

pub fn run(action: SessionAction) -> Result<(), CoreError> {
    let db = Database::open()?;
    let now = Utc::now();

    match action {
        SessionAction::Open { quiz, user } => {
            let content = std::fs::read_to_string(&quiz)?;
            let quiz = QuizDefinition::from_json(&content)?;
            let persisted = db.load_progress(&quiz.id, &user)?;
            let policy = Config::load()?.session_policy();
            let mut orchestrator =
                SessionOrchestrator::with_progress(quiz, user, policy, persisted);
            if let Some(event) = orchestrator.refresh_gating(now) {
                print_event(&event)?;
            }
            save_session(&db, &orchestrator)?;
            print_event(&orchestrator.snapshot(now))?;
        }
        SessionAction::Start => {
            let mut orchestrator = load_session(&db)?;
            let event = orchestrator.start(now)?;
            save_session(&db, &orchestrator)?;
            print_event(&event)?;
        }
        SessionAction::Tick => {
            let mut orchestrator = load_session(&db)?;
            match orchestrator.tick(now) {
                Some(event) => {
                    if let Event::SessionExpired { score, .. } = &event {
                        db.record_result(&ResultRecord::new(
                            &orchestrator.quiz().id,
                            orchestrator.user_id(),
                            *score,
                            orchestrator.time_spent_secs(now),
                            true,
                            now,
                        ))?;
                    }
                    print_event(&event)?;
                }
                None => print_event(&orchestrator.snapshot(now))?,
            }
            save_session(&db, &orchestrator)?;
        }
        SessionAction::Answer { question, answer } => {
            let mut orchestrator = load_session(&db)?;
            orchestrator.record_answer(question, answer)?;
            save_session(&db, &orchestrator)?;
            print_event(&orchestrator.snapshot(now))?;
        }
        SessionAction::Submit => {
            let mut orchestrator = load_session(&db)?;
            match orchestrator.submit(now) {
                Some(event) => {
                    if let Event::SessionSubmitted { score, .. } = &event {
                        db.record_result(&ResultRecord::new(
                            &orchestrator.quiz().id,
                            orchestrator.user_id(),
                            *score,
                            orchestrator.time_spent_secs(now),
                            false,
                            now,
                        ))?;
                    }
                    save_session(&db, &orchestrator)?;
                    print_event(&event)?;
                }
                None => {
                    // Already expired or submitted; nothing to record.
                    print_event(&orchestrator.snapshot(now))?;
                }
            }
        }
        SessionAction::Status => {
            let orchestrator = load_session(&db)?;
            print_event(&orchestrator.snapshot(now))?;
        }
        SessionAction::Reset => {
            let mut orchestrator = load_session(&db)?;
            let event = orchestrator.reset(now);
            orchestrator.refresh_gating(now);
            save_session(&db, &orchestrator)?;
            print_event(&event)?;
        }
        SessionAction::Restart => {
            let mut orchestrator = load_session(&db)?;
            let event = orchestrator.restart(now);
            db.clear_progress(&orchestrator.quiz().id, orchestrator.user_id())?;
            save_session(&db, &orchestrator)?;
            print_event(&event)?;
        }
        SessionAction::Exit => {
            db.kv_delete(SESSION_KEY)?;
            println!("{{\"type\": \"session_closed\"}}");
        }
    }
    Ok(())
}

fn print_event(event: &Event) -> Result<(), CoreError> {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}
