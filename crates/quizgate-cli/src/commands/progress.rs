use chrono::Utc;
use clap::Subcommand;
use quizgate_core::storage::Database;
use quizgate_core::{CoreError, ProgressOutcome, ProgressUpdate};

use super::{load_session, save_session};

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Merge a progress report for one resource
    Record {
        /// Resource id from the quiz definition
        #[arg(long)]
        resource: String,
        /// Watched/read ratio in [0, 1]
        #[arg(long)]
        ratio: Option<f64>,
        /// Explicit viewed/completed signal
        #[arg(long)]
        viewed: bool,
    },
    /// Print the gating status as JSON
    Status,
}

pub fn run(action: ProgressAction) -> Result<(), CoreError> {
    let db = Database::open()?;
    let now = Utc::now();

    match action {
        ProgressAction::Record {
            resource,
            ratio,
            viewed,
        } => {
            let mut orchestrator = load_session(&db)?;
            let update = ProgressUpdate {
                progress_ratio: ratio,
                completed: viewed.then_some(true),
            };
            let (outcome, unlock) = orchestrator.record_progress(&resource, update, now);

            match outcome {
                ProgressOutcome::IgnoredRegression => {
                    eprintln!("warning: stale progress for '{resource}' ignored");
                }
                ProgressOutcome::UnknownResource => {
                    eprintln!("warning: '{resource}' is not in this quiz's resource list");
                }
                _ => {}
            }

            if let Some(progress) = orchestrator.gating().progress(&resource) {
                db.upsert_progress(&orchestrator.quiz().id, orchestrator.user_id(), progress)?;
            }
            save_session(&db, &orchestrator)?;

            if let Some(event) = unlock {
                println!("{}", serde_json::to_string_pretty(&event)?);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&orchestrator.gating_status())?
            );
        }
        ProgressAction::Status => {
            let orchestrator = load_session(&db)?;
            let status = orchestrator.gating_status();
            let overall = orchestrator.gating().overall_percent(orchestrator.quiz());
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "gating": status,
                    "overall_percent": overall,
                }))?
            );
        }
    }
    Ok(())
}
