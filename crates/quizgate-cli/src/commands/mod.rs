pub mod config;
pub mod progress;
pub mod results;
pub mod session;

use quizgate_core::storage::Database;
use quizgate_core::{CoreError, SessionOrchestrator};

/// kv key under which the current session is parked between invocations.
pub const SESSION_KEY: &str = "session_current";

pub fn load_session(db: &Database) -> Result<SessionOrchestrator, CoreError> {
    match db.kv_get(SESSION_KEY)? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Err(CoreError::Custom(
            "no open session; run `quizgate-cli session open` first".into(),
        )),
    }
}

pub fn save_session(db: &Database, orchestrator: &SessionOrchestrator) -> Result<(), CoreError> {
    let json = serde_json::to_string(orchestrator)?;
    db.kv_set(SESSION_KEY, &json)?;
    Ok(())
}
