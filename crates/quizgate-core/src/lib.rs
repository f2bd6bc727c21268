//! # Quizgate Core Library
//!
//! Core business logic for Quizgate, a quiz-taking session controller:
//! a drift-resistant countdown governing how long a learner may spend on a
//! quiz, and a resource-gating engine deciding whether the timed session
//! may start at all. All operations are available through a standalone CLI
//! binary; any UI is a thin layer over the same core.
//!
//! ## Architecture
//!
//! - **Session Clock**: wall-clock countdown recomputed from absolute
//!   timestamps -- immune to missed or delayed ticks
//! - **Gating Engine**: monotonic per-resource progress plus a pure
//!   readiness verdict over the quiz's required resources
//! - **Session Orchestrator**: the state machine tying gating to the
//!   clock; the caller (CLI or hub) drives `tick()` periodically
//! - **Session Hub**: one tokio task per active session for server-side
//!   deployments
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionOrchestrator`]: per-learner session state machine
//! - [`GatingEngine`]: readiness verdicts and progress merging
//! - [`SessionClock`]: drift-resistant countdown
//! - [`Database`]: progress/result persistence
//! - [`Config`]: policy constants (thresholds and ratios)

pub mod clock;
pub mod error;
pub mod events;
pub mod gating;
pub mod hub;
pub mod model;
pub mod scoring;
pub mod session;
pub mod storage;

pub use clock::{SessionClock, TimeSnapshot};
pub use error::{ConfigError, CoreError, SessionError, StorageError};
pub use events::Event;
pub use gating::{GatingEngine, GatingPolicy, ProgressOutcome, ProgressUpdate};
pub use hub::{SessionHandle, SessionHub, SessionKey};
pub use model::{
    AnswerOption, GatingStatus, Question, QuizDefinition, Resource, ResourceKind, ResourceProgress,
};
pub use scoring::ScoreSummary;
pub use session::{SessionOrchestrator, SessionPolicy, SessionStatus};
pub use storage::{Config, Database, ResultRecord};
