mod engine;
mod progress;

pub use engine::{completion_rule, CompletionRule, GatingEngine, GatingPolicy, ProgressOutcome, ProgressUpdate};
pub use progress::ProgressStore;
