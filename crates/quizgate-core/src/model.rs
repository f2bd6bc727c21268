//! Shared data model for quiz sessions.
//!
//! `QuizDefinition` comes from the content store and is read-only for the
//! lifetime of a session. `ResourceProgress` is the only mutable piece and
//! is owned by the gating engine's progress store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of learning material attached to a quiz.
///
/// The completion rule for each kind lives in the gating engine
/// (`gating::completion_rule`), not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Video,
    Pdf,
    Image,
    Link,
    Slides,
    Audio,
    Document,
    Code,
}

/// A learning material attached to a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub title: String,
    /// Must be completed before gating allows the session to start.
    #[serde(default)]
    pub required: bool,
    /// Estimated effort in seconds, for display only.
    #[serde(default)]
    pub estimated_effort_secs: Option<u32>,
}

/// One selectable answer for a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
}

/// Quiz content as provided by the content-store collaborator.
///
/// Immutable for the lifetime of a session attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Zero means the session is untimed and the clock is never armed.
    #[serde(default)]
    pub duration_seconds: u32,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_timed(&self) -> bool {
        self.duration_seconds > 0
    }

    pub fn resource(&self, resource_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == resource_id)
    }

    /// Required resources in definition order.
    pub fn required_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| r.required)
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

/// Per-resource view/completion state for one (quiz, user) pair.
///
/// `completed` is monotonic: once true it never reverts within a session.
/// `progress_ratio` is a high-watermark in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceProgress {
    pub resource_id: String,
    pub completed: bool,
    pub progress_ratio: f64,
    pub last_updated_at: DateTime<Utc>,
}

impl ResourceProgress {
    pub fn new(resource_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            resource_id: resource_id.into(),
            completed: false,
            progress_ratio: 0.0,
            last_updated_at: now,
        }
    }
}

/// Readiness verdict computed on demand from the progress store.
///
/// Derived data only; never an independent source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatingStatus {
    pub required_count: usize,
    pub completed_count: usize,
    /// 0..=100, rounded to two decimals; 100 when nothing is required.
    pub completion_percent: f64,
    pub ready: bool,
    /// Required resources not yet completed, in definition order.
    pub missing_resource_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_from_json_fills_defaults() {
        let quiz = QuizDefinition::from_json(r#"{"id": "q1"}"#).unwrap();
        assert_eq!(quiz.id, "q1");
        assert_eq!(quiz.duration_seconds, 0);
        assert!(!quiz.is_timed());
        assert!(quiz.resources.is_empty());
    }

    #[test]
    fn resource_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ResourceKind::Pdf).unwrap();
        assert_eq!(json, "\"pdf\"");
        let kind: ResourceKind = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(kind, ResourceKind::Video);
    }

    #[test]
    fn required_resources_preserve_order() {
        let quiz = QuizDefinition::from_json(
            r#"{
                "id": "q1",
                "resources": [
                    {"id": "a", "kind": "video", "required": true},
                    {"id": "b", "kind": "pdf"},
                    {"id": "c", "kind": "link", "required": true}
                ]
            }"#,
        )
        .unwrap();
        let ids: Vec<_> = quiz.required_resources().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
