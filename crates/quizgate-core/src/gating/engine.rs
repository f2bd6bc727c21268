//! Gating engine: decides whether the learner may start the timed session.
//!
//! Completion rules are a per-kind predicate table kept in one place
//! (`completion_rule`) rather than scattered type switches. Fractional
//! tracking only gates media kinds; everything else completes on an
//! explicit viewed signal, though a ratio may still be recorded for
//! display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::progress::ProgressStore;
use crate::model::{GatingStatus, QuizDefinition, ResourceKind, ResourceProgress};

/// How a resource kind reaches completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionRule {
    /// Complete once the watched/listened ratio reaches the configured
    /// threshold, or on an explicit signal.
    MediaRatio,
    /// Complete only on an explicit viewed signal.
    ExplicitView,
}

/// Predicate table over resource kinds.
pub fn completion_rule(kind: ResourceKind) -> CompletionRule {
    match kind {
        ResourceKind::Video | ResourceKind::Audio => CompletionRule::MediaRatio,
        ResourceKind::Pdf
        | ResourceKind::Image
        | ResourceKind::Link
        | ResourceKind::Slides
        | ResourceKind::Document
        | ResourceKind::Code => CompletionRule::ExplicitView,
    }
}

/// Gating policy knobs; defaults match the production behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatingPolicy {
    /// Watched ratio at which video/audio count as complete.
    pub media_completion_threshold: f64,
}

impl Default for GatingPolicy {
    fn default() -> Self {
        Self {
            media_completion_threshold: 0.8,
        }
    }
}

/// A single progress report from the viewer layer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub progress_ratio: Option<f64>,
    pub completed: Option<bool>,
}

impl ProgressUpdate {
    pub fn ratio(ratio: f64) -> Self {
        Self {
            progress_ratio: Some(ratio),
            completed: None,
        }
    }

    pub fn viewed() -> Self {
        Self {
            progress_ratio: None,
            completed: Some(true),
        }
    }
}

/// What a progress report did. Regressions and unknown ids are benign
/// anomalies for the observability layer, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressOutcome {
    Applied { newly_completed: bool },
    /// Identical or stale payload; nothing moved.
    Unchanged,
    /// Lower watermark or un-complete attempt; ignored.
    IgnoredRegression,
    /// Resource id not in the quiz's resource list; ignored.
    UnknownResource,
}

impl ProgressOutcome {
    pub fn newly_completed(self) -> bool {
        matches!(self, ProgressOutcome::Applied { newly_completed: true })
    }
}

/// Gating engine for one (quiz, user) session context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatingEngine {
    policy: GatingPolicy,
    store: ProgressStore,
}

impl GatingEngine {
    pub fn new(policy: GatingPolicy) -> Self {
        Self {
            policy,
            store: ProgressStore::default(),
        }
    }

    /// Seed the store from persisted rows (resume-on-reload).
    pub fn with_entries(policy: GatingPolicy, entries: Vec<ResourceProgress>) -> Self {
        Self {
            policy,
            store: ProgressStore::from_entries(entries),
        }
    }

    pub fn progress(&self, resource_id: &str) -> Option<&ResourceProgress> {
        self.store.get(resource_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ResourceProgress> {
        self.store.entries()
    }

    pub fn clear_progress(&mut self) {
        self.store.clear();
    }

    /// Merge a progress report for `resource_id`.
    ///
    /// Monotonic: lower ratios and `completed = false` after completion are
    /// no-ops reported as `IgnoredRegression`. Unknown resource ids are
    /// ignored with `UnknownResource`. Media kinds auto-complete when the
    /// merged watermark reaches the policy threshold.
    pub fn record_progress(
        &mut self,
        quiz: &QuizDefinition,
        resource_id: &str,
        update: ProgressUpdate,
        now: DateTime<Utc>,
    ) -> ProgressOutcome {
        let Some(resource) = quiz.resource(resource_id) else {
            return ProgressOutcome::UnknownResource;
        };

        let effect = self
            .store
            .merge(resource_id, update.progress_ratio, update.completed, now);
        let mut newly_completed = effect.newly_completed;

        if completion_rule(resource.kind) == CompletionRule::MediaRatio {
            let watermark = self
                .store
                .get(resource_id)
                .map(|p| p.progress_ratio)
                .unwrap_or(0.0);
            if watermark >= self.policy.media_completion_threshold
                && self.store.mark_completed(resource_id, now)
            {
                newly_completed = true;
            }
        }

        if effect.ratio_raised || newly_completed {
            ProgressOutcome::Applied { newly_completed }
        } else if effect.regressed {
            ProgressOutcome::IgnoredRegression
        } else {
            ProgressOutcome::Unchanged
        }
    }

    /// Readiness verdict, recomputed from the store.
    ///
    /// Pure over the engine's state: no side effects, safe for concurrent
    /// readers. Missing ids come out in the quiz's resource-list order.
    pub fn compute_status(&self, quiz: &QuizDefinition) -> GatingStatus {
        let mut required_count = 0usize;
        let mut completed_count = 0usize;
        let mut missing_resource_ids = Vec::new();

        for resource in quiz.required_resources() {
            required_count += 1;
            if self.store.is_completed(&resource.id) {
                completed_count += 1;
            } else {
                missing_resource_ids.push(resource.id.clone());
            }
        }

        let completion_percent = if required_count == 0 {
            100.0
        } else {
            round2(completed_count as f64 / required_count as f64 * 100.0)
        };

        GatingStatus {
            required_count,
            completed_count,
            completion_percent,
            ready: completed_count >= required_count,
            missing_resource_ids,
        }
    }

    /// Completion percentage across all resources, required or not.
    /// Display-only figure for progress bars.
    pub fn overall_percent(&self, quiz: &QuizDefinition) -> f64 {
        if quiz.resources.is_empty() {
            return 0.0;
        }
        let completed = quiz
            .resources
            .iter()
            .filter(|r| self.store.is_completed(&r.id))
            .count();
        round2(completed as f64 / quiz.resources.len() as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
