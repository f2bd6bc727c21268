//! Per-session resource progress store.
//!
//! One store per (quiz, user) session context. Entries are created on the
//! first progress report and merged monotonically afterwards: the ratio is
//! a high-watermark and `completed` never reverts. The storage layer can
//! seed the store for resume-on-reload and read it back for persistence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ResourceProgress;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressStore {
    entries: BTreeMap<String, ResourceProgress>,
}

/// What a monotonic merge actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MergeEffect {
    pub ratio_raised: bool,
    pub newly_completed: bool,
    /// The report tried to lower the watermark or un-complete the entry.
    pub regressed: bool,
}

impl ProgressStore {
    pub fn from_entries(entries: Vec<ResourceProgress>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|p| (p.resource_id.clone(), p))
                .collect(),
        }
    }

    pub fn get(&self, resource_id: &str) -> Option<&ResourceProgress> {
        self.entries.get(resource_id)
    }

    pub fn is_completed(&self, resource_id: &str) -> bool {
        self.entries.get(resource_id).is_some_and(|p| p.completed)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ResourceProgress> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Merge a report into the entry for `resource_id`, creating it on
    /// first contact. `ratio` and `completed` only ever move forward.
    pub(crate) fn merge(
        &mut self,
        resource_id: &str,
        ratio: Option<f64>,
        completed: Option<bool>,
        now: DateTime<Utc>,
    ) -> MergeEffect {
        let entry = self
            .entries
            .entry(resource_id.to_string())
            .or_insert_with(|| ResourceProgress::new(resource_id, now));

        let mut effect = MergeEffect {
            ratio_raised: false,
            newly_completed: false,
            regressed: false,
        };

        if let Some(ratio) = ratio {
            let ratio = ratio.clamp(0.0, 1.0);
            if ratio > entry.progress_ratio {
                entry.progress_ratio = ratio;
                effect.ratio_raised = true;
            } else if ratio < entry.progress_ratio {
                effect.regressed = true;
            }
        }

        match completed {
            Some(true) if !entry.completed => {
                entry.completed = true;
                effect.newly_completed = true;
            }
            Some(false) if entry.completed => {
                effect.regressed = true;
            }
            _ => {}
        }

        if effect.ratio_raised || effect.newly_completed {
            entry.last_updated_at = now;
        }
        effect
    }

    /// Mark completion directly (used when a kind's threshold is crossed).
    pub(crate) fn mark_completed(&mut self, resource_id: &str, now: DateTime<Utc>) -> bool {
        let entry = self
            .entries
            .entry(resource_id.to_string())
            .or_insert_with(|| ResourceProgress::new(resource_id, now));
        if entry.completed {
            return false;
        }
        entry.completed = true;
        entry.last_updated_at = now;
        true
    }
}
