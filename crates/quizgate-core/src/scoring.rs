//! Final score computation against the quiz's answer key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub correct: u32,
    pub total: u32,
    /// 0..=100, rounded to the nearest integer.
    pub percentage: u32,
}

/// Score recorded answers against the answer key. Unanswered questions and
/// answers that name no known option simply count as incorrect.
pub fn score(questions: &[Question], answers: &BTreeMap<String, String>) -> ScoreSummary {
    let total = questions.len() as u32;
    let correct = questions
        .iter()
        .filter(|q| {
            answers
                .get(&q.id)
                .and_then(|picked| q.options.iter().find(|o| &o.id == picked))
                .is_some_and(|o| o.correct)
        })
        .count() as u32;

    let percentage = if total == 0 {
        0
    } else {
        (f64::from(correct) / f64::from(total) * 100.0).round() as u32
    };

    ScoreSummary {
        correct,
        total,
        percentage,
    }
}
