//! Rolling per-topic accuracy.
//!
//! Each (user, topic) pair keeps a bounded sliding window of attempt
//! outcomes plus an append-only accuracy history. Folding a session's
//! answers in is a batched commit: a topic touched many times in one batch
//! gets exactly one new history point.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PerformanceParams;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSample {
    pub timestamp: DateTime<Utc>,
    /// 1 for a correct attempt, 0 for an incorrect one.
    pub value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyPoint {
    pub timestamp: DateTime<Utc>,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPerformanceEntry {
    pub topic_id: String,
    pub attempts_window: Vec<AttemptSample>,
    pub accuracy_history: Vec<AccuracyPoint>,
}

impl TopicPerformanceEntry {
    fn new(topic_id: String) -> Self {
        Self {
            topic_id,
            attempts_window: Vec::new(),
            accuracy_history: Vec::new(),
        }
    }
}

/// One user's per-topic performance record. Topic entries are created
/// lazily on first attempt and never deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTopicState {
    pub user_id: String,
    pub topics: Vec<TopicPerformanceEntry>,
}

impl UserTopicState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            topics: Vec::new(),
        }
    }

    fn ensure_topic(&mut self, topic_id: &str) -> usize {
        if let Some(idx) = self.topics.iter().position(|t| t.topic_id == topic_id) {
            return idx;
        }
        self.topics
            .push(TopicPerformanceEntry::new(topic_id.to_string()));
        self.topics.len() - 1
    }
}

/// One graded question from a session's history, as handed over by the
/// session boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    /// Ground-truth option index; entries without one are skipped.
    pub correct_option: Option<u32>,
    pub user_choice: Option<u32>,
    pub topics: Vec<String>,
}

impl AnsweredQuestion {
    /// `None` when the entry has no ground truth to grade against.
    pub fn is_correct(&self) -> Option<bool> {
        self.correct_option
            .map(|correct| self.user_choice == Some(correct))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAccuracyUpdate {
    pub topic_id: String,
    pub previous_accuracy: Option<f64>,
    pub updated_accuracy: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub topics_touched: usize,
    pub skipped_questions: usize,
    pub topics: Vec<TopicAccuracyUpdate>,
}

/// Weighted moving average over a window, oldest sample first with weight
/// `weight^0`. A non-finite or non-positive weight degrades to a plain
/// average instead of poisoning the stored accuracy.
pub fn weighted_moving_average(samples: &[AttemptSample], weight: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let weight = if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        tracing::warn!(weight, "degenerate accuracy weight, using uniform");
        1.0
    };

    let mut sorted = samples.to_vec();
    sorted.sort_by_key(|s| s.timestamp);

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (index, sample) in sorted.iter().enumerate() {
        let w = weight.powi(index as i32);
        numerator += f64::from(sample.value) * w;
        denominator += w;
    }
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Folds a batch of graded answers into the user's per-topic windows, then
/// appends one fresh accuracy point per distinct touched topic. Entries
/// without a ground-truth option are counted and skipped; they never abort
/// the batch. A batch with no valid entries leaves `state` untouched.
pub fn process_answer_batch(
    state: &mut UserTopicState,
    history: &[AnsweredQuestion],
    now: DateTime<Utc>,
    params: &PerformanceParams,
) -> BatchOutcome {
    let mut touched: BTreeSet<usize> = BTreeSet::new();
    let mut skipped = 0usize;

    for entry in history {
        let value = match entry.is_correct() {
            Some(correct) => u8::from(correct),
            None => {
                skipped += 1;
                continue;
            }
        };

        for topic_id in &entry.topics {
            if topic_id.is_empty() {
                continue;
            }
            let idx = state.ensure_topic(topic_id);
            let topic = &mut state.topics[idx];
            topic.attempts_window.push(AttemptSample {
                timestamp: now,
                value,
            });
            let len = topic.attempts_window.len();
            if len > params.attempt_window_size {
                topic.attempts_window.drain(..len - params.attempt_window_size);
            }
            touched.insert(idx);
        }
    }

    let mut updates = Vec::with_capacity(touched.len());
    for idx in &touched {
        let topic = &mut state.topics[*idx];
        let previous_accuracy = topic.accuracy_history.last().map(|p| p.accuracy);
        let accuracy = weighted_moving_average(&topic.attempts_window, params.accuracy_weight);
        topic.accuracy_history.push(AccuracyPoint {
            timestamp: now,
            accuracy,
        });
        updates.push(TopicAccuracyUpdate {
            topic_id: topic.topic_id.clone(),
            previous_accuracy,
            updated_accuracy: accuracy,
        });
    }

    BatchOutcome {
        topics_touched: touched.len(),
        skipped_questions: skipped,
        topics: updates,
    }
}
