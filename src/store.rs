//! Persistence seam. All durable state (ratings, indexes, topic windows,
//! the answer audit log) lives behind [`QuizStore`]; the engine computes
//! deltas and hands them back. Implementors must serialize concurrent
//! mutations per entity: the engine assumes it saw the latest committed
//! state when it computed an update.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::performance::UserTopicState;
use crate::rating::math::MathError;
use crate::rating::SkillRating;
use crate::selection::QuestionDifficultyIndex;

/// Audit record of one graded answer, with both parties' rating
/// transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerLogEntry {
    pub user_id: String,
    pub question_id: String,
    pub user_prev: SkillRating,
    pub user_new: SkillRating,
    pub question_prev: SkillRating,
    pub question_new: SkillRating,
    pub user_answer: u32,
    pub correct_answer: u32,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
}

pub trait QuizStore {
    /// Current belief for a student or question, if one has been stored.
    fn rating(&self, entity_id: &str) -> Option<SkillRating>;

    /// Persists a belief. When `entity_id` is an indexed question, the
    /// store must keep its index entries in sync so selection and rating
    /// never disagree.
    fn save_rating(&self, entity_id: &str, rating: SkillRating);

    /// Difficulty index for a level's question pool.
    fn question_index(&self, level_id: &str) -> Option<QuestionDifficultyIndex>;

    fn user_topic_state(&self, user_id: &str) -> Option<UserTopicState>;

    fn save_user_topic_state(&self, state: UserTopicState);

    fn append_answer_log(&self, entry: AnswerLogEntry);
}

/// In-memory store for tests and embedders that run without a database.
#[derive(Default)]
pub struct MemoryStore {
    ratings: RwLock<HashMap<String, SkillRating>>,
    indexes: RwLock<HashMap<String, QuestionDifficultyIndex>>,
    topic_states: RwLock<HashMap<String, UserTopicState>>,
    answer_log: RwLock<Vec<AnswerLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a question under a level: stores its rating and indexes
    /// its difficulty mean in one step.
    pub fn add_question(
        &self,
        level_id: &str,
        question_id: &str,
        rating: SkillRating,
    ) -> Result<(), MathError> {
        rating.validate()?;
        self.indexes
            .write()
            .entry(level_id.to_string())
            .or_default()
            .insert(question_id.to_string(), rating.mu)?;
        self.ratings
            .write()
            .insert(question_id.to_string(), rating);
        Ok(())
    }

    pub fn answer_log(&self) -> Vec<AnswerLogEntry> {
        self.answer_log.read().clone()
    }
}

impl QuizStore for MemoryStore {
    fn rating(&self, entity_id: &str) -> Option<SkillRating> {
        self.ratings.read().get(entity_id).copied()
    }

    fn save_rating(&self, entity_id: &str, rating: SkillRating) {
        if rating.validate().is_err() {
            tracing::warn!(entity_id, "refusing to store corrupt rating");
            return;
        }
        self.ratings
            .write()
            .insert(entity_id.to_string(), rating);
        for index in self.indexes.write().values_mut() {
            let _ = index.set_difficulty(entity_id, rating.mu);
        }
    }

    fn question_index(&self, level_id: &str) -> Option<QuestionDifficultyIndex> {
        self.indexes.read().get(level_id).cloned()
    }

    fn user_topic_state(&self, user_id: &str) -> Option<UserTopicState> {
        self.topic_states.read().get(user_id).cloned()
    }

    fn save_user_topic_state(&self, state: UserTopicState) {
        self.topic_states
            .write()
            .insert(state.user_id.clone(), state);
    }

    fn append_answer_log(&self, entry: AnswerLogEntry) {
        self.answer_log.write().push(entry);
    }
}
