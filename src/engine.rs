//! Facade wiring the rating, selection and performance components around
//! a [`QuizStore`]. The engine keeps no per-user state between calls; it
//! owns only its configuration and a seedable random source.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{DifficultyParams, EngineConfig};
use crate::performance::{self, BatchOutcome, UserTopicState};
use crate::rating::math::MathError;
use crate::rating::{update_ratings, SkillRating};
use crate::selection::{QuestionSelector, SelectError, SelectedQuestion};
use crate::session::SessionSnapshot;
use crate::store::{AnswerLogEntry, QuizStore};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Select(#[from] SelectError),
}

/// Result of grading one answer, for the caller to relay onward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub is_correct: bool,
    /// Win probability the student carried into the question.
    pub expected_win: f64,
    pub user_prev: SkillRating,
    pub user_new: SkillRating,
    pub question_prev: SkillRating,
    pub question_new: SkillRating,
}

pub struct QuizEngine {
    config: EngineConfig,
    selector: QuestionSelector,
    rng: Mutex<StdRng>,
}

impl QuizEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Fixed-seed construction makes every sampling decision reproducible.
    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: EngineConfig, rng: StdRng) -> Self {
        let selector = QuestionSelector::new(config.selection.clone());
        Self {
            config,
            selector,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Grades one answer and moves both beliefs: loads current ratings
    /// (priors on first sight), recomputes them, persists the pair and
    /// appends the audit record.
    pub fn submit_answer(
        &self,
        store: &impl QuizStore,
        user_id: &str,
        question_id: &str,
        user_answer: u32,
        correct_answer: u32,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, EngineError> {
        let user_prev = store
            .rating(user_id)
            .unwrap_or(self.config.rating.student_prior);
        let question_prev = store
            .rating(question_id)
            .unwrap_or(self.config.rating.question_prior);

        let is_correct = user_answer == correct_answer;
        let update = update_ratings(user_prev, question_prev, is_correct, &self.config.rating)?;

        store.save_rating(user_id, update.student);
        store.save_rating(question_id, update.question);
        store.append_answer_log(AnswerLogEntry {
            user_id: user_id.to_string(),
            question_id: question_id.to_string(),
            user_prev,
            user_new: update.student,
            question_prev,
            question_new: update.question,
            user_answer,
            correct_answer,
            is_correct,
            timestamp: now,
        });

        tracing::debug!(
            user_id,
            question_id,
            is_correct,
            expected_win = update.expected_win,
            "ratings updated"
        );

        Ok(AnswerOutcome {
            is_correct,
            expected_win: update.expected_win,
            user_prev,
            user_new: update.student,
            question_prev,
            question_new: update.question,
        })
    }

    /// Next question for a level, targeted by the level's authored
    /// difficulty distribution.
    pub fn next_question(
        &self,
        store: &impl QuizStore,
        level_id: &str,
        level: &DifficultyParams,
    ) -> Result<SelectedQuestion, EngineError> {
        let index = store
            .question_index(level_id)
            .ok_or(SelectError::NoQuestionAvailable)?;
        let mut rng = self.rng.lock();
        Ok(self.selector.select_next_question(level, &index, &mut *rng)?)
    }

    /// Next question targeted by a sampled win probability against the
    /// student's current rating.
    pub fn next_question_for_student(
        &self,
        store: &impl QuizStore,
        user_id: &str,
        level_id: &str,
    ) -> Result<SelectedQuestion, EngineError> {
        let student = store
            .rating(user_id)
            .unwrap_or(self.config.rating.student_prior);
        let index = store
            .question_index(level_id)
            .ok_or(SelectError::NoQuestionAvailable)?;
        let mut rng = self.rng.lock();
        Ok(self
            .selector
            .select_for_student(&student, &self.config.rating, &index, &mut *rng)?)
    }

    /// Tops up a Time Rush session's bank when it has consumed enough of
    /// it; returns the questions to append (possibly empty).
    pub fn replenish_bank<F>(
        &self,
        store: &impl QuizStore,
        session: &SessionSnapshot,
        level_id: &str,
        level: &DifficultyParams,
        topic_allowed: F,
    ) -> Result<Vec<String>, EngineError>
    where
        F: Fn(&str) -> bool,
    {
        if !session.needs_replenishment(self.config.selection.replenish_threshold) {
            return Ok(Vec::new());
        }
        let index = store
            .question_index(level_id)
            .ok_or(SelectError::NoQuestionAvailable)?;
        let mut rng = self.rng.lock();
        Ok(self.selector.replenish_question_bank(
            &session.question_bank,
            &session.questions_answered.incorrect,
            &session.questions_answered.correct,
            level,
            &index,
            topic_allowed,
            &mut *rng,
        )?)
    }

    /// Folds a finished session's history into the user's per-topic
    /// accuracy record and persists it when anything changed.
    pub fn finish_session(
        &self,
        store: &impl QuizStore,
        session: &SessionSnapshot,
        now: DateTime<Utc>,
    ) -> BatchOutcome {
        let mut state = store
            .user_topic_state(&session.user_id)
            .unwrap_or_else(|| UserTopicState::new(session.user_id.clone()));
        let outcome = performance::process_answer_batch(
            &mut state,
            &session.questions_history,
            now,
            &self.config.performance,
        );
        if outcome.topics_touched > 0 {
            store.save_user_topic_state(state);
        }
        outcome
    }
}
