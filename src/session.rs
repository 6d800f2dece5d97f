//! Pure snapshot of one level session, owned by the caller. The engine
//! never stores sessions; transport and lifecycle live outside this crate.

use serde::{Deserialize, Serialize};

use crate::performance::AnsweredQuestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum AttemptType {
    #[default]
    TimeRush,
    PrecisionPath,
}

impl AttemptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeRush => "time_rush",
            Self::PrecisionPath => "precision_path",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "precision_path" => Self::PrecisionPath,
            _ => Self::TimeRush,
        }
    }
}

/// XP granted for one question, authored per question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpReward {
    pub correct: f64,
    pub incorrect: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpState {
    pub current_xp: f64,
    pub required_xp: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredLists {
    pub correct: Vec<String>,
    pub incorrect: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user_id: String,
    pub attempt_type: AttemptType,
    pub question_bank: Vec<String>,
    pub current_question_index: usize,
    pub questions_answered: AnsweredLists,
    pub questions_history: Vec<AnsweredQuestion>,
    pub xp: XpState,
}

impl SessionSnapshot {
    pub fn new(
        user_id: impl Into<String>,
        attempt_type: AttemptType,
        question_bank: Vec<String>,
        required_xp: f64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            attempt_type,
            question_bank,
            current_question_index: 0,
            questions_answered: AnsweredLists::default(),
            questions_history: Vec::new(),
            xp: XpState {
                current_xp: 0.0,
                required_xp,
            },
        }
    }

    pub fn current_question(&self) -> Option<&str> {
        self.question_bank
            .get(self.current_question_index)
            .map(String::as_str)
    }

    /// Folds one graded answer into the snapshot: answered lists, history,
    /// XP tally, and the bank cursor. Returns the XP earned.
    pub fn record_answer(
        &mut self,
        question_id: &str,
        answer: AnsweredQuestion,
        reward: XpReward,
    ) -> f64 {
        let correct = answer.is_correct().unwrap_or(false);
        let earned = if correct {
            self.questions_answered.correct.push(question_id.to_string());
            reward.correct
        } else {
            self.questions_answered
                .incorrect
                .push(question_id.to_string());
            reward.incorrect
        };
        self.xp.current_xp += earned;
        self.questions_history.push(answer);
        self.current_question_index += 1;
        earned
    }

    /// Time Rush banks are topped up once the cursor passes `threshold`
    /// of the bank; Precision Path runs a fixed bank.
    pub fn needs_replenishment(&self, threshold: f64) -> bool {
        self.attempt_type == AttemptType::TimeRush
            && self.current_question_index as f64 >= self.question_bank.len() as f64 * threshold
    }

    pub fn is_complete(&self) -> bool {
        self.xp.current_xp >= self.xp.required_xp
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_question_index >= self.question_bank.len()
    }
}
