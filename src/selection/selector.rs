//! Picks the next question for a student.
//!
//! Two targeting modes feed the same index lookup: a level's authored
//! skew-normal difficulty distribution, or a sampled target win probability
//! converted through the student's current rating. The lookup takes the
//! closest question at or above the target and clamps to the hardest
//! available one when the target overshoots the pool.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{DifficultyParams, RatingParams, SelectionParams};
use crate::rating::math::{self, MathError};
use crate::rating::SkillRating;
use crate::selection::index::QuestionDifficultyIndex;

// Target win probability bands: mostly even-odds questions, with a small
// chance of a clearly harder or clearly easier one.
const BAND_MAIN: (f64, f64) = (0.35, 0.55);
const BAND_HARD: (f64, f64) = (0.20, 0.35);
const BAND_EASY: (f64, f64) = (0.55, 0.70);
const MAIN_SHARE: f64 = 0.8;

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("no question available")]
    NoQuestionAvailable,
    #[error(transparent)]
    Math(#[from] MathError),
}

/// A selection result, including what was aimed at and what was matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedQuestion {
    pub question_id: String,
    pub target_difficulty: f64,
    pub matched_mu: f64,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionSelector {
    params: SelectionParams,
}

impl QuestionSelector {
    pub fn new(params: SelectionParams) -> Self {
        Self { params }
    }

    /// Samples a target difficulty from the level's distribution and
    /// returns the closest indexed question.
    pub fn select_next_question<R: Rng>(
        &self,
        level: &DifficultyParams,
        index: &QuestionDifficultyIndex,
        rng: &mut R,
    ) -> Result<SelectedQuestion, SelectError> {
        if index.is_empty() {
            return Err(SelectError::NoQuestionAvailable);
        }
        let target = math::sample_skew_normal(level.mean, level.sd, level.alpha, rng)?;
        self.match_target(index, target)
    }

    /// Draws a target win probability, converts it to the question mean
    /// that would produce it against `student`, and looks that up.
    pub fn select_for_student<R: Rng>(
        &self,
        student: &SkillRating,
        rating: &RatingParams,
        index: &QuestionDifficultyIndex,
        rng: &mut R,
    ) -> Result<SelectedQuestion, SelectError> {
        if index.is_empty() {
            return Err(SelectError::NoQuestionAvailable);
        }
        let target_win = self.target_win_probability(rng);
        let target = math::question_mean_for_win_probability(
            student.mu,
            student.sigma,
            target_win,
            self.params.question_sigma,
            rating.beta,
        )?;
        self.match_target(index, target)
    }

    /// Mostly aims for even odds; one draw in ten goes harder and one in
    /// ten easier.
    pub fn target_win_probability<R: Rng>(&self, rng: &mut R) -> f64 {
        if rng.random::<f64>() < MAIN_SHARE {
            rng.random_range(BAND_MAIN.0..BAND_MAIN.1)
        } else if rng.random::<f64>() < 0.5 {
            rng.random_range(BAND_HARD.0..BAND_HARD.1)
        } else {
            rng.random_range(BAND_EASY.0..BAND_EASY.1)
        }
    }

    fn match_target(
        &self,
        index: &QuestionDifficultyIndex,
        target: f64,
    ) -> Result<SelectedQuestion, SelectError> {
        index
            .first_at_or_above(target)
            .or_else(|| index.last_at_or_below(target))
            .map(|entry| SelectedQuestion {
                question_id: entry.question_id.clone(),
                target_difficulty: target,
                matched_mu: entry.mu,
            })
            .ok_or(SelectError::NoQuestionAvailable)
    }

    /// Tops up a session's question bank by `replenish_ratio` of its
    /// current size. Candidates come from four pools in order: questions
    /// at or above a freshly sampled difficulty target, the session's
    /// incorrectly answered questions, its correctly answered ones, and
    /// finally random fill. Banked questions are never repeated and every
    /// candidate must pass `topic_allowed`.
    pub fn replenish_question_bank<R, F>(
        &self,
        bank: &[String],
        incorrect: &[String],
        correct: &[String],
        level: &DifficultyParams,
        index: &QuestionDifficultyIndex,
        topic_allowed: F,
        rng: &mut R,
    ) -> Result<Vec<String>, SelectError>
    where
        R: Rng,
        F: Fn(&str) -> bool,
    {
        let need = (bank.len() as f64 * self.params.replenish_ratio).ceil() as usize;
        if need == 0 {
            return Ok(Vec::new());
        }

        let banked: HashSet<&str> = bank.iter().map(String::as_str).collect();
        let mut picked: Vec<String> = Vec::with_capacity(need);
        let eligible = |id: &str, picked: &[String]| {
            !banked.contains(id) && !picked.iter().any(|p| p == id) && topic_allowed(id)
        };

        let target = math::sample_skew_normal(level.mean, level.sd, level.alpha, rng)?;
        for entry in index.entries_at_or_above(target) {
            if picked.len() >= need {
                break;
            }
            if eligible(&entry.question_id, &picked) {
                picked.push(entry.question_id.clone());
            }
        }

        for pool in [incorrect, correct] {
            for id in pool {
                if picked.len() >= need {
                    break;
                }
                // Answered questions always carry a rating; skip anything
                // that fell out of the index since.
                if index.contains(id) && eligible(id, &picked) {
                    picked.push(id.clone());
                }
            }
        }

        if picked.len() < need {
            let mut pool: Vec<&str> = index
                .iter()
                .map(|e| e.question_id.as_str())
                .filter(|id| eligible(id, &picked))
                .collect();
            pool.shuffle(rng);
            let missing = need - picked.len();
            picked.extend(pool.into_iter().take(missing).map(String::from));
        }

        picked.shuffle(rng);
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn index(values: &[(&str, f64)]) -> QuestionDifficultyIndex {
        let mut idx = QuestionDifficultyIndex::new();
        for (id, mu) in values {
            idx.insert(*id, *mu).unwrap();
        }
        idx
    }

    fn selector() -> QuestionSelector {
        QuestionSelector::new(SelectionParams::default())
    }

    #[test]
    fn test_match_prefers_closest_above() {
        let idx = index(&[("a", 700.0), ("b", 800.0), ("c", 900.0), ("d", 1000.0)]);
        let matched = selector().match_target(&idx, 850.0).unwrap();
        assert_eq!(matched.question_id, "c");
        assert_eq!(matched.matched_mu, 900.0);
    }

    #[test]
    fn test_match_clamps_to_hardest_when_target_overshoots() {
        let idx = index(&[("a", 700.0), ("b", 800.0), ("c", 900.0), ("d", 1000.0)]);
        let matched = selector().match_target(&idx, 1200.0).unwrap();
        assert_eq!(matched.question_id, "d");
    }

    #[test]
    fn test_empty_index_fails() {
        let idx = QuestionDifficultyIndex::new();
        let mut rng = StdRng::seed_from_u64(3);
        let err = selector()
            .select_next_question(&DifficultyParams::default(), &idx, &mut rng)
            .unwrap_err();
        assert!(matches!(err, SelectError::NoQuestionAvailable));
    }

    #[test]
    fn test_selection_deterministic_under_seed() {
        let idx = index(&[("a", 600.0), ("b", 750.0), ("c", 900.0), ("d", 1050.0)]);
        let level = DifficultyParams::default();
        let first = selector()
            .select_next_question(&level, &idx, &mut StdRng::seed_from_u64(11))
            .unwrap();
        let second = selector()
            .select_next_question(&level, &idx, &mut StdRng::seed_from_u64(11))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_target_win_probability_stays_in_bands() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..2000 {
            let p = selector().target_win_probability(&mut rng);
            assert!((0.20..0.70).contains(&p), "p = {p}");
        }
    }

    #[test]
    fn test_select_for_student_matches_formula_target() {
        let idx = index(&[("a", 400.0), ("b", 700.0), ("c", 1000.0), ("d", 1300.0)]);
        let student = SkillRating::new(700.0, 200.0);
        let mut rng = StdRng::seed_from_u64(9);
        let selected = selector()
            .select_for_student(&student, &RatingParams::default(), &idx, &mut rng)
            .unwrap();
        assert!(idx.contains(&selected.question_id));
        assert!(selected.matched_mu >= selected.target_difficulty || selected.question_id == "d");
    }

    #[test]
    fn test_replenish_excludes_bank_and_honours_topics() {
        let idx = index(&[
            ("a", 600.0),
            ("b", 700.0),
            ("c", 800.0),
            ("d", 900.0),
            ("e", 1000.0),
            ("f", 1100.0),
        ]);
        let bank = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let mut rng = StdRng::seed_from_u64(21);
        let picked = selector()
            .replenish_question_bank(
                &bank,
                &[],
                &[],
                &DifficultyParams::default(),
                &idx,
                |id| id != "f",
                &mut rng,
            )
            .unwrap();
        assert!(!picked.is_empty());
        assert!(picked.iter().all(|id| !bank.contains(id)));
        assert!(picked.iter().all(|id| id != "f"));
    }

    #[test]
    fn test_replenish_reuses_missed_questions_when_pool_is_thin() {
        let idx = index(&[("a", 700.0), ("b", 800.0), ("miss", 900.0)]);
        let bank = vec!["a".to_string(), "b".to_string()];
        let incorrect = vec!["miss".to_string()];
        let mut rng = StdRng::seed_from_u64(2);
        let picked = selector()
            .replenish_question_bank(
                &bank,
                &incorrect,
                &[],
                &DifficultyParams::default(),
                &idx,
                |_| true,
                &mut rng,
            )
            .unwrap();
        assert_eq!(picked, vec!["miss".to_string()]);
    }

    #[test]
    fn test_replenish_empty_bank_is_noop() {
        let idx = index(&[("a", 700.0)]);
        let mut rng = StdRng::seed_from_u64(2);
        let picked = selector()
            .replenish_question_bank(
                &[],
                &[],
                &[],
                &DifficultyParams::default(),
                &idx,
                |_| true,
                &mut rng,
            )
            .unwrap();
        assert!(picked.is_empty());
    }
}
