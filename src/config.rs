use serde::{Deserialize, Serialize};

use crate::rating::SkillRating;

/// Parameters of the Bayesian rating scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingParams {
    /// Performance noise: controls how sharply a mean gap maps to win
    /// probability.
    pub beta: f64,
    /// Deviations are clamped here from below; updates shrink toward the
    /// floor but never reach zero uncertainty.
    pub deviation_floor: f64,
    /// Belief assigned to a student on first sight.
    pub student_prior: SkillRating,
    /// Belief assigned to a question on first sight.
    pub question_prior: SkillRating,
}

impl Default for RatingParams {
    fn default() -> Self {
        Self {
            beta: 200.0,
            deviation_floor: 25.0,
            student_prior: SkillRating::new(700.0, 200.0),
            question_prior: SkillRating::new(936.0, 200.0),
        }
    }
}

/// Parameters of question selection and bank replenishment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Assumed question deviation when targeting a win probability.
    pub question_sigma: f64,
    /// Fraction of the current bank size added during replenishment.
    pub replenish_ratio: f64,
    /// Replenishment kicks in once this fraction of the bank is consumed.
    pub replenish_threshold: f64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            question_sigma: 300.0,
            replenish_ratio: 0.5,
            replenish_threshold: 0.4,
        }
    }
}

/// Parameters of the per-topic accuracy aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceParams {
    /// Max samples retained per topic window; oldest evicted first.
    pub attempt_window_size: usize,
    /// Per-index weight base of the moving average. Samples are ordered
    /// oldest to newest, so values above 1 favour recent attempts.
    pub accuracy_weight: f64,
}

impl Default for PerformanceParams {
    fn default() -> Self {
        Self {
            attempt_window_size: 10,
            accuracy_weight: 1.2,
        }
    }
}

/// Skew-normal target distribution attached to a level at authoring time.
/// Read-only to the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DifficultyParams {
    pub mean: f64,
    pub sd: f64,
    pub alpha: f64,
}

impl Default for DifficultyParams {
    fn default() -> Self {
        Self {
            mean: 750.0,
            sd: 150.0,
            alpha: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub rating: RatingParams,
    pub selection: SelectionParams,
    pub performance: PerformanceParams,
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(beta) = env_f64("BETA") {
            config.rating.beta = beta;
        }
        if let Some(floor) = env_f64("DEVIATION_FLOOR") {
            config.rating.deviation_floor = floor;
        }
        if let Some(sigma) = env_f64("QUESTION_SIGMA") {
            config.selection.question_sigma = sigma;
        }
        if let Some(size) = env_usize("ATTEMPT_WINDOW_SIZE") {
            config.performance.attempt_window_size = size;
        }
        if let Some(weight) = env_f64("ACCURACY_WEIGHT") {
            config.performance.accuracy_weight = weight;
        }

        config
    }
}
