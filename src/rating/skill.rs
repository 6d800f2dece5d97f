use serde::{Deserialize, Serialize};

use crate::rating::math::MathError;

/// Belief about a student's ability or a question's hardness: mean and
/// standard deviation of a Gaussian over the latent value. One rating
/// belongs to exactly one student or one question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillRating {
    pub mu: f64,
    pub sigma: f64,
}

impl SkillRating {
    pub fn new(mu: f64, sigma: f64) -> Self {
        Self { mu, sigma }
    }

    /// Rejects ratings that would corrupt stored state: non-finite fields
    /// or a negative deviation.
    pub fn validate(&self) -> Result<(), MathError> {
        if !self.mu.is_finite() {
            return Err(MathError::NonFinite("rating mean"));
        }
        if !self.sigma.is_finite() {
            return Err(MathError::NonFinite("rating deviation"));
        }
        if self.sigma < 0.0 {
            return Err(MathError::NonPositive("rating deviation", self.sigma));
        }
        Ok(())
    }
}
