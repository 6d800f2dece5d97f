//! Rating updates after a graded answer.
//!
//! A correct answer is scored as the student beating the question; an
//! incorrect answer as the question beating the student. Both beliefs move
//! toward the observed outcome, scaled by their own uncertainty, and both
//! deviations shrink toward the configured floor.

use crate::config::RatingParams;
use crate::rating::math::{self, MathError};
use crate::rating::skill::SkillRating;

/// When the winner's CDF underflows, `v` falls back to its asymptote.
const CDF_UNDERFLOW: f64 = 1e-10;

/// Both parties' refreshed beliefs plus the pre-update expectation.
#[derive(Debug, Clone, Copy)]
pub struct RatingUpdate {
    pub student: SkillRating,
    pub question: SkillRating,
    /// Probability the student was expected to answer correctly, computed
    /// from the ratings as they stood before this update.
    pub expected_win: f64,
}

fn normal_pdf(t: f64) -> f64 {
    (-0.5 * t * t).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Truncation moments of the win margin: the mean shift `v(t) =
/// pdf(t) / cdf(t)` and the variance multiplier `w(t) = v(t)(v(t) + t)`,
/// with their asymptotes once the CDF underflows.
fn truncation_moments(t: f64) -> (f64, f64) {
    let cdf = math::normal_cdf(t);
    if cdf < CDF_UNDERFLOW {
        (-t, 1.0)
    } else {
        let v = normal_pdf(t) / cdf;
        (v, (v * (v + t)).clamp(0.0, 1.0))
    }
}

/// Recomputes both ratings after one answer. Pure: callers persist the
/// returned pair. Deviations never increase here; they are clamped to
/// `params.deviation_floor` from below so update magnitude stays positive
/// even for long-settled entities.
pub fn update_ratings(
    student: SkillRating,
    question: SkillRating,
    student_was_correct: bool,
    params: &RatingParams,
) -> Result<RatingUpdate, MathError> {
    student.validate()?;
    question.validate()?;

    let floor = params.deviation_floor;
    let student_sigma = student.sigma.max(floor);
    let question_sigma = question.sigma.max(floor);

    let expected_win = math::win_probability(
        student.mu,
        student_sigma,
        question.mu,
        question_sigma,
        params.beta,
    )?;

    let (winner_mu, winner_sigma, loser_mu, loser_sigma) = if student_was_correct {
        (student.mu, student_sigma, question.mu, question_sigma)
    } else {
        (question.mu, question_sigma, student.mu, student_sigma)
    };

    let c = math::rating_denominator(winner_sigma, loser_sigma, params.beta)?;
    let t = (winner_mu - loser_mu) / c;
    let (v, w) = truncation_moments(t);

    let winner = SkillRating::new(
        winner_mu + winner_sigma * winner_sigma / c * v,
        shrink_sigma(winner_sigma, c, w, floor),
    );
    let loser = SkillRating::new(
        loser_mu - loser_sigma * loser_sigma / c * v,
        shrink_sigma(loser_sigma, c, w, floor),
    );
    winner.validate()?;
    loser.validate()?;

    let (new_student, new_question) = if student_was_correct {
        (winner, loser)
    } else {
        (loser, winner)
    };

    Ok(RatingUpdate {
        student: new_student,
        question: new_question,
        expected_win,
    })
}

fn shrink_sigma(sigma: f64, c: f64, w: f64, floor: f64) -> f64 {
    let variance = sigma * sigma * (1.0 - sigma * sigma / (c * c) * w);
    variance.max(0.0).sqrt().max(floor)
}
