//! Numeric primitives shared by the rating engine: error function, normal
//! CDF and its inverse, win probability, and skew-normal sampling.
//!
//! Every fallible function rejects non-finite inputs and intermediate
//! results instead of letting NaN/Infinity flow into stored ratings.

use rand::Rng;

const SQRT_2: f64 = std::f64::consts::SQRT_2;
const FRAC_2_SQRT_PI: f64 = std::f64::consts::FRAC_2_SQRT_PI;

/// Probabilities returned by [`win_probability`] are kept strictly inside
/// (0, 1) even when the underlying CDF saturates in f64.
const PROB_FLOOR: f64 = 1e-12;

#[derive(Debug, thiserror::Error)]
pub enum MathError {
    #[error("probability {0} outside the open interval (0, 1)")]
    Domain(f64),
    #[error("non-finite {0}")]
    NonFinite(&'static str),
    #[error("{0} must be positive, got {1}")]
    NonPositive(&'static str, f64),
}

fn ensure_finite(value: f64, what: &'static str) -> Result<f64, MathError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MathError::NonFinite(what))
    }
}

/// Error function, Abramowitz & Stegun formula 7.1.26 (max error ~1.5e-7).
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Inverse error function. Winitzki's approximation seeds a few Newton
/// iterations against [`erf`], which makes the pair compose cleanly:
/// `erf(erf_inv(y))` recovers `y` well below the 1e-6 tolerance the
/// round-trip callers rely on.
pub fn erf_inv(y: f64) -> f64 {
    const A: f64 = 0.147;

    let sign = if y < 0.0 { -1.0 } else { 1.0 };
    let ln_term = (1.0 - y * y).ln();
    let first = 2.0 / (std::f64::consts::PI * A) + ln_term / 2.0;
    let mut x = sign * ((first * first - ln_term / A).sqrt() - first).sqrt();

    for _ in 0..3 {
        let err = erf(x) - y;
        let derivative = FRAC_2_SQRT_PI * (-x * x).exp();
        if derivative == 0.0 {
            break;
        }
        x -= err / derivative;
    }

    x
}

/// Standard normal cumulative distribution.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Standard normal quantile function for `p` in (0, 1) exclusive.
pub fn normal_inv_cdf(p: f64) -> Result<f64, MathError> {
    if !(p > 0.0 && p < 1.0) {
        return Err(MathError::Domain(p));
    }
    ensure_finite(SQRT_2 * erf_inv(2.0 * p - 1.0), "normal quantile")
}

pub(crate) fn rating_denominator(
    student_sigma: f64,
    question_sigma: f64,
    beta: f64,
) -> Result<f64, MathError> {
    let denom =
        (2.0 * beta * beta + student_sigma * student_sigma + question_sigma * question_sigma)
            .sqrt();
    if !denom.is_finite() || denom <= f64::EPSILON {
        return Err(MathError::NonFinite("rating denominator"));
    }
    Ok(denom)
}

/// Probability that a student with rating `(student_mu, student_sigma)`
/// answers a question rated `(question_mu, question_sigma)` correctly.
///
/// `beta` controls how sharply a mean gap translates into probability.
pub fn win_probability(
    student_mu: f64,
    student_sigma: f64,
    question_mu: f64,
    question_sigma: f64,
    beta: f64,
) -> Result<f64, MathError> {
    ensure_finite(student_mu, "student mean")?;
    ensure_finite(student_sigma, "student deviation")?;
    ensure_finite(question_mu, "question mean")?;
    ensure_finite(question_sigma, "question deviation")?;
    ensure_finite(beta, "beta")?;

    let denom = rating_denominator(student_sigma, question_sigma, beta)?;
    let p = normal_cdf((student_mu - question_mu) / denom);
    Ok(p.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR))
}

/// Inverse of [`win_probability`] in the question mean: the difficulty mean
/// that would give `target_win_prob` against the supplied student rating.
pub fn question_mean_for_win_probability(
    student_mu: f64,
    student_sigma: f64,
    target_win_prob: f64,
    question_sigma: f64,
    beta: f64,
) -> Result<f64, MathError> {
    ensure_finite(student_mu, "student mean")?;
    ensure_finite(student_sigma, "student deviation")?;
    ensure_finite(question_sigma, "question deviation")?;
    ensure_finite(beta, "beta")?;

    let z = normal_inv_cdf(target_win_prob)?;
    let denom = rating_denominator(student_sigma, question_sigma, beta)?;
    ensure_finite(student_mu - z * denom, "target question mean")
}

/// One standard-normal pair via Box-Muller.
fn standard_normal_pair<R: Rng>(rng: &mut R) -> (f64, f64) {
    let u1: f64 = rng.random::<f64>().max(1e-10);
    let u2: f64 = rng.random();
    let radius = (-2.0 * u1.ln()).sqrt();
    let angle = 2.0 * std::f64::consts::PI * u2;
    (radius * angle.cos(), radius * angle.sin())
}

/// Draws one sample from a skew-normal distribution with location `mean`,
/// scale `sd` and shape `alpha`, using the Azzalini two-normal transform.
pub fn sample_skew_normal<R: Rng>(
    mean: f64,
    sd: f64,
    alpha: f64,
    rng: &mut R,
) -> Result<f64, MathError> {
    ensure_finite(mean, "skew-normal location")?;
    ensure_finite(alpha, "skew-normal shape")?;
    if !sd.is_finite() || sd <= 0.0 {
        return Err(MathError::NonPositive("skew-normal scale", sd));
    }

    let delta = alpha / (1.0 + alpha * alpha).sqrt();
    let (u0, u1) = standard_normal_pair(rng);
    let z = delta * u0.abs() + (1.0 - delta * delta).sqrt() * u1;
    ensure_finite(mean + sd * z, "skew-normal sample")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_normal_cdf_known_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-9);
        assert!((normal_cdf(1.6449) - 0.95).abs() < 1e-4);
        assert!((normal_cdf(-1.6449) - 0.05).abs() < 1e-4);
    }

    #[test]
    fn test_quantile_round_trip() {
        for &p in &[0.001, 0.05, 0.35, 0.5, 0.55, 0.95, 0.999] {
            let z = normal_inv_cdf(p).unwrap();
            assert!((normal_cdf(z) - p).abs() < 1e-9, "p = {p}");
        }
    }

    #[test]
    fn test_quantile_rejects_out_of_range() {
        assert!(normal_inv_cdf(0.0).is_err());
        assert!(normal_inv_cdf(1.0).is_err());
        assert!(normal_inv_cdf(-0.2).is_err());
        assert!(normal_inv_cdf(f64::NAN).is_err());
    }

    #[test]
    fn test_win_probability_underdog() {
        let p = win_probability(700.0, 200.0, 936.0, 200.0, 200.0).unwrap();
        assert!(p > 0.0 && p < 0.5, "underdog should be below even odds: {p}");
        let expected = normal_cdf((700.0 - 936.0) / 400.0);
        assert!((p - expected).abs() < 1e-12);
    }

    #[test]
    fn test_win_probability_strict_bounds() {
        let high = win_probability(1e6, 1.0, -1e6, 1.0, 200.0).unwrap();
        let low = win_probability(-1e6, 1.0, 1e6, 1.0, 200.0).unwrap();
        assert!(high < 1.0 && high > 0.5);
        assert!(low > 0.0 && low < 0.5);
    }

    #[test]
    fn test_win_probability_rejects_non_finite() {
        assert!(win_probability(f64::NAN, 200.0, 936.0, 200.0, 200.0).is_err());
        assert!(win_probability(700.0, f64::INFINITY, 936.0, 200.0, 200.0).is_err());
    }

    #[test]
    fn test_question_mean_round_trip() {
        for &target in &[0.25, 0.35, 0.45, 0.55, 0.65] {
            let mu = question_mean_for_win_probability(700.0, 200.0, target, 300.0, 200.0).unwrap();
            let recovered = win_probability(700.0, 200.0, mu, 300.0, 200.0).unwrap();
            assert!((recovered - target).abs() < 1e-6, "target = {target}");
        }
    }

    #[test]
    fn test_question_mean_rejects_degenerate_target() {
        assert!(question_mean_for_win_probability(700.0, 200.0, 0.0, 300.0, 200.0).is_err());
        assert!(question_mean_for_win_probability(700.0, 200.0, 1.0, 300.0, 200.0).is_err());
    }

    #[test]
    fn test_skew_normal_deterministic_under_seed() {
        let a = sample_skew_normal(750.0, 150.0, 5.0, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = sample_skew_normal(750.0, 150.0, 5.0, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_skew_normal_positive_alpha_skews_high() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 4000;
        let above = (0..n)
            .filter(|_| sample_skew_normal(750.0, 150.0, 5.0, &mut rng).unwrap() > 750.0)
            .count();
        // With alpha = 5 nearly all mass sits above the location parameter.
        assert!(above as f64 / n as f64 > 0.7, "above = {above}/{n}");
    }

    #[test]
    fn test_skew_normal_rejects_bad_scale() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_skew_normal(750.0, 0.0, 5.0, &mut rng).is_err());
        assert!(sample_skew_normal(750.0, -1.0, 5.0, &mut rng).is_err());
        assert!(sample_skew_normal(f64::NAN, 150.0, 5.0, &mut rng).is_err());
    }
}
