// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Lifetime Distributions
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Product lifetime distributions and cohort survival tables.
//!
//! Every distribution is parameterised by mean and standard deviation;
//! log-normal and Weibull parameters are moment-matched. Ages are counted
//! in time steps since the cohort entered (age 0 in its own year).

use mfa_math::NamedDimArray;
use mfa_types::config::LifetimeKind;
use mfa_types::dims::DimensionSet;
use mfa_types::error::{MfaError, MfaResult};
use ndarray::{Array2, ArrayD};
use statrs::distribution::{ContinuousCDF, LogNormal, Normal, Weibull};
use statrs::function::gamma::gamma;

const WEIBULL_SHAPE_RANGE: (f64, f64) = (0.05, 200.0);
const WEIBULL_BISECTION_STEPS: usize = 100;

fn stats_err(kind: LifetimeKind, e: impl std::fmt::Display) -> MfaError {
    MfaError::ConfigError(format!("{kind:?} lifetime: {e}"))
}

/// Squared coefficient of variation of a Weibull with shape `k`.
fn weibull_cv2(k: f64) -> f64 {
    let g1 = gamma(1.0 + 1.0 / k);
    gamma(1.0 + 2.0 / k) / (g1 * g1) - 1.0
}

/// Shape `k` whose coefficient of variation is `cv` (bisection in log k).
pub fn weibull_shape(cv: f64) -> f64 {
    let target = cv * cv;
    let (mut lo, mut hi) = (WEIBULL_SHAPE_RANGE.0.ln(), WEIBULL_SHAPE_RANGE.1.ln());
    if target >= weibull_cv2(lo.exp()) {
        return lo.exp();
    }
    if target <= weibull_cv2(hi.exp()) {
        return hi.exp();
    }
    // cv² falls monotonically with k.
    for _ in 0..WEIBULL_BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if weibull_cv2(mid.exp()) > target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (0.5 * (lo + hi)).exp()
}

/// Survival probability at `age` for one cohort.
///
/// A zero mean gives 0 everywhere; a zero standard deviation degenerates
/// every kind to the fixed lifetime `age < mean`.
pub fn survival(kind: LifetimeKind, age: f64, mean: f64, std: f64) -> MfaResult<f64> {
    if !mean.is_finite() || !std.is_finite() || mean < 0.0 || std < 0.0 {
        return Err(MfaError::ConfigError(format!(
            "{kind:?} lifetime needs finite non-negative mean and std, got ({mean}, {std})"
        )));
    }
    if mean == 0.0 {
        return Ok(0.0);
    }
    let step = if age < mean { 1.0 } else { 0.0 };
    if std == 0.0 {
        return Ok(step);
    }
    let sf = match kind {
        LifetimeKind::Fixed => step,
        LifetimeKind::Normal => Normal::new(mean, std)
            .map_err(|e| stats_err(kind, e))?
            .sf(age),
        LifetimeKind::FoldedNormal => {
            let n = Normal::new(mean, std).map_err(|e| stats_err(kind, e))?;
            if age < 0.0 {
                1.0
            } else {
                n.sf(age) + n.cdf(-age)
            }
        }
        LifetimeKind::LogNormal => {
            let sigma2 = (1.0 + (std / mean).powi(2)).ln();
            let mu = mean.ln() - 0.5 * sigma2;
            LogNormal::new(mu, sigma2.sqrt())
                .map_err(|e| stats_err(kind, e))?
                .sf(age)
        }
        LifetimeKind::Weibull => {
            let shape = weibull_shape(std / mean);
            let scale = mean / gamma(1.0 + 1.0 / shape);
            if age < 0.0 {
                1.0
            } else {
                Weibull::new(shape, scale)
                    .map_err(|e| stats_err(kind, e))?
                    .sf(age)
            }
        }
    };
    Ok(sf.clamp(0.0, 1.0))
}

/// `sf[[t, c]]` for cohorts `c` with per-cohort parameters; zero above the diagonal.
pub fn survival_table(kind: LifetimeKind, mean: &[f64], std: &[f64]) -> MfaResult<Array2<f64>> {
    let n = mean.len();
    if std.len() != n {
        return Err(MfaError::ConfigError(format!(
            "lifetime mean has {n} cohorts, std has {}",
            std.len()
        )));
    }
    let mut sf = Array2::zeros((n, n));
    for c in 0..n {
        for t in c..n {
            sf[[t, c]] = survival(kind, (t - c) as f64, mean[c], std[c])?;
        }
    }
    Ok(sf)
}

/// `pdf[[c, c]] = 1 − sf[[c, c]]`, `pdf[[t, c]] = sf[[t−1, c]] − sf[[t, c]]`.
pub fn pdf_table(sf: &Array2<f64>) -> Array2<f64> {
    let n = sf.nrows();
    let mut pdf = Array2::zeros((n, n));
    for c in 0..n {
        pdf[[c, c]] = 1.0 - sf[[c, c]];
        for t in c + 1..n {
            pdf[[t, c]] = sf[[t - 1, c]] - sf[[t, c]];
        }
    }
    pdf
}

/// A lifetime distribution with mean and standard deviation arrays.
///
/// Both arrays may use any subset of the letters of the stock they are
/// attached to, including the time letter for cohort-dependent lifetimes.
#[derive(Debug, Clone)]
pub struct LifetimeModel {
    pub kind: LifetimeKind,
    mean: NamedDimArray,
    std: NamedDimArray,
}

impl LifetimeModel {
    pub fn new(kind: LifetimeKind, mean: NamedDimArray, std: NamedDimArray) -> MfaResult<Self> {
        for (label, arr) in [("mean", &mean), ("std", &std)] {
            if arr.values().iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(MfaError::ConfigError(format!(
                    "lifetime {label} must be finite and non-negative"
                )));
            }
        }
        Ok(Self { kind, mean, std })
    }

    /// Standard deviation as a fixed fraction of the mean.
    pub fn with_relative_std(
        kind: LifetimeKind,
        mean: NamedDimArray,
        relative_std: f64,
    ) -> MfaResult<Self> {
        let std = mean.scale(relative_std);
        Self::new(kind, mean, std)
    }

    pub fn mean(&self) -> &NamedDimArray {
        &self.mean
    }

    pub fn std(&self) -> &NamedDimArray {
        &self.std
    }

    /// Mean and std broadcast to `dims`.
    pub fn aligned(&self, dims: &DimensionSet) -> MfaResult<(ArrayD<f64>, ArrayD<f64>)> {
        Ok((self.mean.align_to(dims)?, self.std.align_to(dims)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [LifetimeKind; 5] = [
        LifetimeKind::Fixed,
        LifetimeKind::Normal,
        LifetimeKind::FoldedNormal,
        LifetimeKind::LogNormal,
        LifetimeKind::Weibull,
    ];

    #[test]
    fn test_survival_non_increasing() {
        for kind in ALL_KINDS {
            let sf = survival_table(kind, &[12.0; 40], &[4.0; 40]).unwrap();
            for c in 0..40 {
                for t in c + 1..40 {
                    assert!(
                        sf[[t, c]] <= sf[[t - 1, c]] + 1e-15,
                        "{kind:?}: sf rises at ({t}, {c})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_fixed_lifetime_is_step() {
        let sf = survival_table(LifetimeKind::Fixed, &[3.0; 6], &[0.0; 6]).unwrap();
        assert_eq!(sf[[2, 0]], 1.0);
        assert_eq!(sf[[3, 0]], 0.0);
    }

    #[test]
    fn test_zero_mean_never_survives() {
        for kind in ALL_KINDS {
            assert_eq!(survival(kind, 0.0, 0.0, 1.0).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_normal_not_truncated_at_age_zero() {
        let s = survival(LifetimeKind::Normal, 0.0, 1.0, 1.0).unwrap();
        assert!(s < 1.0 && s > 0.8, "sf(0) = {s}");
        let f = survival(LifetimeKind::FoldedNormal, 0.0, 1.0, 1.0).unwrap();
        assert!((f - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weibull_moment_matching() {
        let k = weibull_shape(1.0);
        assert!((k - 1.0).abs() < 1e-6, "cv = 1 is exponential, got k = {k}");
        let cv = weibull_cv2(weibull_shape(0.3)).sqrt();
        assert!((cv - 0.3).abs() < 1e-8);
    }

    #[test]
    fn test_lognormal_median_below_mean() {
        let s = survival(LifetimeKind::LogNormal, 20.0, 20.0, 10.0).unwrap();
        assert!(s < 0.5);
    }

    #[test]
    fn test_pdf_sums_to_one_when_fully_decayed() {
        let sf = survival_table(LifetimeKind::Normal, &[5.0; 60], &[1.0; 60]).unwrap();
        let pdf = pdf_table(&sf);
        let total: f64 = pdf.column(0).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_negative_parameters() {
        match survival(LifetimeKind::Normal, 1.0, -2.0, 1.0) {
            Err(MfaError::ConfigError(msg)) => assert!(msg.contains("non-negative")),
            other => panic!("Unexpected result: {other:?}"),
        }
    }
}
