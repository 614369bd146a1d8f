// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Bounded Least Squares
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Box-constrained Levenberg–Marquardt with a finite-difference Jacobian.
//!
//! Each iteration freezes the parameters held by an active bound, solves the
//! damped normal equations for the rest, clamps the step, projects the trial
//! point onto the box and retries with heavier damping when the cost does
//! not drop.

use crate::linalg::damped_normal_step;
use mfa_types::config::{validate_solver_config, SolverConfig};
use mfa_types::error::{MfaError, MfaResult};
use ndarray::Array2;
use tracing::debug;

const MAX_DAMPING_TRIES: usize = 8;
const LAMBDA_DECREASE: f64 = 0.3;
const LAMBDA_INCREASE: f64 = 10.0;
const MIN_LAMBDA: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct LstsqResult {
    pub params: Vec<f64>,
    /// `½·Σ r²` at `params`.
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
    pub residual_history: Vec<f64>,
}

fn cost_of(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

fn project(x: &mut [f64], lower: &[f64], upper: &[f64]) {
    for ((xi, &lo), &hi) in x.iter_mut().zip(lower).zip(upper) {
        *xi = xi.clamp(lo, hi);
    }
}

fn validate_bounds(n: usize, lower: &[f64], upper: &[f64]) -> MfaResult<()> {
    if lower.len() != n || upper.len() != n {
        return Err(MfaError::ConfigError(format!(
            "bounds have {} / {} entries for {n} parameters",
            lower.len(),
            upper.len()
        )));
    }
    for (i, (&lo, &hi)) in lower.iter().zip(upper).enumerate() {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(MfaError::ConfigError(format!(
                "parameter {i}: lower bound {lo} exceeds upper bound {hi}"
            )));
        }
    }
    Ok(())
}

/// Forward differences, stepping backwards where the forward point leaves the box.
fn fd_jacobian<F>(
    f: &F,
    x: &[f64],
    r0: &[f64],
    lower: &[f64],
    upper: &[f64],
    rel_step: f64,
) -> MfaResult<Array2<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = r0.len();
    let n = x.len();
    let mut jac = Array2::zeros((m, n));
    for k in 0..n {
        if lower[k] == upper[k] {
            continue;
        }
        let mut h = rel_step * x[k].abs().max(1.0);
        if x[k] + h > upper[k] {
            h = -h;
        }
        let mut xp = x.to_vec();
        xp[k] += h;
        let rp = f(&xp);
        if rp.len() != m {
            return Err(MfaError::LinAlg(format!(
                "residual length changed from {m} to {}",
                rp.len()
            )));
        }
        for i in 0..m {
            jac[[i, k]] = (rp[i] - r0[i]) / h;
        }
    }
    Ok(jac)
}

/// Minimise `½·‖f(x)‖²` subject to `lower ≤ x ≤ upper`.
///
/// Stopping without meeting the gradient or cost-reduction tolerance, either
/// at `max_iterations` or because no damped step lowers the cost, is reported
/// through `converged = false`. Only a non-finite residual at the starting
/// point is an error.
pub fn least_squares<F>(
    f: F,
    x0: &[f64],
    lower: &[f64],
    upper: &[f64],
    config: &SolverConfig,
) -> MfaResult<LstsqResult>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    validate_solver_config(config)?;
    let n = x0.len();
    if n == 0 {
        return Err(MfaError::ConfigError(
            "least squares needs at least one parameter".to_string(),
        ));
    }
    validate_bounds(n, lower, upper)?;

    let mut x = x0.to_vec();
    project(&mut x, lower, upper);
    let mut r = f(&x);
    if r.is_empty() {
        return Err(MfaError::LinAlg("empty residual vector".to_string()));
    }
    let mut cost = cost_of(&r);
    if !cost.is_finite() {
        return Err(MfaError::LinAlg(format!(
            "non-finite residual at initial parameters {x:?}"
        )));
    }

    let m = r.len();
    let mut lambda = config.initial_lambda;
    let mut residual_history = Vec::with_capacity(config.max_iterations + 1);
    residual_history.push(cost);
    let mut converged = cost == 0.0;
    let mut iterations = 0;

    while !converged && iterations < config.max_iterations {
        iterations += 1;
        let jac = fd_jacobian(&f, &x, &r, lower, upper, config.fd_step)?;

        // Parameters pushed against an active bound are frozen for this step.
        let mut free = Vec::with_capacity(n);
        let mut grad_norm = 0.0_f64;
        for k in 0..n {
            if lower[k] == upper[k] {
                continue;
            }
            let g: f64 = (0..m).map(|i| jac[[i, k]] * r[i]).sum();
            let blocked = (x[k] <= lower[k] && g > 0.0) || (x[k] >= upper[k] && g < 0.0);
            if !blocked {
                free.push(k);
                grad_norm = grad_norm.max(g.abs());
            }
        }
        if free.is_empty() || grad_norm <= config.tolerance * (1.0 + cost) {
            converged = true;
            break;
        }

        let mut accepted = false;
        for _ in 0..MAX_DAMPING_TRIES {
            let delta = match damped_normal_step(&jac, &r, lambda, &free) {
                Ok(delta) => delta,
                Err(_) => {
                    lambda *= LAMBDA_INCREASE;
                    continue;
                }
            };
            let mut x_trial = x.clone();
            for k in 0..n {
                let limit = config.max_relative_step * x[k].abs().max(1.0);
                x_trial[k] += delta[k].clamp(-limit, limit);
            }
            project(&mut x_trial, lower, upper);

            let r_trial = f(&x_trial);
            let cost_trial = cost_of(&r_trial);
            if cost_trial.is_finite() && cost_trial < cost {
                let reduction = cost - cost_trial;
                x = x_trial;
                r = r_trial;
                cost = cost_trial;
                lambda = (lambda * LAMBDA_DECREASE).max(MIN_LAMBDA);
                accepted = true;
                if reduction <= config.tolerance * cost.max(f64::MIN_POSITIVE) || cost == 0.0 {
                    converged = true;
                }
                break;
            }
            lambda *= LAMBDA_INCREASE;
        }
        residual_history.push(cost);

        if !accepted {
            // Stalled at finite-difference resolution: a minimum only if the
            // gradient is small at that resolution.
            converged = grad_norm <= config.tolerance.sqrt() * (1.0 + cost);
            break;
        }
    }

    debug!(iterations, cost, converged, params = ?x, "least squares finished");

    Ok(LstsqResult {
        params: x,
        cost,
        iterations,
        converged,
        residual_history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_data() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (1..=12).map(|v| v as f64).collect();
        let y = x.iter().map(|v| 8.0 * (1.0 - (-0.3 * v).exp())).collect();
        (x, y)
    }

    #[test]
    fn test_recovers_exponential_saturation() {
        let (x, y) = exp_data();
        let f = |p: &[f64]| -> Vec<f64> {
            x.iter()
                .zip(&y)
                .map(|(xi, yi)| p[0] * (1.0 - (-p[1] * xi).exp()) - yi)
                .collect()
        };
        let res = least_squares(
            f,
            &[5.0, 0.1],
            &[f64::NEG_INFINITY; 2],
            &[f64::INFINITY; 2],
            &SolverConfig::default(),
        )
        .unwrap();
        assert!(res.converged);
        assert!((res.params[0] - 8.0).abs() < 1e-5, "A = {}", res.params[0]);
        assert!((res.params[1] - 0.3).abs() < 1e-6, "B = {}", res.params[1]);
        assert!(res.cost < 1e-10);
    }

    #[test]
    fn test_bounds_are_respected() {
        let (x, y) = exp_data();
        let f = |p: &[f64]| -> Vec<f64> {
            x.iter()
                .zip(&y)
                .map(|(xi, yi)| p[0] * (1.0 - (-p[1] * xi).exp()) - yi)
                .collect()
        };
        let res = least_squares(
            f,
            &[5.0, 0.1],
            &[0.0, 0.0],
            &[6.0, 10.0],
            &SolverConfig::default(),
        )
        .unwrap();
        assert!(res.converged);
        assert!(res.params[0] <= 6.0 + 1e-12);
        assert!((res.params[0] - 6.0).abs() < 1e-6, "A should sit on its bound");
    }

    #[test]
    fn test_fixed_parameter_stays_fixed() {
        let f = |p: &[f64]| vec![p[0] - 3.0, p[1] - 4.0];
        let res = least_squares(
            f,
            &[0.0, 1.5],
            &[f64::NEG_INFINITY, 1.5],
            &[f64::INFINITY, 1.5],
            &SolverConfig::default(),
        )
        .unwrap();
        assert!((res.params[0] - 3.0).abs() < 1e-8);
        assert_eq!(res.params[1], 1.5);
    }

    #[test]
    fn test_cost_history_non_increasing() {
        let f = |p: &[f64]| vec![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]];
        let res = least_squares(
            f,
            &[-1.2, 1.0],
            &[f64::NEG_INFINITY; 2],
            &[f64::INFINITY; 2],
            &SolverConfig::default(),
        )
        .unwrap();
        for w in res.residual_history.windows(2) {
            assert!(w[1] <= w[0], "cost increased: {:?}", w);
        }
        assert!(res.converged);
        assert!((res.params[0] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_iteration_limit_is_not_convergence() {
        let x: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 10.0 * (1.0 - (-0.1 * v).exp())).collect();
        let f = |p: &[f64]| -> Vec<f64> {
            x.iter()
                .zip(&y)
                .map(|(xi, yi)| p[0] * (1.0 - (-p[1] * xi).exp()) - yi)
                .collect()
        };
        let config = SolverConfig {
            max_iterations: 1,
            ..SolverConfig::default()
        };
        let res = least_squares(
            f,
            &[2.0 * y[19], 2.0_f64.ln() / 20.0],
            &[f64::NEG_INFINITY; 2],
            &[f64::INFINITY; 2],
            &config,
        )
        .unwrap();
        assert_eq!(res.iterations, 1);
        assert!(!res.converged);
        assert!((res.params[0] - 10.0).abs() > 1.0);
    }

    #[test]
    fn test_unreachable_optimum_is_not_convergence() {
        // A straight line has no finite saturation level.
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let f = |p: &[f64]| -> Vec<f64> {
            x.iter()
                .map(|xi| p[0] * (1.0 - (-p[1] * xi).exp()) - xi)
                .collect()
        };
        let start = [10.0, 2.0_f64.ln() / 5.0];
        let free = least_squares(
            f,
            &start,
            &[f64::NEG_INFINITY; 2],
            &[f64::INFINITY; 2],
            &SolverConfig::default(),
        )
        .unwrap();
        assert!(!free.converged, "A ran to {}", free.params[0]);

        let capped = least_squares(
            f,
            &start,
            &[0.0, 0.0],
            &[20.0, f64::INFINITY],
            &SolverConfig::default(),
        )
        .unwrap();
        assert!(capped.converged);
        assert!((capped.params[0] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let f = |p: &[f64]| vec![p[0]];
        let err = least_squares(f, &[0.0], &[1.0], &[0.0], &SolverConfig::default()).unwrap_err();
        match err {
            MfaError::ConfigError(msg) => assert!(msg.contains("exceeds")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_start_is_error() {
        let f = |_p: &[f64]| vec![f64::NAN];
        assert!(matches!(
            least_squares(f, &[1.0], &[0.0], &[2.0], &SolverConfig::default()),
            Err(MfaError::LinAlg(_))
        ));
    }
}
