// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Linear Algebra
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Small dense linear algebra.
//!
//! Cholesky solves for the damped normal equations of the curve fits,
//! plus the closed-form line fits used for slope matching.

use mfa_types::constants::EPS;
use mfa_types::error::{MfaError, MfaResult};
use ndarray::{Array1, Array2};

/// Floor of a squared Jacobian column norm in the Marquardt scaling.
const MIN_COLUMN_SCALE: f64 = 1e-24;

/// Cholesky factor `L` with `A = L·Lᵀ` of a symmetric positive definite matrix.
pub fn cholesky(a: &Array2<f64>) -> MfaResult<Array2<f64>> {
    let (n, m) = a.dim();
    if n != m {
        return Err(MfaError::LinAlg(format!("cholesky of a {n}x{m} matrix")));
    }
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut s = a[[i, j]];
            for k in 0..j {
                s -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if s.is_nan() || s <= 0.0 {
                    return Err(MfaError::LinAlg(format!(
                        "matrix not positive definite at pivot {i} ({s:e})"
                    )));
                }
                l[[i, i]] = s.sqrt();
            } else {
                l[[i, j]] = s / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Solve `A·x = b` for symmetric positive definite `A`.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> MfaResult<Array1<f64>> {
    let l = cholesky(a)?;
    let n = l.nrows();
    if b.len() != n {
        return Err(MfaError::LinAlg(format!(
            "right-hand side has {} entries for a {n}x{n} system",
            b.len()
        )));
    }
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let s: f64 = (0..i).map(|k| l[[i, k]] * y[k]).sum();
        y[i] = (b[i] - s) / l[[i, i]];
    }
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let s: f64 = (i + 1..n).map(|k| l[[k, i]] * x[k]).sum();
        x[i] = (y[i] - s) / l[[i, i]];
    }
    Ok(x)
}

/// Marquardt step restricted to the `free` columns of the Jacobian.
///
/// Solves `(JᵀJ + λ·diag(JᵀJ))·δ = −Jᵀr` over the free parameters; all
/// other entries of the returned step are zero. A column with no
/// sensitivity keeps a tiny diagonal so the system stays definite.
pub fn damped_normal_step(
    jac: &Array2<f64>,
    residual: &[f64],
    lambda: f64,
    free: &[usize],
) -> MfaResult<Array1<f64>> {
    let (m, n) = jac.dim();
    if residual.len() != m {
        return Err(MfaError::LinAlg(format!(
            "{} residuals for a Jacobian with {m} rows",
            residual.len()
        )));
    }
    if let Some(&k) = free.iter().find(|&&k| k >= n) {
        return Err(MfaError::LinAlg(format!("free column {k} out of {n}")));
    }
    let nf = free.len();
    let mut normal = Array2::zeros((nf, nf));
    let mut rhs = Array1::zeros(nf);
    for (a, &ka) in free.iter().enumerate() {
        let col_a = jac.column(ka);
        rhs[a] = -(0..m).map(|i| col_a[i] * residual[i]).sum::<f64>();
        for (b, &kb) in free.iter().enumerate().take(a + 1) {
            let v = col_a.dot(&jac.column(kb));
            normal[[a, b]] = v;
            normal[[b, a]] = v;
        }
    }
    for a in 0..nf {
        normal[[a, a]] += lambda * normal[[a, a]].max(MIN_COLUMN_SCALE);
    }
    let reduced = cholesky_solve(&normal, &rhs)?;
    let mut step = Array1::zeros(n);
    for (a, &k) in free.iter().enumerate() {
        step[k] = reduced[a];
    }
    Ok(step)
}

/// Ordinary least-squares line `y = slope·x + intercept`.
///
/// Returns `(0, mean y)` when `x` has no spread.
pub fn linear_fit(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len().min(y.len());
    if n == 0 {
        return (0.0, 0.0);
    }
    let nf = n as f64;
    let mx = x[..n].iter().sum::<f64>() / nf;
    let my = y[..n].iter().sum::<f64>() / nf;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for i in 0..n {
        sxy += (x[i] - mx) * (y[i] - my);
        sxx += (x[i] - mx).powi(2);
    }
    if sxx <= 0.0 {
        return (0.0, my);
    }
    let slope = sxy / sxx;
    (slope, my - slope * mx)
}

/// Weighted least-squares factor of `y = a·x` through the origin.
pub fn proportional_fit(x: &[f64], y: &[f64], w: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for ((&xi, &yi), &wi) in x.iter().zip(y).zip(w) {
        num += wi * xi * yi;
        den += wi * xi * xi;
    }
    num / den.max(EPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cholesky_solves_spd_system() {
        let a = Array2::from_shape_vec((3, 3), vec![4.0, 2.0, 0.6, 2.0, 5.0, 1.0, 0.6, 1.0, 3.0])
            .unwrap();
        let x_true = Array1::from_vec(vec![1.0, -2.0, 0.5]);
        let b = a.dot(&x_true);
        let x = cholesky_solve(&a, &b).unwrap();
        for i in 0..3 {
            assert!((x[i] - x_true[i]).abs() < 1e-12, "x[{i}] = {}", x[i]);
        }
        let l = cholesky(&a).unwrap();
        let recon = l.dot(&l.t());
        for ((i, j), v) in recon.indexed_iter() {
            assert!((v - a[[i, j]]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let a = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 2.0, 1.0]).unwrap();
        assert!(matches!(cholesky(&a), Err(MfaError::LinAlg(_))));
        let flat = Array2::zeros((2, 2));
        assert!(cholesky_solve(&flat, &Array1::zeros(2)).is_err());
    }

    #[test]
    fn test_undamped_step_solves_line_fit() {
        // Residual of y = 3x + 1 at parameters (0, 0) over x = 0..4.
        let mut jac = Array2::zeros((5, 2));
        let mut r = vec![0.0; 5];
        for i in 0..5 {
            jac[[i, 0]] = i as f64;
            jac[[i, 1]] = 1.0;
            r[i] = -(3.0 * i as f64 + 1.0);
        }
        let step = damped_normal_step(&jac, &r, 0.0, &[0, 1]).unwrap();
        assert!((step[0] - 3.0).abs() < 1e-10, "slope {}", step[0]);
        assert!((step[1] - 1.0).abs() < 1e-10, "intercept {}", step[1]);
    }

    #[test]
    fn test_frozen_column_gets_no_step() {
        let jac = Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let step = damped_normal_step(&jac, &[-3.0, -4.0], 0.0, &[0]).unwrap();
        assert!((step[0] - 3.0).abs() < 1e-12);
        assert_eq!(step[1], 0.0);
        assert!(damped_normal_step(&jac, &[1.0], 0.0, &[0]).is_err());
    }

    #[test]
    fn test_linear_fit_exact() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 1.0).collect();
        let (slope, intercept) = linear_fit(&x, &y);
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_fit_flat_x() {
        let (slope, intercept) = linear_fit(&[2.0, 2.0], &[1.0, 3.0]);
        assert_eq!(slope, 0.0);
        assert_eq!(intercept, 2.0);
    }

    #[test]
    fn test_proportional_fit_zero_x_is_finite() {
        let a = proportional_fit(&[0.0, 0.0], &[1.0, 2.0], &[1.0, 1.0]);
        assert_eq!(a, 0.0);
        let b = proportional_fit(&[1.0, 2.0], &[2.0, 4.0], &[0.5, 1.0]);
        assert!((b - 2.0).abs() < 1e-12);
    }
}
