// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Dynamic Stock Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Cohort-resolved inflow, stock and outflow for a single time series.
//!
//! Each routine works on one lane: a 1-D series over time together with
//! the survival table `sf[[t, c]]` of its cohorts. Cohort tables are indexed
//! `[[year, cohort]]` and are zero above the diagonal.

use mfa_types::error::{MfaError, MfaResult};
use ndarray::{Array1, Array2, ArrayView1};

/// Result of one lane of a dynamic stock model.
#[derive(Debug, Clone)]
pub struct DsmLane {
    pub inflow: Array1<f64>,
    pub stock: Array1<f64>,
    pub outflow: Array1<f64>,
    pub stock_by_cohort: Array2<f64>,
    pub outflow_by_cohort: Array2<f64>,
    /// Years in which the negative-inflow correction fired.
    pub corrected_years: usize,
}

impl DsmLane {
    fn from_tables(
        inflow: Array1<f64>,
        stock_by_cohort: Array2<f64>,
        outflow_by_cohort: Array2<f64>,
        corrected_years: usize,
    ) -> Self {
        let stock = stock_by_cohort.sum_axis(ndarray::Axis(1));
        let outflow = outflow_by_cohort.sum_axis(ndarray::Axis(1));
        Self {
            inflow,
            stock,
            outflow,
            stock_by_cohort,
            outflow_by_cohort,
            corrected_years,
        }
    }

    /// Largest `|inflow − outflow − Δstock|` over the lane.
    pub fn balance_residual(&self) -> f64 {
        let mut prev = 0.0;
        let mut worst = 0.0_f64;
        for t in 0..self.stock.len() {
            let r = self.inflow[t] - self.outflow[t] - (self.stock[t] - prev);
            worst = worst.max(r.abs());
            prev = self.stock[t];
        }
        worst
    }
}

fn check_square(sf: &Array2<f64>, n: usize) -> MfaResult<()> {
    if sf.nrows() != n || sf.ncols() != n {
        return Err(MfaError::DimensionMismatch(format!(
            "survival table is {}x{}, series has {n} years",
            sf.nrows(),
            sf.ncols()
        )));
    }
    Ok(())
}

/// Outflows of surviving cohorts from year-on-year stock decline.
fn decline_outflows(stock_by_cohort: &Array2<f64>, outflow_by_cohort: &mut Array2<f64>) {
    let n = stock_by_cohort.nrows();
    for c in 0..n {
        for t in c + 1..n {
            outflow_by_cohort[[t, c]] = stock_by_cohort[[t - 1, c]] - stock_by_cohort[[t, c]];
        }
    }
}

/// Stock and outflow from a given inflow.
pub fn inflow_driven(inflow: ArrayView1<f64>, sf: &Array2<f64>) -> MfaResult<DsmLane> {
    let n = inflow.len();
    check_square(sf, n)?;
    let mut stock_by_cohort = Array2::zeros((n, n));
    let mut outflow_by_cohort = Array2::zeros((n, n));
    for c in 0..n {
        for t in c..n {
            stock_by_cohort[[t, c]] = inflow[c] * sf[[t, c]];
        }
        outflow_by_cohort[[c, c]] = inflow[c] - stock_by_cohort[[c, c]];
    }
    decline_outflows(&stock_by_cohort, &mut outflow_by_cohort);
    Ok(DsmLane::from_tables(
        inflow.to_owned(),
        stock_by_cohort,
        outflow_by_cohort,
        0,
    ))
}

/// Inflow and outflow that reproduce a given stock.
///
/// With `correct_negative` a year whose stock falls faster than its cohorts
/// decay gets zero inflow; the surviving cohorts are then scaled down by the
/// missing share and the removed mass leaves as extra outflow.
pub fn stock_driven(
    stock: ArrayView1<f64>,
    sf: &Array2<f64>,
    correct_negative: bool,
) -> MfaResult<DsmLane> {
    let n = stock.len();
    check_square(sf, n)?;
    let mut inflow = Array1::zeros(n);
    let mut stock_by_cohort: Array2<f64> = Array2::zeros((n, n));
    let mut outflow_by_cohort: Array2<f64> = Array2::zeros((n, n));
    let mut corrected_years = 0;

    for m in 0..n {
        if m > 0 {
            for c in 0..m {
                outflow_by_cohort[[m, c]] =
                    stock_by_cohort[[m - 1, c]] - stock_by_cohort[[m, c]];
            }
        }
        let surviving: f64 = (0..m).map(|c| stock_by_cohort[[m, c]]).sum();
        let residual = stock[m] - surviving;
        let mut new_inflow = if sf[[m, m]] != 0.0 {
            residual / sf[[m, m]]
        } else {
            0.0
        };

        if new_inflow < 0.0 && correct_negative {
            new_inflow = 0.0;
            if surviving != 0.0 {
                corrected_years += 1;
                // Negative share of the surviving stock to scrub.
                let delta_share = residual / surviving;
                for c in 0..m {
                    outflow_by_cohort[[m, c]] -= stock_by_cohort[[m, c]] * delta_share;
                    for t in m..n {
                        stock_by_cohort[[t, c]] *= 1.0 + delta_share;
                    }
                }
            }
        }

        inflow[m] = new_inflow;
        for t in m..n {
            stock_by_cohort[[t, m]] = new_inflow * sf[[t, m]];
        }
        outflow_by_cohort[[m, m]] = new_inflow * (1.0 - sf[[m, m]]);
    }

    Ok(DsmLane::from_tables(
        inflow,
        stock_by_cohort,
        outflow_by_cohort,
        corrected_years,
    ))
}

/// Age the cohorts `initial[c]` (stock in year `start`, `c ≤ start`) forward.
///
/// The initial stock enters as inflow in year `start`; later inflow is zero.
pub fn from_initial(
    initial: ArrayView1<f64>,
    start: usize,
    sf: &Array2<f64>,
) -> MfaResult<DsmLane> {
    let n = initial.len();
    check_square(sf, n)?;
    if start >= n {
        return Err(MfaError::DimensionMismatch(format!(
            "initial year index {start} outside {n} years"
        )));
    }
    let mut stock_by_cohort = Array2::zeros((n, n));
    let mut outflow_by_cohort = Array2::zeros((n, n));
    let mut inflow = Array1::zeros(n);
    for c in 0..=start {
        let anchor = sf[[start, c]];
        for t in start..n {
            stock_by_cohort[[t, c]] = if anchor > 0.0 {
                initial[c] * sf[[t, c]] / anchor
            } else {
                0.0
            };
        }
        for t in start + 1..n {
            outflow_by_cohort[[t, c]] = stock_by_cohort[[t - 1, c]] - stock_by_cohort[[t, c]];
        }
    }
    inflow[start] = (0..=start).map(|c| stock_by_cohort[[start, c]]).sum();
    Ok(DsmLane::from_tables(
        inflow,
        stock_by_cohort,
        outflow_by_cohort,
        0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::survival_table;
    use mfa_types::config::LifetimeKind;
    use ndarray::array;

    fn normal_sf(n: usize, mean: f64, std: f64) -> Array2<f64> {
        survival_table(LifetimeKind::Normal, &vec![mean; n], &vec![std; n]).unwrap()
    }

    #[test]
    fn test_inflow_driven_closes_balance() {
        let inflow = Array1::from_shape_fn(30, |i| 10.0 + i as f64);
        let lane = inflow_driven(inflow.view(), &normal_sf(30, 8.0, 3.0)).unwrap();
        assert!(lane.balance_residual() < 1e-9);
        assert!(lane.stock.iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn test_fixed_lifetime_outflow_is_shifted_inflow() {
        let sf = survival_table(LifetimeKind::Fixed, &[2.0; 6], &[0.0; 6]).unwrap();
        let inflow = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let lane = inflow_driven(inflow.view(), &sf).unwrap();
        assert_eq!(lane.outflow.to_vec(), vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(lane.stock[5], 11.0);
    }

    #[test]
    fn test_stock_driven_recovers_inflow() {
        let sf = normal_sf(40, 10.0, 3.0);
        let inflow = Array1::from_shape_fn(40, |i| 5.0 + (i as f64 * 0.3).sin().abs());
        let forward = inflow_driven(inflow.view(), &sf).unwrap();
        let back = stock_driven(forward.stock.view(), &sf, true).unwrap();
        for t in 0..40 {
            assert!((back.inflow[t] - inflow[t]).abs() < 1e-9, "year {t}");
        }
        assert_eq!(back.corrected_years, 0);
    }

    #[test]
    fn test_negative_inflow_correction() {
        let sf = normal_sf(10, 20.0, 5.0);
        let stock = array![10.0, 10.0, 10.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0];
        let lane = stock_driven(stock.view(), &sf, true).unwrap();
        assert_eq!(lane.inflow[3], 0.0);
        assert!(lane.corrected_years >= 1);
        assert!((lane.stock[3] - 4.0).abs() < 1e-9);
        assert!(lane.inflow.iter().all(|&i| i >= 0.0));
        assert!(lane.balance_residual() < 1e-9);

        let raw = stock_driven(stock.view(), &sf, false).unwrap();
        assert!(raw.inflow[3] < 0.0);
        assert!(raw.balance_residual() < 1e-9);
    }

    #[test]
    fn test_zero_survival_gives_zero_inflow() {
        let sf = survival_table(LifetimeKind::Fixed, &[0.0; 4], &[0.0; 4]).unwrap();
        let lane = stock_driven(array![1.0, 1.0, 1.0, 1.0].view(), &sf, true).unwrap();
        assert!(lane.inflow.iter().all(|&i| i == 0.0));
    }

    #[test]
    fn test_from_initial_decays_without_inflow() {
        let sf = normal_sf(20, 6.0, 2.0);
        let mut initial = Array1::zeros(20);
        initial[0] = 3.0;
        initial[2] = 5.0;
        let lane = from_initial(initial.view(), 4, &sf).unwrap();
        assert!((lane.stock[4] - 8.0).abs() < 1e-12);
        assert!((lane.inflow[4] - 8.0).abs() < 1e-12);
        assert!(lane.inflow.iter().skip(5).all(|&i| i == 0.0));
        assert!(lane.stock[19] < lane.stock[4]);
        assert!(lane.balance_residual() < 1e-9);
    }

    #[test]
    fn test_table_size_mismatch() {
        let sf = normal_sf(3, 5.0, 1.0);
        match inflow_driven(array![1.0, 2.0].view(), &sf) {
            Err(MfaError::DimensionMismatch(msg)) => assert!(msg.contains("3x3")),
            other => panic!("Unexpected result: {other:?}"),
        }
    }
}
