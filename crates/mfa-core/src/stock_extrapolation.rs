// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Stock Extrapolation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Future in-use stocks from historic stocks and GDP per capita.
//!
//! Per-capita stocks are regressed against (accumulated) GDP per capita,
//! the fitted curve is spliced onto the observations and scaled back by
//! population.

use mfa_math::extrapolation::{extrapolate, BoundList, FitOptions};
use mfa_math::linalg::linear_fit;
use mfa_math::NamedDimArray;
use mfa_types::config::{ExtrapolationKind, ModelConfig, StockCorrection};
use mfa_types::constants::GAUSSIAN_RESIDUAL_AMPLITUDE;
use mfa_types::dims::{Dimension, DimensionSet, REGION};
use mfa_types::error::{MfaError, MfaResult};
use ndarray::{ArrayD, ArrayView1, ArrayViewMut1, Axis};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct StockExtrapolationSettings {
    pub kind: ExtrapolationKind,
    pub correction: StockCorrection,
    pub relaxation_years: f64,
    pub slope_points: usize,
    pub gdppc_accumulation: bool,
    /// Fit every category separately instead of splitting a regional total.
    pub by_category: bool,
    pub fit: FitOptions,
}

impl StockExtrapolationSettings {
    pub fn from_config(config: &ModelConfig) -> Self {
        let se = &config.stock_extrapolation;
        Self {
            kind: config.customization.stock_extrapolation_class_name,
            correction: se.correction,
            relaxation_years: se.relaxation_years,
            slope_points: se.slope_points,
            gdppc_accumulation: se.gdppc_accumulation,
            by_category: config.customization.do_stock_extrapolation_by_category,
            fit: FitOptions {
                historic_from_regression: true,
                guess_saturation_margin: se.guess_saturation_margin,
                solver: config.solver.clone(),
                ..FitOptions::default()
            },
        }
    }
}

impl Default for StockExtrapolationSettings {
    fn default() -> Self {
        let config = mfa_types::config::StockExtrapolationConfig::default();
        Self {
            kind: ExtrapolationKind::default(),
            correction: config.correction,
            relaxation_years: config.relaxation_years,
            slope_points: config.slope_points,
            gdppc_accumulation: config.gdppc_accumulation,
            by_category: false,
            fit: FitOptions {
                historic_from_regression: true,
                ..FitOptions::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct StockExtrapolation {
    /// Total stocks over the full time axis.
    pub stocks: NamedDimArray,
    pub stocks_pc: NamedDimArray,
    /// Per-capita regression before splicing.
    pub pure_prediction: NamedDimArray,
    pub params: ArrayD<f64>,
    pub param_names: &'static [&'static str],
    pub indep_dims: DimensionSet,
}

/// Running maximum along `letter`.
pub fn running_max(arr: &NamedDimArray, letter: char) -> MfaResult<NamedDimArray> {
    let ax = Axis(arr.dims().index(letter)?);
    let mut values = arr.values().clone();
    values.accumulate_axis_inplace(ax, |&prev, curr| *curr = curr.max(prev));
    NamedDimArray::from_values(arr.dims().clone(), values)
}

/// Extrapolate `historic` (historic time letter plus `r` and optional
/// categories) along `time`, driven by `gdppc` and `population` over `(t, r)`.
pub fn extrapolate_stock(
    historic: &NamedDimArray,
    population: &NamedDimArray,
    gdppc: &NamedDimArray,
    time: &Dimension,
    bounds: &BoundList,
    settings: &StockExtrapolationSettings,
) -> MfaResult<StockExtrapolation> {
    let hist_letter = historic.dims().time_letter().ok_or_else(|| {
        MfaError::DimensionMismatch(format!(
            "historic stock {:?} has no time dimension",
            historic.letters()
        ))
    })?;
    if !historic.dims().contains(REGION) {
        return Err(MfaError::DimensionMismatch(format!(
            "historic stock {:?} has no region dimension",
            historic.letters()
        )));
    }
    let categories: Vec<char> = historic
        .letters()
        .into_iter()
        .filter(|&l| l != hist_letter && l != REGION)
        .collect();

    if settings.by_category || categories.is_empty() {
        let mut independent = vec![REGION];
        independent.extend(&categories);
        return extrapolate_per_capita(
            historic, population, gdppc, time, &independent, bounds, settings,
        );
    }

    let total = historic.sum_to(&[hist_letter, REGION])?;
    let regional = extrapolate_per_capita(
        &total, population, gdppc, time, &[REGION], bounds, settings,
    )?;
    let hist_dim = historic.dims().get(hist_letter)?;
    let last = hist_dim
        .items()
        .last()
        .cloned()
        .ok_or_else(|| MfaError::DimensionMismatch("empty historic time dimension".into()))?;
    let shares = historic
        .slice_item(hist_letter, last)?
        .get_shares_over(&categories)?;

    let target = historic
        .dims()
        .replace(hist_letter, Arc::new(time.clone()))?;
    let mut stocks = regional.stocks.mul(&shares)?.transposed(&target.letters())?;
    stocks.assign_subdim(time.letter, hist_dim, historic)?;
    let stocks_pc = stocks.div(population)?.transposed(&target.letters())?;
    debug!(categories = ?categories, "regional stock split by last historic shares");
    Ok(StockExtrapolation {
        stocks,
        stocks_pc,
        ..regional
    })
}

fn extrapolate_per_capita(
    historic: &NamedDimArray,
    population: &NamedDimArray,
    gdppc: &NamedDimArray,
    time: &Dimension,
    independent: &[char],
    bounds: &BoundList,
    settings: &StockExtrapolationSettings,
) -> MfaResult<StockExtrapolation> {
    let hist_letter = historic.dims().time_letter().ok_or_else(|| {
        MfaError::DimensionMismatch(format!("{:?} has no time dimension", historic.letters()))
    })?;
    let hist_dim = historic.dims().get(hist_letter)?.clone();
    let n_hist = hist_dim.len();
    if n_hist == 0 || n_hist >= time.len() || !time.items().starts_with(hist_dim.items()) {
        return Err(MfaError::DimensionMismatch(format!(
            "historic years must be a proper prefix of '{}'",
            time.name
        )));
    }
    let years = time.values_f64()?;

    let historic_pop = population.slice_subdim(time.letter, &hist_dim)?;
    let hist_pc = historic.div(&historic_pop)?.transposed(&historic.letters())?;

    let driver = if settings.gdppc_accumulation {
        running_max(gdppc, time.letter)?
    } else {
        gdppc.clone()
    };
    let target = historic
        .dims()
        .replace(hist_letter, Arc::new(time.clone()))?;
    let predictor = driver.cast_to(&target)?;

    let mut fit_options = settings.fit.clone();
    fit_options.historic_from_regression = true;
    let fit = extrapolate(
        settings.kind,
        &hist_pc,
        &predictor,
        independent,
        bounds,
        &fit_options,
    )?;
    debug!(kind = ?settings.kind, params = ?fit.params.as_slice(), "stock regression");

    let pure = fit.values.transposed(&target.letters())?;
    let ax = Axis(target.index(time.letter)?);
    let mut spliced = pure.values().clone();
    for (mut out, obs) in spliced
        .lanes_mut(ax)
        .into_iter()
        .zip(hist_pc.values().lanes(ax))
    {
        splice_lane(&mut out, &obs, &years, settings);
    }
    let stocks_pc = NamedDimArray::from_values(target.clone(), spliced)?;
    let stocks = stocks_pc.mul(population)?.transposed(&target.letters())?;

    Ok(StockExtrapolation {
        stocks,
        stocks_pc,
        pure_prediction: pure,
        params: fit.params,
        param_names: fit.param_names,
        indep_dims: fit.indep_dims,
    })
}

/// Join observations onto the prediction in place; `out` holds the prediction.
fn splice_lane(
    out: &mut ArrayViewMut1<f64>,
    observed: &ArrayView1<f64>,
    years: &[f64],
    settings: &StockExtrapolationSettings,
) {
    let n_hist = observed.len();
    let k = n_hist - 1;
    let offset = observed[k] - out[k];
    match settings.correction {
        StockCorrection::GaussianFirstOrder => {
            let n = settings.slope_points.min(n_hist);
            let slope_gap = if n >= 2 {
                let window = k + 1 - n..=k;
                let x = &years[window.clone()];
                let obs: Vec<f64> = window.clone().map(|i| observed[i]).collect();
                let pred: Vec<f64> = window.map(|i| out[i]).collect();
                linear_fit(x, &obs).0 - linear_fit(x, &pred).0
            } else {
                0.0
            };
            let width = (1.0 / GAUSSIAN_RESIDUAL_AMPLITUDE).ln().sqrt() / settings.relaxation_years;
            for i in n_hist..out.len() {
                let s = years[i] - years[k];
                out[i] += (offset + slope_gap * s) * (-(width * s).powi(2)).exp();
            }
        }
        StockCorrection::ShiftZerothOrder => {
            for i in n_hist..out.len() {
                out[i] += offset;
            }
        }
        StockCorrection::None => {}
    }
    for i in 0..n_hist {
        out[i] = observed[i];
    }
}
