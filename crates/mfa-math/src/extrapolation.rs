// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Extrapolation Fitters
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Regression of historic series against a predictor that extends into the future.
//!
//! Arrays carry time on axis 0. Axes listed as independent get one fit per
//! index; all other non-time axes are pooled into a single joint fit.

use crate::linalg::proportional_fit;
use crate::lstsq::least_squares;
use crate::named_array::NamedDimArray;
use mfa_types::config::{ExtrapolationKind, SolverConfig};
use mfa_types::constants::{EPS, N_TRAILING_POINTS, SATURATION_GUESS_MARGIN};
use mfa_types::dims::DimensionSet;
use mfa_types::error::{MfaError, MfaResult};
use ndarray::Dimension as _;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use tracing::{debug, warn};

/// Functional form, parameter layout and starting point of a fitter.
pub trait CurveModel {
    fn param_names(&self) -> &'static [&'static str];

    fn eval(&self, x: f64, params: &[f64]) -> f64;

    fn initial_guess(&self, sample: &FitSample<'_>, margin: f64) -> Vec<f64>;
}

/// One pooled fit group.
pub struct FitSample<'a> {
    /// Predictor, `n_time × n_pool`, row-major.
    pub predictor: &'a [f64],
    /// Observations, `n_historic × n_pool`, row-major.
    pub data: &'a [f64],
    pub n_historic: usize,
    pub n_pool: usize,
}

impl FitSample<'_> {
    fn historic_predictor(&self) -> &[f64] {
        &self.predictor[..self.n_historic * self.n_pool]
    }

    fn last_row<'b>(&self, values: &'b [f64]) -> &'b [f64] {
        let start = (self.n_historic - 1) * self.n_pool;
        &values[start..start + self.n_pool]
    }
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn ln_pos(x: f64) -> f64 {
    x.max(f64::MIN_POSITIVE).ln()
}

impl CurveModel for ExtrapolationKind {
    fn param_names(&self) -> &'static [&'static str] {
        match self {
            ExtrapolationKind::WeightedProportional => &["proportionality_factor"],
            ExtrapolationKind::Sigmoidal | ExtrapolationKind::Exponential => {
                &["saturation_level", "stretch_factor"]
            }
            ExtrapolationKind::LogSigmoidal | ExtrapolationKind::Logistic => {
                &["saturation_level", "stretch_factor", "x_offset"]
            }
        }
    }

    fn eval(&self, x: f64, p: &[f64]) -> f64 {
        match self {
            ExtrapolationKind::WeightedProportional => p[0] * x,
            ExtrapolationKind::Sigmoidal => p[0] / (1.0 + (p[1] / x).exp()),
            ExtrapolationKind::Exponential => p[0] * (1.0 - (-p[1] * x).exp()),
            ExtrapolationKind::LogSigmoidal => p[0] / (1.0 + (-p[1] * (ln_pos(x) - p[2])).exp()),
            ExtrapolationKind::Logistic => p[0] / (1.0 + (-p[1] * (x - p[2])).exp()),
        }
    }

    fn initial_guess(&self, s: &FitSample<'_>, margin: f64) -> Vec<f64> {
        let x_last = max_of(s.last_row(s.predictor));
        let y_last = max_of(s.last_row(s.data));
        match self {
            ExtrapolationKind::WeightedProportional => vec![1.0],
            ExtrapolationKind::Sigmoidal => vec![2.0 * x_last, y_last],
            ExtrapolationKind::Exponential => {
                // Current level taken as half of saturation.
                let saturation = 2.0 * y_last;
                let stretch = -(1.0 - y_last / saturation).ln() / x_last;
                vec![saturation, finite_or(stretch, 1.0)]
            }
            ExtrapolationKind::LogSigmoidal => {
                let y_max = max_of(s.data);
                let hist_x = s.historic_predictor();
                let log_x: Vec<f64> = hist_x.iter().map(|&x| ln_pos(x)).collect();
                let mu = mean_of(&log_x);
                let argmax = s
                    .data
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, &y)| {
                        if y > best.1 {
                            (i, y)
                        } else {
                            best
                        }
                    })
                    .0;
                let denom = log_x[argmax] - mu;
                let beta = if denom.abs() > 1e-12 {
                    -margin.ln() / denom
                } else {
                    1.0
                };
                vec![(1.0 + margin) * y_max, finite_or(beta, 1.0), mu]
            }
            ExtrapolationKind::Logistic => {
                let y_max = max_of(s.data);
                let x_mean = mean_of(s.predictor);
                let x_max = max_of(s.predictor);
                let k = 2.0 / (x_max - x_mean);
                vec![2.0 * y_max, finite_or(k, 1.0), x_mean]
            }
        }
    }
}

// ── Bounds ───────────────────────────────────────────────────────────

/// Box constraint on one named parameter, scalar or over independent-fit dims.
#[derive(Debug, Clone)]
pub struct Bound {
    pub name: String,
    pub lower: NamedDimArray,
    pub upper: NamedDimArray,
}

impl Bound {
    pub fn new(name: &str, lower: NamedDimArray, upper: NamedDimArray) -> MfaResult<Self> {
        if !lower.dims().same_letters(upper.dims()) {
            return Err(MfaError::DimensionMismatch(format!(
                "bound '{name}': lower over {:?}, upper over {:?}",
                lower.letters(),
                upper.letters()
            )));
        }
        let mut upper = upper.cast_to(lower.dims())?;
        let mut lower = lower;
        for (lo, hi) in lower.values_mut().iter_mut().zip(upper.values_mut().iter_mut()) {
            if lo.is_nan() || hi.is_nan() || *lo > *hi {
                return Err(MfaError::ConfigError(format!(
                    "bound '{name}': lower {lo} exceeds upper {hi}"
                )));
            }
            if lo == hi {
                let nudge = 1e-9 * lo.abs().max(1.0);
                *lo -= nudge;
                *hi += nudge;
            }
        }
        Ok(Self {
            name: name.to_string(),
            lower,
            upper,
        })
    }

    pub fn scalar(name: &str, lower: f64, upper: f64) -> MfaResult<Self> {
        Self::new(
            name,
            NamedDimArray::scalar(lower),
            NamedDimArray::scalar(upper),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoundList {
    bounds: Vec<Bound>,
}

impl BoundList {
    pub fn new(bounds: Vec<Bound>) -> Self {
        Self { bounds }
    }

    pub fn push(&mut self, bound: Bound) {
        self.bounds.push(bound);
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bound> {
        self.bounds.iter()
    }

    /// Per-parameter bound arrays shaped like `indep_dims`.
    pub fn resolve(&self, names: &[&str], indep_dims: &DimensionSet) -> MfaResult<ParamBounds> {
        let mut out = ParamBounds::unbounded(&indep_dims.shape(), names.len());
        for bound in &self.bounds {
            let pos = names.iter().position(|n| *n == bound.name).ok_or_else(|| {
                MfaError::ConfigError(format!(
                    "bound on unknown parameter '{}', expected one of {names:?}",
                    bound.name
                ))
            })?;
            out.lower[pos] = bound.lower.align_to(indep_dims)?;
            out.upper[pos] = bound.upper.align_to(indep_dims)?;
        }
        Ok(out)
    }
}

/// Lower and upper bound per parameter, each shaped like the independent axes.
#[derive(Debug, Clone)]
pub struct ParamBounds {
    pub lower: Vec<ArrayD<f64>>,
    pub upper: Vec<ArrayD<f64>>,
}

impl ParamBounds {
    pub fn unbounded(indep_shape: &[usize], n_params: usize) -> Self {
        Self {
            lower: vec![ArrayD::from_elem(IxDyn(indep_shape), f64::NEG_INFINITY); n_params],
            upper: vec![ArrayD::from_elem(IxDyn(indep_shape), f64::INFINITY); n_params],
        }
    }

    fn at(&self, idx: &[usize]) -> (Vec<f64>, Vec<f64>) {
        (
            self.lower.iter().map(|a| a[idx]).collect(),
            self.upper.iter().map(|a| a[idx]).collect(),
        )
    }
}

/// Move an initial guess inside `[lower, upper]`.
fn guess_into_bounds(guess: &mut [f64], lower: &[f64], upper: &[f64]) {
    for ((g, &lo), &hi) in guess.iter_mut().zip(lower).zip(upper) {
        if *g >= lo && *g <= hi {
            continue;
        }
        *g = match (lo.is_finite(), hi.is_finite()) {
            (true, true) => 0.5 * (lo + hi),
            (true, false) => lo,
            (false, true) => hi,
            (false, false) => *g,
        };
    }
}

// ── Fitting ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Keep the fitted curve over the historic prefix instead of the observations.
    pub historic_from_regression: bool,
    /// Trailing points of the weighted proportional fit.
    pub trailing_points: usize,
    /// `ε` of the log-sigmoid initial guess.
    pub guess_saturation_margin: f64,
    pub solver: SolverConfig,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            historic_from_regression: false,
            trailing_points: N_TRAILING_POINTS,
            guess_saturation_margin: SATURATION_GUESS_MARGIN,
            solver: SolverConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FitResult {
    /// Same shape as the predictor.
    pub values: ArrayD<f64>,
    /// Independent-axes shape followed by one entry per parameter.
    pub params: ArrayD<f64>,
    pub param_names: &'static [&'static str],
}

/// Linearly increasing weights on the last `n` historic rows, normalised.
fn trailing_weights(n_historic: usize, n: usize) -> Vec<f64> {
    let raw: Vec<f64> = (0..n_historic)
        .map(|i| (i as f64 + n as f64 + 1.0 - n_historic as f64).max(0.0))
        .collect();
    let total: f64 = raw.iter().sum();
    raw.iter().map(|w| w / total.max(EPS)).collect()
}

/// Parameters of one fit group; non-converged regressions are rejected by the caller.
struct GroupFit {
    params: Vec<f64>,
    converged: bool,
    iterations: usize,
    cost: f64,
}

fn fit_group(
    kind: ExtrapolationKind,
    sample: &FitSample<'_>,
    lower: &[f64],
    upper: &[f64],
    options: &FitOptions,
) -> MfaResult<GroupFit> {
    if kind == ExtrapolationKind::WeightedProportional {
        let w_rows = trailing_weights(sample.n_historic, options.trailing_points);
        let w: Vec<f64> = (0..sample.n_historic * sample.n_pool)
            .map(|i| w_rows[i / sample.n_pool])
            .collect();
        let a = proportional_fit(sample.historic_predictor(), sample.data, &w);
        return Ok(GroupFit {
            params: vec![a.clamp(lower[0], upper[0])],
            converged: true,
            iterations: 0,
            cost: 0.0,
        });
    }

    let mut guess = kind.initial_guess(sample, options.guess_saturation_margin);
    guess_into_bounds(&mut guess, lower, upper);
    let x_hist = sample.historic_predictor();
    let residuals = |p: &[f64]| -> Vec<f64> {
        x_hist
            .iter()
            .zip(sample.data)
            .map(|(&x, &y)| kind.eval(x, p) - y)
            .collect()
    };
    let result = least_squares(residuals, &guess, lower, upper, &options.solver)?;
    Ok(GroupFit {
        params: result.params,
        converged: result.converged,
        iterations: result.iterations,
        cost: result.cost,
    })
}

fn sub_view<'a>(array: &'a ArrayD<f64>, axes: &[usize], idx: &[usize]) -> ArrayViewD<'a, f64> {
    let mut pairs: Vec<(usize, usize)> = axes.iter().copied().zip(idx.iter().copied()).collect();
    pairs.sort_unstable_by(|a, b| b.0.cmp(&a.0));
    let mut view = array.view();
    for (ax, i) in pairs {
        view = view.index_axis_move(Axis(ax), i);
    }
    view
}

fn fit_arrays(
    kind: ExtrapolationKind,
    data: &ArrayD<f64>,
    predictor: &ArrayD<f64>,
    independent_axes: &[usize],
    bounds: &ParamBounds,
    options: &FitOptions,
    describe: &dyn Fn(&[usize]) -> String,
) -> MfaResult<FitResult> {
    if data.ndim() != predictor.ndim() || data.ndim() == 0 {
        return Err(MfaError::DimensionMismatch(format!(
            "data has {} axes, predictor has {}",
            data.ndim(),
            predictor.ndim()
        )));
    }
    let n_historic = data.shape()[0];
    let n_time = predictor.shape()[0];
    if n_historic == 0 || n_historic > n_time {
        return Err(MfaError::ConfigError(format!(
            "{n_historic} historic points for a predictor of length {n_time}"
        )));
    }
    if data.shape()[1..] != predictor.shape()[1..] {
        return Err(MfaError::DimensionMismatch(format!(
            "data shape {:?} and predictor shape {:?} differ beyond time",
            data.shape(),
            predictor.shape()
        )));
    }
    let mut axes = independent_axes.to_vec();
    axes.sort_unstable();
    axes.dedup();
    if axes.iter().any(|&a| a == 0 || a >= data.ndim()) {
        return Err(MfaError::DimensionMismatch(format!(
            "independent axes {independent_axes:?} must be non-time axes of a {}-d array",
            data.ndim()
        )));
    }

    let names = kind.param_names();
    let indep_shape: Vec<usize> = axes.iter().map(|&a| data.shape()[a]).collect();
    let mut params_shape = indep_shape.clone();
    params_shape.push(names.len());
    let mut params = ArrayD::zeros(IxDyn(&params_shape));
    let mut values = ArrayD::zeros(predictor.raw_dim());

    for idx in ndarray::indices(IxDyn(&indep_shape)) {
        let idx = idx.slice();
        let pred_view = sub_view(predictor, &axes, idx);
        let data_view = sub_view(data, &axes, idx);
        let n_pool: usize = pred_view.shape()[1..].iter().product();
        let pred_flat: Vec<f64> = pred_view.iter().copied().collect();
        let data_flat: Vec<f64> = data_view.iter().copied().collect();
        let sample = FitSample {
            predictor: &pred_flat,
            data: &data_flat,
            n_historic,
            n_pool,
        };
        let (lower, upper) = bounds.at(idx);

        let group = fit_group(kind, &sample, &lower, &upper, options).map_err(|e| {
            MfaError::FitFailed {
                location: describe(idx),
                message: e.to_string(),
            }
        })?;
        let fit = group.params;
        if fit.iter().any(|p| !p.is_finite()) {
            return Err(MfaError::FitFailed {
                location: describe(idx),
                message: format!("non-finite parameters {fit:?}"),
            });
        }
        if !group.converged {
            warn!(location = %describe(idx), params = ?fit, "{kind:?} fit did not converge");
            return Err(MfaError::FitFailed {
                location: describe(idx),
                message: format!(
                    "{kind:?} regression not converged after {} iterations \
                     (cost {:.3e}, parameters {fit:?})",
                    group.iterations, group.cost
                ),
            });
        }
        debug!(location = %describe(idx), params = ?fit, iterations = group.iterations, "fitted {kind:?}");

        let mut curve: Vec<f64> = pred_flat.iter().map(|&x| kind.eval(x, &fit)).collect();
        if !options.historic_from_regression {
            curve[..data_flat.len()].copy_from_slice(&data_flat);
        }
        let curve = ArrayD::from_shape_vec(pred_view.raw_dim(), curve)
            .map_err(|e| MfaError::LinAlg(e.to_string()))?;

        let mut pairs: Vec<(usize, usize)> = axes.iter().copied().zip(idx.iter().copied()).collect();
        pairs.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        let mut out = values.view_mut();
        for (ax, i) in pairs {
            out = out.index_axis_move(Axis(ax), i);
        }
        out.assign(&curve);

        let mut prm = params.view_mut();
        for &i in idx {
            prm = prm.index_axis_move(Axis(0), i);
        }
        for (k, p) in fit.iter().enumerate() {
            prm[[k]] = *p;
        }
    }

    Ok(FitResult {
        values,
        params,
        param_names: names,
    })
}

/// Fit `data` (historic rows) against `predictor` (all rows).
pub fn extrapolate_array(
    kind: ExtrapolationKind,
    data: &ArrayD<f64>,
    predictor: &ArrayD<f64>,
    independent_axes: &[usize],
    bounds: Option<&ParamBounds>,
    options: &FitOptions,
) -> MfaResult<FitResult> {
    let indep_shape: Vec<usize> = {
        let mut axes = independent_axes.to_vec();
        axes.sort_unstable();
        axes.dedup();
        axes.iter()
            .map(|&a| data.shape().get(a).copied().unwrap_or(0))
            .collect()
    };
    let unbounded = ParamBounds::unbounded(&indep_shape, kind.param_names().len());
    fit_arrays(
        kind,
        data,
        predictor,
        independent_axes,
        bounds.unwrap_or(&unbounded),
        options,
        &|idx| format!("{idx:?}"),
    )
}

/// Result of a fit over named arrays.
#[derive(Debug, Clone)]
pub struct NamedFit {
    /// Typed like the predictor.
    pub values: NamedDimArray,
    /// Shaped `indep_dims` followed by one entry per parameter.
    pub params: ArrayD<f64>,
    pub param_names: &'static [&'static str],
    pub indep_dims: DimensionSet,
}

/// Fit a historic series over named dimensions.
///
/// `predictor` carries the full time dimension; `data` carries the historic
/// one plus exactly the predictor's other letters. One fit is made per item
/// combination of `independent`; failures name those items.
pub fn extrapolate(
    kind: ExtrapolationKind,
    data: &NamedDimArray,
    predictor: &NamedDimArray,
    independent: &[char],
    bounds: &BoundList,
    options: &FitOptions,
) -> MfaResult<NamedFit> {
    let time = predictor.dims().time_letter().ok_or_else(|| {
        MfaError::DimensionMismatch(format!(
            "predictor {:?} has no time dimension",
            predictor.letters()
        ))
    })?;
    let hist = data.dims().time_letter().ok_or_else(|| {
        MfaError::DimensionMismatch(format!("data {:?} has no time dimension", data.letters()))
    })?;
    let rest: Vec<char> = predictor.letters().into_iter().filter(|&l| l != time).collect();
    let data_rest: Vec<char> = data.letters().into_iter().filter(|&l| l != hist).collect();
    if rest.len() != data_rest.len() || data_rest.iter().any(|l| !rest.contains(l)) {
        return Err(MfaError::DimensionMismatch(format!(
            "data {:?} and predictor {:?} differ beyond time",
            data.letters(),
            predictor.letters()
        )));
    }

    let mut pred_order = vec![time];
    pred_order.extend(&rest);
    let mut data_order = vec![hist];
    data_order.extend(&rest);
    let pred = predictor.transposed(&pred_order)?;
    let hist_data = data.transposed(&data_order)?;

    let mut axes = Vec::with_capacity(independent.len());
    for &l in independent {
        let pos = rest.iter().position(|&r| r == l).ok_or_else(|| {
            MfaError::DimensionMismatch(format!(
                "independent letter '{l}' not among {rest:?}"
            ))
        })?;
        axes.push(pos + 1);
    }
    axes.sort_unstable();
    axes.dedup();
    let indep_letters: Vec<char> = axes.iter().map(|&a| pred_order[a]).collect();
    let indep_dims = pred.dims().select(&indep_letters)?;

    let names = kind.param_names();
    let resolved = bounds.resolve(names, &indep_dims)?;
    let describe = |idx: &[usize]| -> String {
        let parts: Vec<String> = indep_dims
            .iter()
            .zip(idx)
            .map(|(d, &i)| format!("{}={}", d.letter, d.items()[i]))
            .collect();
        if parts.is_empty() {
            "pooled fit".to_string()
        } else {
            parts.join(", ")
        }
    };
    let fit = fit_arrays(
        kind,
        hist_data.values(),
        pred.values(),
        &axes,
        &resolved,
        options,
        &describe,
    )?;

    let values = NamedDimArray::from_values(pred.dims().clone(), fit.values)?
        .transposed(&predictor.letters())?;
    Ok(NamedFit {
        values,
        params: fit.params,
        param_names: fit.param_names,
        indep_dims,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfa_types::dims::Dimension;
    use ndarray::Array1;

    fn column(values: &[f64]) -> ArrayD<f64> {
        Array1::from_vec(values.to_vec()).into_dyn()
    }

    #[test]
    fn test_weighted_proportional_recovers_slope() {
        let x: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let y: Vec<f64> = x[..6].iter().map(|v| 2.0 * v).collect();
        let res = extrapolate_array(
            ExtrapolationKind::WeightedProportional,
            &column(&y),
            &column(&x),
            &[],
            None,
            &FitOptions::default(),
        )
        .unwrap();
        assert!((res.params[[0]] - 2.0).abs() < 1e-12);
        assert!((res.values[[9]] - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_trailing_weights_shape() {
        let w = trailing_weights(8, 5);
        assert_eq!(w[..3], [0.0, 0.0, 0.0]);
        assert!((w[7] / w[3] - 5.0).abs() < 1e-12);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_historic_prefix_kept() {
        let x: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let y = [1.0, 2.5, 2.9, 4.2, 5.1];
        let res = extrapolate_array(
            ExtrapolationKind::WeightedProportional,
            &column(&y),
            &column(&x),
            &[],
            None,
            &FitOptions::default(),
        )
        .unwrap();
        for i in 0..5 {
            assert_eq!(res.values[[i]], y[i]);
        }
        let opts = FitOptions {
            historic_from_regression: true,
            ..FitOptions::default()
        };
        let fitted = extrapolate_array(
            ExtrapolationKind::WeightedProportional,
            &column(&y),
            &column(&x),
            &[],
            None,
            &opts,
        )
        .unwrap();
        assert!((fitted.values[[0]] - fitted.params[[0]]).abs() < 1e-12);
    }

    #[test]
    fn test_exponential_fit_recovers_parameters() {
        let x: Vec<f64> = (1..=30).map(|v| v as f64).collect();
        let y: Vec<f64> = x[..20].iter().map(|v| 10.0 * (1.0 - (-0.1 * v).exp())).collect();
        let res = extrapolate_array(
            ExtrapolationKind::Exponential,
            &column(&y),
            &column(&x),
            &[],
            None,
            &FitOptions::default(),
        )
        .unwrap();
        assert!((res.params[[0]] - 10.0).abs() < 1e-4, "A = {}", res.params[[0]]);
        assert!((res.params[[1]] - 0.1).abs() < 1e-5, "B = {}", res.params[[1]]);
        let expected = 10.0 * (1.0 - (-3.0_f64).exp());
        assert!((res.values[[29]] - expected).abs() < 1e-3);
    }

    #[test]
    fn test_log_sigmoid_respects_saturation_bound() {
        let x: Vec<f64> = (1..=40).map(|v| 1000.0 * v as f64).collect();
        let y: Vec<f64> = x[..25]
            .iter()
            .map(|v| 12.0 / (1.0 + (-1.5 * (v.ln() - 9.5)).exp()))
            .collect();
        let dims = DimensionSet::empty();
        let bounds = BoundList::new(vec![Bound::scalar("saturation_level", 5.0, 8.0).unwrap()]);
        let resolved = bounds
            .resolve(ExtrapolationKind::LogSigmoidal.param_names(), &dims)
            .unwrap();
        let res = extrapolate_array(
            ExtrapolationKind::LogSigmoidal,
            &column(&y),
            &column(&x),
            &[],
            Some(&resolved),
            &FitOptions::default(),
        )
        .unwrap();
        let a = res.params[[0]];
        assert!((5.0..=8.0).contains(&a), "A = {a}");
    }

    #[test]
    fn test_independent_fits_per_region() {
        let dims = DimensionSet::new(vec![
            Dimension::years('t', "Time", 2001, 2010).unwrap(),
            Dimension::from_strs('r', "Region", &["EUR", "CHA"]).unwrap(),
        ])
        .unwrap();
        let h = Dimension::years('h', "Historic Time", 2001, 2005).unwrap();
        let predictor = NamedDimArray::from_fn(&dims, |idx| (idx[0] + 1) as f64);
        let data = predictor
            .slice_subdim('t', &h)
            .unwrap()
            .zip_with(
                &NamedDimArray::from_vec(&dims.subset(&['r']).unwrap(), vec![2.0, 3.0]).unwrap(),
                |x, s| x * s,
            )
            .unwrap();
        let fit = extrapolate(
            ExtrapolationKind::WeightedProportional,
            &data,
            &predictor,
            &['r'],
            &BoundList::default(),
            &FitOptions::default(),
        )
        .unwrap();
        assert_eq!(fit.params.shape(), &[2, 1]);
        assert!((fit.params[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((fit.params[[1, 0]] - 3.0).abs() < 1e-12);
        assert_eq!(fit.values.letters(), vec!['t', 'r']);
        assert!((fit.values.values()[[9, 1]] - 30.0).abs() < 1e-10);
    }

    fn saturating(n_time: usize, n_hist: usize) -> (ArrayD<f64>, ArrayD<f64>) {
        let x: Vec<f64> = (1..=n_time).map(|v| v as f64).collect();
        let y: Vec<f64> = x[..n_hist].iter().map(|v| 10.0 * (1.0 - (-0.1 * v).exp())).collect();
        (column(&y), column(&x))
    }

    #[test]
    fn test_unconverged_regression_is_fit_failed() {
        let (y, x) = saturating(30, 20);
        let mut opts = FitOptions::default();
        opts.solver.max_iterations = 1;
        match extrapolate_array(ExtrapolationKind::Exponential, &y, &x, &[], None, &opts) {
            Err(MfaError::FitFailed { message, .. }) => {
                assert!(message.contains("after 1 iterations"), "{message}");
            }
            other => panic!("Expected FitFailed, got {other:?}"),
        }
        let converged =
            extrapolate_array(ExtrapolationKind::Exponential, &y, &x, &[], None, &FitOptions::default());
        assert!(converged.is_ok(), "{converged:?}");
    }

    #[test]
    fn test_non_finite_data_is_fit_failed() {
        let (mut y, x) = saturating(30, 20);
        y[[7]] = f64::NAN;
        for kind in [ExtrapolationKind::WeightedProportional, ExtrapolationKind::Exponential] {
            let res = extrapolate_array(kind, &y, &x, &[], None, &FitOptions::default());
            assert!(
                matches!(res, Err(MfaError::FitFailed { .. })),
                "{kind:?}: {res:?}"
            );
        }
    }

    #[test]
    fn test_fit_failure_names_the_region() {
        let dims = DimensionSet::new(vec![
            Dimension::years('t', "Time", 2001, 2010).unwrap(),
            Dimension::from_strs('r', "Region", &["EUR", "CHA"]).unwrap(),
        ])
        .unwrap();
        let h = Dimension::years('h', "Historic Time", 2001, 2005).unwrap();
        let predictor = NamedDimArray::from_fn(&dims, |idx| (idx[0] + 1) as f64);
        let mut data = predictor.slice_subdim('t', &h).unwrap();
        data.values_mut()[[2, 1]] = f64::INFINITY;
        let err = extrapolate(
            ExtrapolationKind::WeightedProportional,
            &data,
            &predictor,
            &['r'],
            &BoundList::default(),
            &FitOptions::default(),
        )
        .unwrap_err();
        match err {
            MfaError::FitFailed { location, .. } => assert_eq!(location, "r=CHA"),
            other => panic!("Expected FitFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_bound_name() {
        let bounds = BoundList::new(vec![Bound::scalar("slope", 0.0, 1.0).unwrap()]);
        let err = bounds
            .resolve(ExtrapolationKind::Exponential.param_names(), &DimensionSet::empty())
            .unwrap_err();
        assert!(matches!(err, MfaError::ConfigError(_)));
    }

    #[test]
    fn test_equal_bounds_nudged() {
        let b = Bound::scalar("saturation_level", 4.0, 4.0).unwrap();
        let lo = b.lower.as_scalar().unwrap();
        let hi = b.upper.as_scalar().unwrap();
        assert!(lo < 4.0 && hi > 4.0);
        assert!(hi - lo < 1e-7);
    }

    #[test]
    fn test_guess_moved_into_bounds() {
        let mut g = vec![10.0, -3.0, 0.5];
        guess_into_bounds(
            &mut g,
            &[0.0, 1.0, f64::NEG_INFINITY],
            &[4.0, f64::INFINITY, f64::INFINITY],
        );
        assert_eq!(g, vec![2.0, 1.0, 0.5]);
    }
}
