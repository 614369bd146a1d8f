// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Trade
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Regional imports and exports, global balancing and projection.
//!
//! Both arrays share their dims, which must include the region letter `r`.
//! Balancing makes global imports equal global exports for every remaining
//! index; projection scales history by a driver series.

use mfa_math::extrapolation::{extrapolate, BoundList, FitOptions};
use mfa_math::named_array::safe_div;
use mfa_math::NamedDimArray;
use mfa_types::config::ExtrapolationKind;
use mfa_types::constants::EPS;
use mfa_types::dims::{DimensionSet, REGION};
use mfa_types::error::{MfaError, MfaResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// How the global reference trade volume is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancePolicy {
    Maximum,
    Minimum,
    Imports,
    Exports,
    /// Shift every region's net trade towards zero global imbalance,
    /// keeping its direction.
    Scaling,
    Hmean,
    Gmean,
    Amean,
}

impl BalancePolicy {
    pub const ALL: [BalancePolicy; 8] = [
        BalancePolicy::Maximum,
        BalancePolicy::Minimum,
        BalancePolicy::Imports,
        BalancePolicy::Exports,
        BalancePolicy::Scaling,
        BalancePolicy::Hmean,
        BalancePolicy::Gmean,
        BalancePolicy::Amean,
    ];

    /// Global reference volume from global imports `i` and exports `e`.
    fn reference(&self, i: f64, e: f64) -> f64 {
        match self {
            BalancePolicy::Maximum => i.max(e),
            BalancePolicy::Minimum => i.min(e),
            BalancePolicy::Imports => i,
            BalancePolicy::Exports => e,
            BalancePolicy::Hmean => safe_div(2.0 * i * e, i + e),
            BalancePolicy::Gmean => (i * e).max(0.0).sqrt(),
            BalancePolicy::Amean | BalancePolicy::Scaling => 0.5 * (i + e),
        }
    }
}

impl FromStr for BalancePolicy {
    type Err = MfaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maximum" => Ok(BalancePolicy::Maximum),
            "minimum" => Ok(BalancePolicy::Minimum),
            "imports" => Ok(BalancePolicy::Imports),
            "exports" => Ok(BalancePolicy::Exports),
            "scaling" => Ok(BalancePolicy::Scaling),
            "hmean" => Ok(BalancePolicy::Hmean),
            "gmean" => Ok(BalancePolicy::Gmean),
            "amean" => Ok(BalancePolicy::Amean),
            other => Err(MfaError::ConfigError(format!(
                "unknown trade balance policy '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Imports,
    Exports,
}

impl TradeSide {
    pub fn other(self) -> Self {
        match self {
            TradeSide::Imports => TradeSide::Exports,
            TradeSide::Exports => TradeSide::Imports,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    imports: NamedDimArray,
    exports: NamedDimArray,
}

impl Trade {
    /// Exports are reordered to the imports' letter order.
    pub fn new(imports: NamedDimArray, exports: NamedDimArray) -> MfaResult<Self> {
        for (side, arr) in [("imports", &imports), ("exports", &exports)] {
            if !arr.dims().contains(REGION) {
                return Err(MfaError::MissingRegionDim(format!(
                    "{side} typed {:?}",
                    arr.letters()
                )));
            }
        }
        if !imports.dims().same_letters(exports.dims()) {
            return Err(MfaError::TradeDimensionMismatch(format!(
                "imports {:?} vs exports {:?}",
                imports.letters(),
                exports.letters()
            )));
        }
        let exports = exports.transposed(&imports.letters()).map_err(|e| {
            MfaError::TradeDimensionMismatch(format!("exports do not match imports: {e}"))
        })?;
        Ok(Self { imports, exports })
    }

    pub fn zeros(dims: &DimensionSet) -> MfaResult<Self> {
        Self::new(NamedDimArray::zeros(dims), NamedDimArray::zeros(dims))
    }

    pub fn imports(&self) -> &NamedDimArray {
        &self.imports
    }

    pub fn exports(&self) -> &NamedDimArray {
        &self.exports
    }

    pub fn side(&self, side: TradeSide) -> &NamedDimArray {
        match side {
            TradeSide::Imports => &self.imports,
            TradeSide::Exports => &self.exports,
        }
    }

    pub fn dims(&self) -> &DimensionSet {
        self.imports.dims()
    }

    pub fn net_imports(&self) -> MfaResult<NamedDimArray> {
        self.imports.sub(&self.exports)
    }

    /// `Σ_r imports − Σ_r exports`.
    pub fn global_imbalance(&self) -> MfaResult<NamedDimArray> {
        self.net_imports()?.sum_over(&[REGION])
    }

    /// Balanced copy; global imports equal global exports afterwards.
    ///
    /// Reference policies rescale each side uniformly over regions. When one
    /// side is globally zero it stays zero.
    pub fn balance(&self, policy: BalancePolicy) -> MfaResult<Trade> {
        let balanced = match policy {
            BalancePolicy::Scaling => self.balance_by_scaling()?,
            _ => {
                let global_imports = self.imports.sum_over(&[REGION])?;
                let global_exports = self.exports.sum_over(&[REGION])?;
                let reference =
                    global_imports.zip_with(&global_exports, |i, e| policy.reference(i, e))?;
                let import_factor = reference.zip_with(&global_imports, |r, i| r / i.max(EPS))?;
                let export_factor = reference.zip_with(&global_exports, |r, e| r / e.max(EPS))?;
                Trade {
                    imports: self
                        .imports
                        .mul(&import_factor)?
                        .transposed(&self.imports.letters())?,
                    exports: self
                        .exports
                        .mul(&export_factor)?
                        .transposed(&self.imports.letters())?,
                }
            }
        };
        debug!(
            policy = ?policy,
            imbalance = balanced.global_imbalance()?.max_abs(),
            "trade balanced"
        );
        Ok(balanced)
    }

    fn balance_by_scaling(&self) -> MfaResult<Trade> {
        let net = self.net_imports()?;
        let global = net.sum_over(&[REGION])?;
        let absolute = net.abs().sum_over(&[REGION])?;
        let shift = global.zip_with(&absolute, |g, a| g / a.max(EPS))?;
        let new_net = net
            .zip_with(&shift, |n, s| n * (1.0 - mfa_math::named_array::sign(n) * s))?
            .transposed(&self.imports.letters())?;
        Ok(Trade {
            imports: new_net.clip_min(0.0),
            exports: new_net.apply(|n| (-n).max(0.0)),
        })
    }

    /// Project historic trade (typed with `h`) onto the time axis of `scaler`.
    ///
    /// `scale_first` is projected against `scaler`; the other side against
    /// `max(scaler + net imports of the first side, 0)`. Letters the scaler
    /// carries beyond the historic trade are distributed by the scaler's
    /// historic shares over them. `alpha` weights the proportional projection
    /// against the last historic value.
    pub fn predict(
        historic: &Trade,
        scaler: &NamedDimArray,
        scale_first: TradeSide,
        balance_to: Option<BalancePolicy>,
        alpha: f64,
    ) -> MfaResult<Trade> {
        let hist_letter = historic.dims().time_letter().ok_or_else(|| {
            MfaError::TradeDimensionMismatch(format!(
                "historic trade {:?} has no time dimension",
                historic.imports.letters()
            ))
        })?;
        let time_letter = scaler.dims().time_letter().ok_or_else(|| {
            MfaError::TradeDimensionMismatch(format!(
                "trade scaler {:?} has no time dimension",
                scaler.letters()
            ))
        })?;
        if hist_letter == time_letter {
            return Err(MfaError::TradeDimensionMismatch(format!(
                "historic trade and scaler share the time letter '{time_letter}'"
            )));
        }
        let hist_dim = historic.dims().get(hist_letter)?.clone();
        let missing: Vec<char> = scaler
            .letters()
            .into_iter()
            .filter(|&l| l != time_letter && !historic.dims().contains(l))
            .collect();

        let mut first = historic.side(scale_first).clone();
        let mut second = historic.side(scale_first.other()).clone();
        if !missing.is_empty() {
            let shares = scaler
                .slice_subdim(time_letter, &hist_dim)?
                .get_shares_over(&missing)?;
            first = first.mul(&shares)?;
            second = second.mul(&shares)?;
        }

        let future_first = extrapolate_to_future(&first, scaler, alpha)?;
        let first_net = match scale_first {
            TradeSide::Imports => future_first.clone(),
            TradeSide::Exports => future_first.scale(-1.0),
        };
        let scaler_second = scaler.add(&first_net)?.clip_min(0.0);
        let future_second = extrapolate_to_future(&second, &scaler_second, alpha)?;

        let trade = match scale_first {
            TradeSide::Imports => Trade::new(future_first, future_second)?,
            TradeSide::Exports => Trade::new(future_second, future_first)?,
        };
        match balance_to {
            Some(policy) => trade.balance(policy),
            None => Ok(trade),
        }
    }
}

/// Weighted proportional projection of `historic` (time letter first) by
/// `scale_by`, damped towards the last historic value as
/// `last^(1−α) · projection^α`; the historic prefix is kept.
pub fn extrapolate_to_future(
    historic: &NamedDimArray,
    scale_by: &NamedDimArray,
    alpha: f64,
) -> MfaResult<NamedDimArray> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(MfaError::ConfigError(format!(
            "trade projection weight {alpha} outside [0, 1]"
        )));
    }
    let hist_letter = historic.dims().time_letter().ok_or_else(|| {
        MfaError::DimensionMismatch(format!("{:?} has no time dimension", historic.letters()))
    })?;
    let time_letter = scale_by.dims().time_letter().ok_or_else(|| {
        MfaError::DimensionMismatch(format!("{:?} has no time dimension", scale_by.letters()))
    })?;
    let rest: Vec<char> = historic
        .letters()
        .into_iter()
        .filter(|&l| l != hist_letter)
        .collect();
    if let Some(extra) = scale_by
        .letters()
        .into_iter()
        .find(|&l| l != time_letter && !rest.contains(&l))
    {
        return Err(MfaError::TradeDimensionMismatch(format!(
            "scaler letter '{extra}' is absent from historic trade {:?}",
            historic.letters()
        )));
    }

    let all = historic.dims().union(scale_by.dims())?;
    let mut out_letters = vec![time_letter];
    out_letters.extend(&rest);
    let out_dims = all.select(&out_letters)?;
    let predictor = scale_by.cast_to(&out_dims)?;

    let fit = extrapolate(
        ExtrapolationKind::WeightedProportional,
        historic,
        &predictor,
        &rest,
        &BoundList::default(),
        &FitOptions::default(),
    )?;
    let projection = fit.values.transposed(&out_letters)?.clip_min(0.0);

    let hist_dim = historic.dims().get(hist_letter)?;
    let last = hist_dim
        .items()
        .last()
        .cloned()
        .ok_or_else(|| MfaError::DimensionMismatch("empty historic time dimension".into()))?;
    let last_value = historic.slice_item(hist_letter, last)?.clip_min(0.0);
    let mut projected = last_value.zip_with(&projection, |l, x| {
        l.powf(1.0 - alpha) * x.powf(alpha)
    })?;
    projected = projected.transposed(&out_letters)?;
    projected.assign_subdim(time_letter, hist_dim, historic)?;
    Ok(projected)
}
