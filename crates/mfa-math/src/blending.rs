// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Blending
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Smooth transitions between two regimes along a driver.

use crate::named_array::NamedDimArray;
use mfa_types::dims::DimensionSet;
use mfa_types::error::{MfaError, MfaResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendKind {
    Linear,
    Sigmoid3,
    Sigmoid4,
    ExtrapolSigmoid3,
    ExtrapolSigmoid4,
    ClampedSigmoid3,
    ClampedSigmoid4,
    Hermite,
    Quintic,
    #[default]
    PolyMix,
    ConvergeQuadratic,
}

impl BlendKind {
    pub const ALL: [BlendKind; 11] = [
        BlendKind::Linear,
        BlendKind::Sigmoid3,
        BlendKind::Sigmoid4,
        BlendKind::ExtrapolSigmoid3,
        BlendKind::ExtrapolSigmoid4,
        BlendKind::ClampedSigmoid3,
        BlendKind::ClampedSigmoid4,
        BlendKind::Hermite,
        BlendKind::Quintic,
        BlendKind::PolyMix,
        BlendKind::ConvergeQuadratic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BlendKind::Linear => "linear",
            BlendKind::Sigmoid3 => "sigmoid3",
            BlendKind::Sigmoid4 => "sigmoid4",
            BlendKind::ExtrapolSigmoid3 => "extrapol_sigmoid3",
            BlendKind::ExtrapolSigmoid4 => "extrapol_sigmoid4",
            BlendKind::ClampedSigmoid3 => "clamped_sigmoid3",
            BlendKind::ClampedSigmoid4 => "clamped_sigmoid4",
            BlendKind::Hermite => "hermite",
            BlendKind::Quintic => "quintic",
            BlendKind::PolyMix => "poly_mix",
            BlendKind::ConvergeQuadratic => "converge_quadratic",
        }
    }

    /// Raw logistic kernels are not pinned to 0 and 1 at the ends.
    pub fn maps_unit_interval(&self) -> bool {
        !matches!(self, BlendKind::Sigmoid3 | BlendKind::Sigmoid4)
    }
}

impl FromStr for BlendKind {
    type Err = MfaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlendKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| {
                MfaError::ConfigError(format!(
                    "unknown blending function '{s}', expected one of {:?}",
                    BlendKind::ALL.map(|k| k.name())
                ))
            })
    }
}

fn logistic(x: f64, k: f64) -> f64 {
    1.0 / (1.0 + (k - 2.0 * k * x).exp())
}

fn rescaled_logistic(x: f64, k: f64) -> f64 {
    let lo = logistic(0.0, k);
    let hi = logistic(1.0, k);
    (logistic(x, k) - lo) / (hi - lo)
}

fn hermite(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    3.0 * x * x - 2.0 * x.powi(3)
}

fn quintic(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    6.0 * x.powi(5) - 15.0 * x.powi(4) + 10.0 * x.powi(3)
}

/// Kernel value at the normalised position `x`.
pub fn blending_factor(x: f64, kind: BlendKind) -> f64 {
    match kind {
        BlendKind::Linear => x.clamp(0.0, 1.0),
        BlendKind::Sigmoid3 => logistic(x, 3.0),
        BlendKind::Sigmoid4 => logistic(x, 4.0),
        BlendKind::ExtrapolSigmoid3 => rescaled_logistic(x, 3.0),
        BlendKind::ExtrapolSigmoid4 => rescaled_logistic(x, 4.0),
        BlendKind::ClampedSigmoid3 => rescaled_logistic(x.clamp(0.0, 1.0), 3.0),
        BlendKind::ClampedSigmoid4 => rescaled_logistic(x.clamp(0.0, 1.0), 4.0),
        BlendKind::Hermite => hermite(x),
        BlendKind::Quintic => quintic(x),
        BlendKind::PolyMix => 0.5 * hermite(x) + 0.5 * quintic(x),
        BlendKind::ConvergeQuadratic => {
            let x = x.clamp(0.0, 1.0);
            1.0 - (1.0 - x).powi(2)
        }
    }
}

/// `α·y_upper + (1 − α)·y_lower` with `α = kernel((x − x_lower) / (x_upper − x_lower))`.
///
/// All operands are cast to `target_dims` first.
pub fn blend(
    target_dims: &DimensionSet,
    y_lower: &NamedDimArray,
    y_upper: &NamedDimArray,
    x: &NamedDimArray,
    x_lower: &NamedDimArray,
    x_upper: &NamedDimArray,
    kind: BlendKind,
) -> MfaResult<NamedDimArray> {
    let x = x.cast_to(target_dims)?;
    let y_lower = y_lower.cast_to(target_dims)?;
    let y_upper = y_upper.cast_to(target_dims)?;
    let x_lower = x_lower.cast_to(target_dims)?;
    let x_upper = x_upper.cast_to(target_dims)?;

    let span = x_upper.sub(&x_lower)?;
    let alpha = x.sub(&x_lower)?.div(&span)?.apply(|v| blending_factor(v, kind));
    alpha.mul(&y_upper)?.add(&alpha.complement().mul(&y_lower)?)
}

/// [`blend`] with `x` bound to the years of the time dimension `time_letter`.
pub fn blend_over_time(
    target_dims: &DimensionSet,
    y_lower: &NamedDimArray,
    y_upper: &NamedDimArray,
    time_letter: char,
    x_lower: f64,
    x_upper: f64,
    kind: BlendKind,
) -> MfaResult<NamedDimArray> {
    let time_dims = target_dims.select(&[time_letter])?;
    let years = time_dims.get(time_letter)?.values_f64()?;
    let x = NamedDimArray::from_vec(&time_dims, years)?;
    blend(
        target_dims,
        y_lower,
        y_upper,
        &x,
        &NamedDimArray::scalar(x_lower),
        &NamedDimArray::scalar(x_upper),
        kind,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfa_types::dims::Dimension;

    #[test]
    fn test_endpoints_of_unit_kernels() {
        for kind in BlendKind::ALL.iter().filter(|k| k.maps_unit_interval()) {
            let f0 = blending_factor(0.0, *kind);
            let f1 = blending_factor(1.0, *kind);
            assert!(f0.abs() < 1e-12, "{}: f(0) = {f0}", kind.name());
            assert!((f1 - 1.0).abs() < 1e-12, "{}: f(1) = {f1}", kind.name());
        }
    }

    #[test]
    fn test_raw_sigmoid_midpoint() {
        assert!((blending_factor(0.5, BlendKind::Sigmoid3) - 0.5).abs() < 1e-12);
        assert!(blending_factor(0.0, BlendKind::Sigmoid4) > 0.0);
    }

    #[test]
    fn test_clamped_kernels_saturate() {
        assert_eq!(blending_factor(2.0, BlendKind::Hermite), 1.0);
        assert_eq!(blending_factor(-1.0, BlendKind::Linear), 0.0);
        assert!(blending_factor(1.5, BlendKind::ExtrapolSigmoid3) > 1.0);
        assert!((blending_factor(1.5, BlendKind::ClampedSigmoid3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("poly_mix".parse::<BlendKind>().unwrap(), BlendKind::PolyMix);
        assert!(matches!(
            "cubic".parse::<BlendKind>(),
            Err(MfaError::ConfigError(_))
        ));
    }

    #[test]
    fn test_hermite_blend_midpoint() {
        let dims = DimensionSet::new(vec![Dimension::from_strs('x', "Point", &["lo", "mid", "hi"])
            .unwrap()])
        .unwrap();
        let x = NamedDimArray::from_vec(&dims, vec![10.0, 15.0, 20.0]).unwrap();
        let out = blend(
            &dims,
            &NamedDimArray::scalar(3.0),
            &NamedDimArray::scalar(5.0),
            &x,
            &NamedDimArray::scalar(10.0),
            &NamedDimArray::scalar(20.0),
            BlendKind::Hermite,
        )
        .unwrap();
        let v = out.values().as_slice().unwrap();
        assert!((v[0] - 3.0).abs() < 1e-12);
        assert!((v[1] - 4.0).abs() < 1e-12);
        assert!((v[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_blend_over_time_ramps() {
        let dims = DimensionSet::new(vec![Dimension::years('t', "Time", 2000, 2010).unwrap()])
            .unwrap();
        let out = blend_over_time(
            &dims,
            &NamedDimArray::scalar(0.0),
            &NamedDimArray::scalar(1.0),
            't',
            2000.0,
            2010.0,
            BlendKind::Linear,
        )
        .unwrap();
        assert!((out.values()[[5]] - 0.5).abs() < 1e-12);
        assert_eq!(out.values()[[10]], 1.0);
    }
}
