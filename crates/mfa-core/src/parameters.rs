// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Parameter Extension
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Lift historic-time parameters onto the full time axis.

use mfa_math::NamedDimArray;
use mfa_types::dims::Dimension;
use mfa_types::error::{MfaError, MfaResult};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureFill {
    /// Repeat the last historic value.
    Constant,
    Zero,
}

/// `param` with its historic time letter replaced by `time`; observations
/// are kept and later years filled per `fill`.
pub fn extend_to_future(
    param: &NamedDimArray,
    time: &Dimension,
    fill: FutureFill,
) -> MfaResult<NamedDimArray> {
    let hist_letter = param.dims().time_letter().ok_or_else(|| {
        MfaError::DimensionMismatch(format!("{:?} has no time dimension", param.letters()))
    })?;
    if hist_letter == time.letter {
        return Err(MfaError::DimensionMismatch(format!(
            "parameter is already typed by '{}'",
            time.letter
        )));
    }
    let hist_dim = param.dims().get(hist_letter)?;
    let dims = param.dims().replace(hist_letter, Arc::new(time.clone()))?;
    let mut out = NamedDimArray::zeros(&dims);
    if fill == FutureFill::Constant {
        let last = hist_dim
            .items()
            .last()
            .cloned()
            .ok_or_else(|| MfaError::DimensionMismatch("empty historic time dimension".into()))?;
        out.assign(&param.slice_item(hist_letter, last)?)?;
    }
    out.assign_subdim(time.letter, hist_dim, param)?;
    Ok(out)
}

pub fn extend_constant(param: &NamedDimArray, time: &Dimension) -> MfaResult<NamedDimArray> {
    extend_to_future(param, time, FutureFill::Constant)
}

pub fn extend_zero(param: &NamedDimArray, time: &Dimension) -> MfaResult<NamedDimArray> {
    extend_to_future(param, time, FutureFill::Zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfa_types::dims::{DimensionSet, Item};

    #[test]
    fn test_constant_and_zero_extension() {
        let h = Dimension::years('h', "Historic Time", 2000, 2002).unwrap();
        let t = Dimension::years('t', "Time", 2000, 2005).unwrap();
        let r = Dimension::from_strs('r', "Region", &["EUR"]).unwrap();
        let dims = DimensionSet::new(vec![r, h]).unwrap();
        let p = NamedDimArray::from_vec(&dims, vec![1.0, 2.0, 3.0]).unwrap();

        let c = extend_constant(&p, &t).unwrap();
        assert_eq!(c.letters(), vec!['r', 't']);
        assert_eq!(c.values().iter().cloned().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 3.0, 3.0, 3.0]);

        let z = extend_zero(&p, &t).unwrap();
        let at_2004 = z.slice(&[('t', Item::from(2004)), ('r', Item::from("EUR"))]).unwrap();
        assert_eq!(at_2004.as_scalar(), Some(0.0));
        assert_eq!(z.sum(), 6.0);
    }
}
