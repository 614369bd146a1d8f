// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Named-Dimension Arrays
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Dense tensors that know their axes by dimension letter.
//!
//! Every operation refers to axes by letter. Binary operations broadcast
//! both operands to the union of their dimension sets (order of first
//! appearance, left operand first); contractions and casts are resolved
//! through [`DimensionSet::index`].

use mfa_types::dims::{Dimension, DimensionSet, Item};
use mfa_types::error::{MfaError, MfaResult};
use ndarray::Dimension as _;
use ndarray::{ArrayD, Axis, IxDyn, Zip};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct NamedDimArray {
    dims: DimensionSet,
    values: ArrayD<f64>,
}

/// `a / b` with every division by zero mapped to 0.
#[inline]
pub fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}

/// Sign with `sign(0) = 0`.
#[inline]
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl NamedDimArray {
    pub fn zeros(dims: &DimensionSet) -> Self {
        Self {
            values: ArrayD::zeros(IxDyn(&dims.shape())),
            dims: dims.clone(),
        }
    }

    pub fn full(dims: &DimensionSet, value: f64) -> Self {
        Self {
            values: ArrayD::from_elem(IxDyn(&dims.shape()), value),
            dims: dims.clone(),
        }
    }

    /// 0-dimensional array wrapping a scalar.
    pub fn scalar(value: f64) -> Self {
        Self {
            dims: DimensionSet::empty(),
            values: ArrayD::from_elem(IxDyn(&[]), value),
        }
    }

    pub fn from_values(dims: DimensionSet, values: ArrayD<f64>) -> MfaResult<Self> {
        if values.ndim() != dims.len() {
            return Err(MfaError::DimensionMismatch(format!(
                "{} value axes for dimensions {:?}",
                values.ndim(),
                dims.letters()
            )));
        }
        for (d, &n) in dims.iter().zip(values.shape()) {
            if d.len() != n {
                return Err(MfaError::ShapeMismatch {
                    letter: d.letter,
                    message: format!("'{}' has {} items, values have {n}", d.name, d.len()),
                });
            }
        }
        Ok(Self { dims, values })
    }

    /// Row-major values.
    pub fn from_vec(dims: &DimensionSet, values: Vec<f64>) -> MfaResult<Self> {
        let shape = dims.shape();
        let arr = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| {
            MfaError::DimensionMismatch(format!("values for {:?}: {e}", dims.letters()))
        })?;
        Ok(Self {
            dims: dims.clone(),
            values: arr,
        })
    }

    /// Build from a function of the multi-index.
    pub fn from_fn(dims: &DimensionSet, f: impl Fn(&[usize]) -> f64) -> Self {
        let values = ArrayD::from_shape_fn(IxDyn(&dims.shape()), |idx| f(idx.slice()));
        Self {
            dims: dims.clone(),
            values,
        }
    }

    pub fn dims(&self) -> &DimensionSet {
        &self.dims
    }

    pub fn letters(&self) -> Vec<char> {
        self.dims.letters()
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.values
    }

    pub fn into_values(self) -> ArrayD<f64> {
        self.values
    }

    /// Value of a 0-dimensional array.
    pub fn as_scalar(&self) -> Option<f64> {
        if self.dims.is_empty() {
            self.values.iter().next().copied()
        } else {
            None
        }
    }

    pub fn sum(&self) -> f64 {
        self.values.sum()
    }

    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    pub fn min_value(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    // ── Alignment ────────────────────────────────────────────────────

    /// Values broadcast and transposed into the layout of `target`.
    ///
    /// Every letter of `self` must be present in `target` with the same items.
    pub fn align_to(&self, target: &DimensionSet) -> MfaResult<ArrayD<f64>> {
        for d in self.dims.iter() {
            if !target.contains(d.letter) {
                return Err(MfaError::DimensionMismatch(format!(
                    "cannot cast {:?} to {:?}: '{}' is absent from the target",
                    self.dims.letters(),
                    target.letters(),
                    d.letter
                )));
            }
        }
        target.check_compatible(&self.dims)?;

        let order: Vec<usize> = target
            .iter()
            .filter_map(|d| self.dims.index(d.letter).ok())
            .collect();
        let mut view = self.values.view().permuted_axes(order);
        for (ax, d) in target.iter().enumerate() {
            if !self.dims.contains(d.letter) {
                view.insert_axis_inplace(Axis(ax));
            }
        }
        let shape = target.shape();
        let broadcast = view.broadcast(IxDyn(&shape)).ok_or_else(|| {
            MfaError::DimensionMismatch(format!(
                "cannot broadcast {:?} to {:?}",
                self.dims.letters(),
                target.letters()
            ))
        })?;
        Ok(broadcast.to_owned())
    }

    /// Replicate along every target dimension absent from `self`.
    pub fn cast_to(&self, target: &DimensionSet) -> MfaResult<Self> {
        Ok(Self {
            values: self.align_to(target)?,
            dims: target.clone(),
        })
    }

    /// Same data with axes reordered to `letters`.
    pub fn transposed(&self, letters: &[char]) -> MfaResult<Self> {
        let target = self.dims.select(letters)?;
        if target.len() != self.dims.len() {
            return Err(MfaError::DimensionMismatch(format!(
                "transpose to {letters:?} does not name all of {:?}",
                self.dims.letters()
            )));
        }
        self.cast_to(&target)
    }

    // ── Arithmetic ───────────────────────────────────────────────────

    /// Elementwise `f` over the union of both dimension sets.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> MfaResult<Self> {
        let dims = self.dims.union(&other.dims)?;
        let a = self.align_to(&dims)?;
        let b = other.align_to(&dims)?;
        let values = Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y));
        Ok(Self { dims, values })
    }

    pub fn add(&self, other: &Self) -> MfaResult<Self> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Self) -> MfaResult<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Self) -> MfaResult<Self> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Division with `x / 0 = 0`.
    pub fn div(&self, other: &Self) -> MfaResult<Self> {
        self.zip_with(other, safe_div)
    }

    pub fn maximum(&self, other: &Self) -> MfaResult<Self> {
        self.zip_with(other, f64::max)
    }

    pub fn minimum(&self, other: &Self) -> MfaResult<Self> {
        self.zip_with(other, f64::min)
    }

    pub fn apply(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            dims: self.dims.clone(),
            values: self.values.mapv(f),
        }
    }

    pub fn abs(&self) -> Self {
        self.apply(f64::abs)
    }

    pub fn sign(&self) -> Self {
        self.apply(sign)
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.apply(|v| v * factor)
    }

    pub fn add_scalar(&self, offset: f64) -> Self {
        self.apply(|v| v + offset)
    }

    /// `1 − self`.
    pub fn complement(&self) -> Self {
        self.apply(|v| 1.0 - v)
    }

    pub fn clip_min(&self, floor: f64) -> Self {
        self.apply(|v| v.max(floor))
    }

    // ── Contraction ──────────────────────────────────────────────────

    /// Sum out the named axes.
    pub fn sum_over(&self, letters: &[char]) -> MfaResult<Self> {
        let mut axes = letters
            .iter()
            .map(|&l| self.dims.index(l))
            .collect::<MfaResult<Vec<_>>>()?;
        axes.sort_unstable();
        axes.dedup();
        let mut values = self.values.clone();
        for &ax in axes.iter().rev() {
            values = values.sum_axis(Axis(ax));
        }
        Ok(Self {
            dims: self.dims.drop(letters),
            values,
        })
    }

    /// Keep only the named axes, in the requested order.
    pub fn sum_to(&self, letters: &[char]) -> MfaResult<Self> {
        self.dims.select(letters)?;
        let dropped: Vec<char> = self
            .dims
            .letters()
            .into_iter()
            .filter(|l| !letters.contains(l))
            .collect();
        self.sum_over(&dropped)?.transposed(letters)
    }

    /// Sum over every axis, as a 0-dimensional array.
    pub fn sum_all(&self) -> Self {
        Self::scalar(self.values.sum())
    }

    /// `self / self.sum_over(letters)` with 0/0 mapped to 0.
    pub fn get_shares_over(&self, letters: &[char]) -> MfaResult<Self> {
        self.div(&self.sum_over(letters)?)
    }

    /// Running sum along one axis.
    pub fn cumsum(&self, letter: char) -> MfaResult<Self> {
        let ax = self.dims.index(letter)?;
        let mut values = self.values.clone();
        values.accumulate_axis_inplace(Axis(ax), |&prev, curr| *curr += prev);
        Ok(Self {
            dims: self.dims.clone(),
            values,
        })
    }

    // ── Slicing ──────────────────────────────────────────────────────

    fn picks(&self, selectors: &[(char, Item)]) -> MfaResult<Vec<(usize, usize)>> {
        let mut picks = selectors
            .iter()
            .map(|(letter, item)| {
                let dim = self.dims.get(*letter)?;
                Ok((self.dims.index(*letter)?, dim.index_of(item)?))
            })
            .collect::<MfaResult<Vec<_>>>()?;
        picks.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        if picks.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(MfaError::DimensionMismatch(format!(
                "letter selected twice in slice of {:?}",
                self.dims.letters()
            )));
        }
        Ok(picks)
    }

    /// Sub-tensor at the given items; the sliced letters are removed.
    pub fn slice(&self, selectors: &[(char, Item)]) -> MfaResult<Self> {
        let picks = self.picks(selectors)?;
        let mut view = self.values.view();
        for &(ax, idx) in &picks {
            view = view.index_axis_move(Axis(ax), idx);
        }
        let letters: Vec<char> = selectors.iter().map(|(l, _)| *l).collect();
        Ok(Self {
            dims: self.dims.drop(&letters),
            values: view.to_owned(),
        })
    }

    pub fn slice_item(&self, letter: char, item: impl Into<Item>) -> MfaResult<Self> {
        self.slice(&[(letter, item.into())])
    }

    /// Restrict axis `letter` to the items of `sub`, which takes its place.
    pub fn slice_subdim(&self, letter: char, sub: &Dimension) -> MfaResult<Self> {
        let ax = self.dims.index(letter)?;
        let idx = sub.indices_in(self.dims.get(letter)?)?;
        Ok(Self {
            dims: self.dims.replace(letter, Arc::new(sub.clone()))?,
            values: self.values.select(Axis(ax), &idx),
        })
    }

    // ── Assignment ───────────────────────────────────────────────────

    /// Broadcast `other` into this array's layout and overwrite.
    pub fn assign(&mut self, other: &Self) -> MfaResult<()> {
        self.values = other.align_to(&self.dims)?;
        Ok(())
    }

    /// Like [`assign`](Self::assign), summing out letters absent here first.
    pub fn assign_sum_to(&mut self, other: &Self) -> MfaResult<()> {
        let extra: Vec<char> = other
            .letters()
            .into_iter()
            .filter(|l| !self.dims.contains(*l))
            .collect();
        if extra.is_empty() {
            self.assign(other)
        } else {
            self.assign(&other.sum_over(&extra)?)
        }
    }

    /// Overwrite the sub-tensor at the given items.
    pub fn assign_slice(&mut self, selectors: &[(char, Item)], other: &Self) -> MfaResult<()> {
        let picks = self.picks(selectors)?;
        let letters: Vec<char> = selectors.iter().map(|(l, _)| *l).collect();
        let src = other.align_to(&self.dims.drop(&letters))?;
        let mut view = self.values.view_mut();
        for &(ax, idx) in &picks {
            view = view.index_axis_move(Axis(ax), idx);
        }
        view.assign(&src);
        Ok(())
    }

    /// Overwrite the positions of `sub` along axis `letter`.
    ///
    /// `other` is typed with `sub` (by its own letter) in place of `letter`.
    pub fn assign_subdim(&mut self, letter: char, sub: &Dimension, other: &Self) -> MfaResult<()> {
        let ax = self.dims.index(letter)?;
        let idx = sub.indices_in(self.dims.get(letter)?)?;
        let sub_dims = self.dims.replace(letter, Arc::new(sub.clone()))?;
        let src = other.align_to(&sub_dims)?;
        for (k, &i) in idx.iter().enumerate() {
            self.values
                .index_axis_mut(Axis(ax), i)
                .assign(&src.index_axis(Axis(ax), k));
        }
        Ok(())
    }
}
