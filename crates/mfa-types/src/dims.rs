// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Dimensions
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Lettered dimensions and ordered dimension sets.
//!
//! A [`Dimension`] is a finite, ordered axis (years, regions, goods, ...).
//! A [`DimensionSet`] is an ordered tuple of dimensions with unique letters;
//! its order defines the storage axis order of every array typed by it.

use crate::error::{MfaError, MfaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Letter of the future (full) time dimension.
pub const TIME: char = 't';
/// Letter of the historic time dimension.
pub const HISTORIC_TIME: char = 'h';
/// Letter of the region dimension.
pub const REGION: char = 'r';
/// Letter of the chemical element dimension.
pub const ELEMENT: char = 'e';

/// A single dimension item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Item {
    Int(i64),
    Str(String),
}

impl Item {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Item::Int(v) => Some(*v as f64),
            Item::Str(_) => None,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Int(v) => write!(f, "{v}"),
            Item::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Item::Str(value.to_string())
    }
}

impl From<String> for Item {
    fn from(value: String) -> Self {
        Item::Str(value)
    }
}

impl From<i64> for Item {
    fn from(value: i64) -> Self {
        Item::Int(value)
    }
}

impl From<i32> for Item {
    fn from(value: i32) -> Self {
        Item::Int(value as i64)
    }
}

/// Item type of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimType {
    #[default]
    Str,
    Int,
}

impl DimType {
    /// Parse a raw text cell into an item of this type.
    pub fn parse(&self, raw: &str) -> Option<Item> {
        let raw = raw.trim();
        match self {
            DimType::Int => raw.parse::<i64>().ok().map(Item::Int),
            DimType::Str => {
                if raw.is_empty() {
                    None
                } else {
                    Some(Item::Str(raw.to_string()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub letter: char,
    pub name: String,
    pub dtype: DimType,
    items: Vec<Item>,
}

impl Dimension {
    /// Build a dimension, inferring the dtype from the items.
    pub fn new(letter: char, name: &str, items: Vec<Item>) -> MfaResult<Self> {
        let dtype = match items.first() {
            Some(Item::Int(_)) | None => DimType::Int,
            Some(Item::Str(_)) => DimType::Str,
        };
        Self::with_dtype(letter, name, dtype, items)
    }

    pub fn with_dtype(
        letter: char,
        name: &str,
        dtype: DimType,
        items: Vec<Item>,
    ) -> MfaResult<Self> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            let matches = matches!(
                (dtype, item),
                (DimType::Int, Item::Int(_)) | (DimType::Str, Item::Str(_))
            );
            if !matches {
                return Err(MfaError::ConfigError(format!(
                    "dimension '{name}' ({letter}) mixes item types: {item} is not {dtype:?}"
                )));
            }
            if !seen.insert(item) {
                return Err(MfaError::ConfigError(format!(
                    "dimension '{name}' ({letter}) has duplicate item {item}"
                )));
            }
        }
        Ok(Self {
            letter,
            name: name.to_string(),
            dtype,
            items,
        })
    }

    pub fn from_strs(letter: char, name: &str, items: &[&str]) -> MfaResult<Self> {
        Self::with_dtype(
            letter,
            name,
            DimType::Str,
            items.iter().map(|s| Item::from(*s)).collect(),
        )
    }

    /// Consecutive years `start..=end`.
    pub fn years(letter: char, name: &str, start: i64, end: i64) -> MfaResult<Self> {
        if end < start {
            return Err(MfaError::ConfigError(format!(
                "year range {start}..={end} of '{name}' is empty"
            )));
        }
        Self::with_dtype(letter, name, DimType::Int, (start..=end).map(Item::Int).collect())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, item: &Item) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    pub fn index_of(&self, item: &Item) -> MfaResult<usize> {
        self.position(item).ok_or_else(|| MfaError::UnknownItem {
            letter: self.letter,
            item: item.to_string(),
        })
    }

    /// Numeric item values; only defined for integer dimensions.
    pub fn values_f64(&self) -> MfaResult<Vec<f64>> {
        self.items
            .iter()
            .map(|item| {
                item.as_f64().ok_or_else(|| {
                    MfaError::ConfigError(format!(
                        "dimension '{}' ({}) is not numeric",
                        self.name, self.letter
                    ))
                })
            })
            .collect()
    }

    /// Position of each of `self`'s items within `parent`.
    pub fn indices_in(&self, parent: &Dimension) -> MfaResult<Vec<usize>> {
        self.items
            .iter()
            .map(|item| {
                parent.position(item).ok_or_else(|| MfaError::UnknownItem {
                    letter: parent.letter,
                    item: item.to_string(),
                })
            })
            .collect()
    }

    pub fn is_subset_of(&self, parent: &Dimension) -> bool {
        self.items.iter().all(|i| parent.position(i).is_some())
    }

    pub fn same_items(&self, other: &Dimension) -> bool {
        self.items == other.items
    }
}

/// Ordered set of dimensions with unique letters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DimensionSet {
    dims: Vec<Arc<Dimension>>,
}

impl DimensionSet {
    pub fn new(dims: Vec<Dimension>) -> MfaResult<Self> {
        Self::from_shared(dims.into_iter().map(Arc::new).collect())
    }

    pub fn from_shared(dims: Vec<Arc<Dimension>>) -> MfaResult<Self> {
        let mut letters = HashSet::with_capacity(dims.len());
        for d in &dims {
            if !letters.insert(d.letter) {
                return Err(MfaError::DuplicateDimension(d.letter));
            }
        }
        Ok(Self { dims })
    }

    pub fn empty() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dimension> {
        self.dims.iter().map(|d| d.as_ref())
    }

    pub fn shared(&self) -> &[Arc<Dimension>] {
        &self.dims
    }

    pub fn letters(&self) -> Vec<char> {
        self.dims.iter().map(|d| d.letter).collect()
    }

    pub fn contains(&self, letter: char) -> bool {
        self.dims.iter().any(|d| d.letter == letter)
    }

    pub fn index(&self, letter: char) -> MfaResult<usize> {
        self.dims
            .iter()
            .position(|d| d.letter == letter)
            .ok_or_else(|| {
                MfaError::DimensionMismatch(format!(
                    "letter '{letter}' not in dimensions {:?}",
                    self.letters()
                ))
            })
    }

    pub fn get(&self, letter: char) -> MfaResult<&Dimension> {
        Ok(self.dims[self.index(letter)?].as_ref())
    }

    pub fn get_shared(&self, letter: char) -> MfaResult<Arc<Dimension>> {
        Ok(Arc::clone(&self.dims[self.index(letter)?]))
    }

    /// Look a dimension up by its letter or by its name.
    pub fn lookup(&self, key: &str) -> MfaResult<&Dimension> {
        let mut chars = key.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Ok(d) = self.get(c) {
                return Ok(d);
            }
        }
        self.iter().find(|d| d.name == key).ok_or_else(|| {
            MfaError::DimensionMismatch(format!("no dimension named '{key}'"))
        })
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.len()).collect()
    }

    pub fn shape_of(&self, letters: &[char]) -> MfaResult<Vec<usize>> {
        letters.iter().map(|&l| Ok(self.get(l)?.len())).collect()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.dims.iter().map(|d| d.len()).product()
    }

    /// Dimensions named by `letters`, in this set's order.
    pub fn subset(&self, letters: &[char]) -> MfaResult<Self> {
        for &l in letters {
            self.index(l)?;
        }
        Ok(Self {
            dims: self
                .dims
                .iter()
                .filter(|d| letters.contains(&d.letter))
                .cloned()
                .collect(),
        })
    }

    /// Dimensions named by `letters`, in the requested order.
    pub fn select(&self, letters: &[char]) -> MfaResult<Self> {
        let dims = letters
            .iter()
            .map(|&l| self.get_shared(l))
            .collect::<MfaResult<Vec<_>>>()?;
        Self::from_shared(dims)
    }

    /// All dimensions except those named by `letters`.
    pub fn drop(&self, letters: &[char]) -> Self {
        Self {
            dims: self
                .dims
                .iter()
                .filter(|d| !letters.contains(&d.letter))
                .cloned()
                .collect(),
        }
    }

    /// `self` followed by the dimensions of `other` not yet present.
    pub fn union(&self, other: &DimensionSet) -> MfaResult<Self> {
        self.check_compatible(other)?;
        let mut dims = self.dims.clone();
        for d in &other.dims {
            if !self.contains(d.letter) {
                dims.push(Arc::clone(d));
            }
        }
        Ok(Self { dims })
    }

    /// Dimensions present in both sets, in this set's order.
    pub fn intersect(&self, other: &DimensionSet) -> Self {
        Self {
            dims: self
                .dims
                .iter()
                .filter(|d| other.contains(d.letter))
                .cloned()
                .collect(),
        }
    }

    /// Append new dimensions at the end.
    pub fn expand_by(&self, extra: Vec<Dimension>) -> MfaResult<Self> {
        let mut dims = self.dims.clone();
        dims.extend(extra.into_iter().map(Arc::new));
        Self::from_shared(dims)
    }

    /// Swap the dimension `letter` for `replacement`, keeping its position.
    pub fn replace(&self, letter: char, replacement: Arc<Dimension>) -> MfaResult<Self> {
        let idx = self.index(letter)?;
        let mut dims = self.dims.clone();
        dims[idx] = replacement;
        Self::from_shared(dims)
    }

    /// Fail with `ShapeMismatch` if a shared letter carries different items.
    pub fn check_compatible(&self, other: &DimensionSet) -> MfaResult<()> {
        for d in &other.dims {
            if let Some(mine) = self.dims.iter().find(|m| m.letter == d.letter) {
                if !Arc::ptr_eq(mine, d) && !mine.same_items(d) {
                    return Err(MfaError::ShapeMismatch {
                        letter: d.letter,
                        message: format!(
                            "'{}' has {} items, '{}' has {} items or a different order",
                            mine.name,
                            mine.len(),
                            d.name,
                            d.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Same letters regardless of order.
    pub fn same_letters(&self, other: &DimensionSet) -> bool {
        self.len() == other.len() && self.dims.iter().all(|d| other.contains(d.letter))
    }

    /// `t` if present, otherwise `h`.
    pub fn time_letter(&self) -> Option<char> {
        if self.contains(TIME) {
            Some(TIME)
        } else if self.contains(HISTORIC_TIME) {
            Some(HISTORIC_TIME)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions() -> Dimension {
        Dimension::from_strs('r', "Region", &["EUR", "CHA", "USA"]).unwrap()
    }

    fn goods() -> Dimension {
        Dimension::from_strs('g', "Good", &["Construction", "Transport"]).unwrap()
    }

    #[test]
    fn test_duplicate_letters_rejected() {
        let err = DimensionSet::new(vec![regions(), regions()]).unwrap_err();
        match err {
            MfaError::DuplicateDimension(letter) => assert_eq!(letter, 'r'),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_items_rejected() {
        let err = Dimension::from_strs('r', "Region", &["EUR", "EUR"]).unwrap_err();
        assert!(matches!(err, MfaError::ConfigError(_)));
    }

    #[test]
    fn test_subset_preserves_original_order() {
        let time = Dimension::years('t', "Time", 2000, 2004).unwrap();
        let set = DimensionSet::new(vec![time, regions(), goods()]).unwrap();
        let sub = set.subset(&['g', 't']).unwrap();
        assert_eq!(sub.letters(), vec!['t', 'g']);
        let sel = set.select(&['g', 't']).unwrap();
        assert_eq!(sel.letters(), vec!['g', 't']);
    }

    #[test]
    fn test_union_order_of_first_appearance() {
        let time = Dimension::years('t', "Time", 2000, 2002).unwrap();
        let a = DimensionSet::new(vec![regions(), time.clone()]).unwrap();
        let b = DimensionSet::new(vec![goods(), time]).unwrap();
        let u = a.union(&b).unwrap();
        assert_eq!(u.letters(), vec!['r', 't', 'g']);
        assert_eq!(u.shape(), vec![3, 3, 2]);
    }

    #[test]
    fn test_union_rejects_conflicting_items() {
        let a = DimensionSet::new(vec![regions()]).unwrap();
        let other = Dimension::from_strs('r', "Region", &["EUR", "USA"]).unwrap();
        let b = DimensionSet::new(vec![other]).unwrap();
        assert!(matches!(
            a.union(&b),
            Err(MfaError::ShapeMismatch { letter: 'r', .. })
        ));
    }

    #[test]
    fn test_missing_letter_is_dimension_mismatch() {
        let set = DimensionSet::new(vec![regions()]).unwrap();
        assert!(matches!(set.index('g'), Err(MfaError::DimensionMismatch(_))));
    }

    #[test]
    fn test_lookup_by_letter_or_name() {
        let set = DimensionSet::new(vec![regions(), goods()]).unwrap();
        assert_eq!(set.lookup("g").unwrap().name, "Good");
        assert_eq!(set.lookup("Region").unwrap().letter, 'r');
        assert!(set.lookup("Material").is_err());
    }

    #[test]
    fn test_sub_dimension_indices() {
        let t = Dimension::years('t', "Time", 1990, 2010).unwrap();
        let h = Dimension::years('h', "Historic Time", 1990, 2000).unwrap();
        assert!(h.is_subset_of(&t));
        let idx = h.indices_in(&t).unwrap();
        assert_eq!(idx.first(), Some(&0));
        assert_eq!(idx.last(), Some(&10));
        assert_eq!(h.values_f64().unwrap()[3], 1993.0);
    }

    #[test]
    fn test_unknown_item() {
        let r = regions();
        match r.index_of(&Item::from("MARS")).unwrap_err() {
            MfaError::UnknownItem { letter, item } => {
                assert_eq!(letter, 'r');
                assert_eq!(item, "MARS");
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_time_letter_preference() {
        let t = Dimension::years('t', "Time", 1990, 1992).unwrap();
        let h = Dimension::years('h', "Historic Time", 1990, 1991).unwrap();
        let both = DimensionSet::new(vec![h.clone(), t]).unwrap();
        assert_eq!(both.time_letter(), Some('t'));
        let hist = DimensionSet::new(vec![h]).unwrap();
        assert_eq!(hist.time_letter(), Some('h'));
        assert_eq!(DimensionSet::empty().time_letter(), None);
    }
}
