// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Stocks
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Stocks attached to a process: level, inflow and outflow over shared dims.

use crate::dsm::{self, DsmLane};
use crate::lifetime::{survival_table, LifetimeModel};
use crate::process::{find_process, Process};
use mfa_math::NamedDimArray;
use mfa_types::dims::{DimensionSet, Item};
use mfa_types::error::{MfaError, MfaResult};
use ndarray::{ArrayD, Axis};
use tracing::{debug, warn};

/// How the three arrays of a stock are related.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockKind {
    /// `level = cumsum(inflow − outflow)`.
    SimpleFlowDriven,
    /// Outflow and level from inflow and a lifetime.
    InflowDriven,
    /// Inflow and outflow from level and a lifetime.
    StockDriven { correct_negative_inflow: bool },
    /// Age an initial cohort structure forward without new inflow.
    FromInitial,
}

impl StockKind {
    pub fn needs_lifetime(&self) -> bool {
        !matches!(self, StockKind::SimpleFlowDriven)
    }
}

#[derive(Debug, Clone)]
pub struct StockDefinition {
    pub name: String,
    pub process: String,
    pub letters: Vec<char>,
    pub kind: StockKind,
}

impl StockDefinition {
    pub fn new(name: &str, process: &str, letters: &[char], kind: StockKind) -> Self {
        Self {
            name: name.to_string(),
            process: process.to_string(),
            letters: letters.to_vec(),
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stock {
    pub name: String,
    pub process: Process,
    pub kind: StockKind,
    time_letter: char,
    stock: NamedDimArray,
    inflow: NamedDimArray,
    outflow: NamedDimArray,
    lifetime: Option<LifetimeModel>,
    initial: Option<(NamedDimArray, usize)>,
    cohorts: Vec<DsmLane>,
}

impl Stock {
    pub fn from_definition(
        def: &StockDefinition,
        processes: &[Process],
        dims: &DimensionSet,
    ) -> MfaResult<Self> {
        let process = find_process(processes, &def.process)?.clone();
        let stock_dims = dims.select(&def.letters)?;
        let time_letter = stock_dims.time_letter().ok_or_else(|| {
            MfaError::DimensionMismatch(format!(
                "stock '{}' has no time dimension in {:?}",
                def.name, def.letters
            ))
        })?;
        Ok(Self {
            name: def.name.clone(),
            process,
            kind: def.kind,
            time_letter,
            stock: NamedDimArray::zeros(&stock_dims),
            inflow: NamedDimArray::zeros(&stock_dims),
            outflow: NamedDimArray::zeros(&stock_dims),
            lifetime: None,
            initial: None,
            cohorts: Vec::new(),
        })
    }

    pub fn dims(&self) -> &DimensionSet {
        self.stock.dims()
    }

    pub fn time_letter(&self) -> char {
        self.time_letter
    }

    pub fn stock(&self) -> &NamedDimArray {
        &self.stock
    }

    pub fn inflow(&self) -> &NamedDimArray {
        &self.inflow
    }

    pub fn outflow(&self) -> &NamedDimArray {
        &self.outflow
    }

    pub fn lifetime(&self) -> Option<&LifetimeModel> {
        self.lifetime.as_ref()
    }

    /// Cohort tables of the last lifetime-driven `compute`, one per lane
    /// along the time axis in the row-major order of the stock's other dims.
    /// Empty for flow-driven stocks.
    pub fn cohorts(&self) -> &[DsmLane] {
        &self.cohorts
    }

    pub fn set_stock(&mut self, value: &NamedDimArray) -> MfaResult<()> {
        self.stock.assign_sum_to(value)
    }

    pub fn set_inflow(&mut self, value: &NamedDimArray) -> MfaResult<()> {
        self.inflow.assign_sum_to(value)
    }

    pub fn set_outflow(&mut self, value: &NamedDimArray) -> MfaResult<()> {
        self.outflow.assign_sum_to(value)
    }

    /// Attach a lifetime; its arrays must broadcast to the stock's dims.
    pub fn set_lifetime(&mut self, lifetime: LifetimeModel) -> MfaResult<()> {
        if !self.kind.needs_lifetime() {
            return Err(MfaError::ConfigError(format!(
                "stock '{}' is flow-driven and takes no lifetime",
                self.name
            )));
        }
        lifetime.aligned(self.stock.dims())?;
        self.lifetime = Some(lifetime);
        Ok(())
    }

    /// Cohort structure in year `start`: the time axis of `by_cohort` indexes
    /// the cohort's entry year.
    pub fn set_initial_stock(&mut self, by_cohort: &NamedDimArray, start: Item) -> MfaResult<()> {
        let start_idx = self.stock.dims().get(self.time_letter)?.index_of(&start)?;
        let mut initial = NamedDimArray::zeros(self.stock.dims());
        initial.assign_sum_to(by_cohort)?;
        self.initial = Some((initial, start_idx));
        Ok(())
    }

    /// Level change per year, the first year against an empty stock.
    pub fn stock_change(&self) -> MfaResult<NamedDimArray> {
        let ax = Axis(self.stock.dims().index(self.time_letter)?);
        let level = self.stock.values();
        let mut change = level.clone();
        let n = level.len_of(ax);
        for t in 1..n {
            let prev = level.index_axis(ax, t - 1);
            let mut row = change.index_axis_mut(ax, t);
            row -= &prev;
        }
        NamedDimArray::from_values(self.stock.dims().clone(), change)
    }

    /// Fill the arrays this stock's kind derives from the ones already set.
    pub fn compute(&mut self) -> MfaResult<()> {
        match self.kind {
            StockKind::SimpleFlowDriven => {
                self.stock = self.inflow.sub(&self.outflow)?.cumsum(self.time_letter)?;
                Ok(())
            }
            StockKind::InflowDriven => {
                let lanes = self.solve_lanes(self.inflow.values(), |lane, sf| {
                    dsm::inflow_driven(lane, sf)
                })?;
                self.write_lanes(lanes, false)
            }
            StockKind::StockDriven {
                correct_negative_inflow,
            } => {
                let lanes = self.solve_lanes(self.stock.values(), |lane, sf| {
                    dsm::stock_driven(lane, sf, correct_negative_inflow)
                })?;
                let corrected: usize = lanes.iter().map(|l| l.corrected_years).sum();
                if corrected > 0 {
                    warn!(
                        stock = %self.name,
                        corrected,
                        "negative inflow corrected by scrubbing existing cohorts"
                    );
                }
                self.write_lanes(lanes, true)
            }
            StockKind::FromInitial => {
                let (initial, start) = self.initial.clone().ok_or_else(|| {
                    MfaError::InvalidState(format!(
                        "stock '{}' has no initial cohort structure",
                        self.name
                    ))
                })?;
                let lanes = self.solve_lanes(initial.values(), |lane, sf| {
                    dsm::from_initial(lane, start, sf)
                })?;
                self.write_lanes(lanes, true)
            }
        }
    }

    fn solve_lanes(
        &self,
        driver: &ArrayD<f64>,
        solve: impl Fn(ndarray::ArrayView1<f64>, &ndarray::Array2<f64>) -> MfaResult<DsmLane>,
    ) -> MfaResult<Vec<DsmLane>> {
        let lifetime = self.lifetime.as_ref().ok_or_else(|| {
            MfaError::InvalidState(format!("stock '{}' has no lifetime model", self.name))
        })?;
        let dims = self.stock.dims();
        let ax = Axis(dims.index(self.time_letter)?);
        let (mean, std) = lifetime.aligned(dims)?;

        let mut key: Option<(Vec<f64>, Vec<f64>)> = None;
        let mut sf = ndarray::Array2::zeros((0, 0));
        let mut lanes = Vec::new();
        for ((lane, m), s) in driver
            .lanes(ax)
            .into_iter()
            .zip(mean.lanes(ax))
            .zip(std.lanes(ax))
        {
            let params = (m.to_vec(), s.to_vec());
            if key.as_ref() != Some(&params) {
                sf = survival_table(lifetime.kind, &params.0, &params.1)?;
                key = Some(params);
            }
            lanes.push(solve(lane, &sf)?);
        }
        debug!(stock = %self.name, lanes = lanes.len(), "dynamic stock model solved");
        Ok(lanes)
    }

    fn write_lanes(&mut self, lanes: Vec<DsmLane>, with_inflow: bool) -> MfaResult<()> {
        let ax = Axis(self.stock.dims().index(self.time_letter)?);
        let targets = self
            .stock
            .values_mut()
            .lanes_mut(ax)
            .into_iter()
            .zip(&lanes);
        for (mut dst, lane) in targets {
            dst.assign(&lane.stock);
        }
        for (mut dst, lane) in self.outflow.values_mut().lanes_mut(ax).into_iter().zip(&lanes) {
            dst.assign(&lane.outflow);
        }
        if with_inflow {
            for (mut dst, lane) in self.inflow.values_mut().lanes_mut(ax).into_iter().zip(&lanes) {
                dst.assign(&lane.inflow);
            }
        }
        self.cohorts = lanes;
        Ok(())
    }
}

pub fn find_stock<'a>(stocks: &'a [Stock], name: &str) -> MfaResult<&'a Stock> {
    stocks
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| MfaError::ConfigError(format!("unknown stock '{name}'")))
}
