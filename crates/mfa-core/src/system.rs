// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — MFA System
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Container of dims, parameters, flows and stocks with its lifecycle.
//!
//! ```text
//! Created ─init_dims─▶ DimsReady ─load_parameters─▶ ParamsReady
//!     ─build─▶ Empty ─compute─▶ Filled ─audit─▶ Verified | Failed
//! ```
//!
//! The material-specific work lives in a plain function pointer supplied at
//! construction; everything else is shared.

use crate::process::{flow_name, make_processes, Flow, FlowDefinition, Process};
use crate::stock::{Stock, StockDefinition};
use mfa_math::NamedDimArray;
use mfa_types::dims::{Dimension, DimensionSet, Item, ELEMENT};
use mfa_types::error::{MfaError, MfaResult};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Letter of the process axis in the mass-balance report.
pub const PROCESS_LETTER: char = 'P';

/// Entries below this are counted as negative flows.
pub const NEGATIVE_FLOW_THRESHOLD: f64 = -1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Created,
    DimsReady,
    ParamsReady,
    Empty,
    Filled,
    Verified,
    Failed,
}

pub type ComputeFn = fn(&mut MfaSystem) -> MfaResult<()>;

/// Per-process residual `in − out − Δstock`, typed `(P, time[, e])`.
#[derive(Debug, Clone)]
pub struct MassBalanceReport {
    pub residuals: NamedDimArray,
    /// `Σ|residual|` per process, ordered like the process ids.
    pub totals: Vec<f64>,
}

impl MassBalanceReport {
    pub fn max_total(&self) -> f64 {
        self.totals.iter().cloned().fold(0.0, f64::max)
    }
}

pub struct MfaSystem {
    pub name: String,
    state: SystemState,
    dims: DimensionSet,
    time_letter: char,
    processes: Vec<Process>,
    parameters: BTreeMap<String, NamedDimArray>,
    flows: Vec<Flow>,
    stocks: Vec<Stock>,
    compute_fn: ComputeFn,
}

impl std::fmt::Debug for MfaSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfaSystem")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("dims", &self.dims.letters())
            .field("flows", &self.flows.len())
            .field("stocks", &self.stocks.len())
            .finish()
    }
}

impl MfaSystem {
    pub fn new(name: &str, compute_fn: ComputeFn) -> Self {
        Self {
            name: name.to_string(),
            state: SystemState::Created,
            dims: DimensionSet::empty(),
            time_letter: 't',
            processes: Vec::new(),
            parameters: BTreeMap::new(),
            flows: Vec::new(),
            stocks: Vec::new(),
            compute_fn,
        }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    fn require(&self, expected: SystemState, action: &str) -> MfaResult<()> {
        if self.state != expected {
            return Err(MfaError::InvalidState(format!(
                "system '{}' cannot {action} in state {:?} (needs {expected:?})",
                self.name, self.state
            )));
        }
        Ok(())
    }

    fn advance(&mut self, next: SystemState) {
        info!(system = %self.name, from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    pub fn init_dims(&mut self, dims: DimensionSet, time_letter: char) -> MfaResult<()> {
        self.require(SystemState::Created, "initialise dimensions")?;
        dims.get(time_letter)?;
        self.dims = dims;
        self.time_letter = time_letter;
        self.advance(SystemState::DimsReady);
        Ok(())
    }

    /// Every parameter must be typed by letters of the system with the same items.
    pub fn load_parameters(&mut self, parameters: BTreeMap<String, NamedDimArray>) -> MfaResult<()> {
        self.require(SystemState::DimsReady, "load parameters")?;
        for (name, param) in &parameters {
            self.check_parameter(name, param)?;
        }
        debug!(system = %self.name, count = parameters.len(), "parameters loaded");
        self.parameters = parameters;
        self.advance(SystemState::ParamsReady);
        Ok(())
    }

    fn check_parameter(&self, name: &str, param: &NamedDimArray) -> MfaResult<()> {
        for d in param.dims().iter() {
            let own = self.dims.get(d.letter).map_err(|_| MfaError::ParameterLoadError {
                name: name.to_string(),
                message: format!("dimension '{}' is not part of the system", d.letter),
            })?;
            if !own.same_items(d) {
                return Err(MfaError::ParameterLoadError {
                    name: name.to_string(),
                    message: format!("items of dimension '{}' differ from the system's", d.letter),
                });
            }
        }
        Ok(())
    }

    /// Allocate zero-filled flows and stocks.
    pub fn build(
        &mut self,
        process_names: &[&str],
        flows: &[FlowDefinition],
        stocks: &[StockDefinition],
    ) -> MfaResult<()> {
        self.require(SystemState::ParamsReady, "build flows and stocks")?;
        let processes = make_processes(process_names)?;
        let mut names = HashSet::new();
        let mut built = Vec::with_capacity(flows.len());
        for def in flows {
            if !names.insert(def.name()) {
                return Err(MfaError::ConfigError(format!(
                    "flow '{}' defined twice",
                    def.name()
                )));
            }
            built.push(Flow::from_definition(def, &processes, &self.dims)?);
        }
        let mut stock_names = HashSet::new();
        let mut built_stocks = Vec::with_capacity(stocks.len());
        for def in stocks {
            if !stock_names.insert(def.name.clone()) {
                return Err(MfaError::ConfigError(format!(
                    "stock '{}' defined twice",
                    def.name
                )));
            }
            built_stocks.push(Stock::from_definition(def, &processes, &self.dims)?);
        }
        self.processes = processes;
        self.flows = built;
        self.stocks = built_stocks;
        self.advance(SystemState::Empty);
        Ok(())
    }

    /// Run the material-specific computation once.
    pub fn compute(&mut self) -> MfaResult<()> {
        self.require(SystemState::Empty, "compute")?;
        match (self.compute_fn)(self) {
            Ok(()) => {
                self.advance(SystemState::Filled);
                Ok(())
            }
            Err(e) => {
                self.advance(SystemState::Failed);
                Err(e)
            }
        }
    }

    /// Mass-balance and negative-flow checks.
    pub fn audit(&mut self, tolerance: f64, allow_negative_flows: bool) -> MfaResult<MassBalanceReport> {
        self.require(SystemState::Filled, "audit")?;
        let result = self
            .check_mass_balance(tolerance)
            .and_then(|report| self.check_flows(allow_negative_flows).map(|_| report));
        match result {
            Ok(report) => {
                self.advance(SystemState::Verified);
                Ok(report)
            }
            Err(e) => {
                self.advance(SystemState::Failed);
                Err(e)
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn dims(&self) -> &DimensionSet {
        &self.dims
    }

    pub fn time_letter(&self) -> char {
        self.time_letter
    }

    pub fn dim(&self, letter: char) -> MfaResult<&Dimension> {
        self.dims.get(letter)
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Zero array over the given system letters.
    pub fn get_new_array(&self, letters: &[char]) -> MfaResult<NamedDimArray> {
        Ok(NamedDimArray::zeros(&self.dims.select(letters)?))
    }

    pub fn parameters(&self) -> &BTreeMap<String, NamedDimArray> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> MfaResult<&NamedDimArray> {
        self.parameters
            .get(name)
            .ok_or_else(|| MfaError::ParameterLoadError {
                name: name.to_string(),
                message: format!("not provided to system '{}'", self.name),
            })
    }

    /// Add a derived parameter (e.g. an extrapolated driver) during compute.
    pub fn insert_parameter(&mut self, name: &str, value: NamedDimArray) -> MfaResult<()> {
        self.check_parameter(name, &value)?;
        self.parameters.insert(name.to_string(), value);
        Ok(())
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn flow(&self, from: &str, to: &str) -> MfaResult<&NamedDimArray> {
        let name = flow_name(from, to);
        self.flows
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.values())
            .ok_or_else(|| MfaError::ConfigError(format!("unknown flow '{name}'")))
    }

    pub fn flow_by_name(&self, name: &str) -> MfaResult<&Flow> {
        self.flows
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| MfaError::ConfigError(format!("unknown flow '{name}'")))
    }

    fn flow_mut(&mut self, from: &str, to: &str) -> MfaResult<&mut Flow> {
        let name = flow_name(from, to);
        self.flows
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| MfaError::ConfigError(format!("unknown flow '{name}'")))
    }

    pub fn set_flow(&mut self, from: &str, to: &str, value: &NamedDimArray) -> MfaResult<()> {
        self.flow_mut(from, to)?.set(value)
    }

    pub fn add_to_flow(&mut self, from: &str, to: &str, value: &NamedDimArray) -> MfaResult<()> {
        self.flow_mut(from, to)?.add(value)
    }

    pub fn stocks(&self) -> &[Stock] {
        &self.stocks
    }

    pub fn stock(&self, name: &str) -> MfaResult<&Stock> {
        crate::stock::find_stock(&self.stocks, name)
    }

    pub fn stock_mut(&mut self, name: &str) -> MfaResult<&mut Stock> {
        self.stocks
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| MfaError::ConfigError(format!("unknown stock '{name}'")))
    }

    // ── Audits ───────────────────────────────────────────────────────

    fn balance_letters(&self) -> Vec<char> {
        let mut letters = vec![self.time_letter];
        let all_have_element = self.flows.iter().all(|f| f.dims().contains(ELEMENT))
            && self.stocks.iter().all(|s| s.dims().contains(ELEMENT));
        if all_have_element && self.dims.contains(ELEMENT) {
            letters.push(ELEMENT);
        }
        letters
    }

    /// Residual per process; fails if any process exceeds `tolerance` in
    /// summed absolute residual.
    ///
    /// The environment process additionally absorbs the net stock change of
    /// the whole system.
    pub fn check_mass_balance(&self, tolerance: f64) -> MfaResult<MassBalanceReport> {
        let letters = self.balance_letters();
        let balance_dims = self.dims.select(&letters)?;
        let n = self.processes.len();
        let mut rows: Vec<NamedDimArray> = vec![NamedDimArray::zeros(&balance_dims); n];

        for flow in &self.flows {
            let amount = flow.values().sum_to(&letters)?;
            rows[flow.to.id] = rows[flow.to.id].add(&amount)?;
            rows[flow.from.id] = rows[flow.from.id].sub(&amount)?;
        }
        for stock in &self.stocks {
            let change = stock.stock_change()?.sum_to(&letters)?;
            let p = stock.process.id;
            rows[p] = rows[p].sub(&change)?;
            rows[0] = rows[0].add(&change)?;
        }

        let proc_dim = Dimension::new(
            PROCESS_LETTER,
            "Process",
            self.processes.iter().map(|p| Item::from(p.name.as_str())).collect(),
        )?;
        let report_dims = balance_dims.expand_by(vec![proc_dim])?;
        let mut residuals = NamedDimArray::zeros(&report_dims);
        let mut totals = Vec::with_capacity(n);
        for (process, row) in self.processes.iter().zip(&rows) {
            residuals.assign_slice(&[(PROCESS_LETTER, Item::from(process.name.as_str()))], row)?;
            totals.push(row.values().iter().map(|v| v.abs()).sum::<f64>());
        }
        let mut order = vec![PROCESS_LETTER];
        order.extend(&letters);
        let residuals = residuals.transposed(&order)?;

        let worst = totals
            .iter()
            .enumerate()
            .fold((0, 0.0_f64), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        debug!(system = %self.name, max_residual = worst.1, "mass balance evaluated");
        if worst.1 > tolerance {
            return Err(MfaError::MassBalanceError {
                process: self.processes[worst.0].name.clone(),
                max_residual: worst.1,
                tolerance,
                processes: self.processes.iter().map(|p| p.name.clone()).collect(),
                residuals: residuals.into_values(),
            });
        }
        Ok(MassBalanceReport { residuals, totals })
    }

    /// Flows must be non-negative; with `no_error` offenders are only logged.
    pub fn check_flows(&self, no_error: bool) -> MfaResult<()> {
        for flow in &self.flows {
            let count = flow
                .values()
                .values()
                .iter()
                .filter(|&&v| v < NEGATIVE_FLOW_THRESHOLD)
                .count();
            if count == 0 {
                continue;
            }
            let min_value = flow.values().min_value();
            if no_error {
                warn!(flow = %flow.name, count, min_value, "negative flow values");
            } else {
                return Err(MfaError::NegativeFlow {
                    flow: flow.name.clone(),
                    count,
                    min_value,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::StockKind;

    fn dims() -> DimensionSet {
        DimensionSet::new(vec![
            Dimension::years('t', "Time", 2000, 2004).unwrap(),
            Dimension::from_strs('e', "Element", &["Fe"]).unwrap(),
            Dimension::from_strs('r', "Region", &["EUR", "CHA"]).unwrap(),
        ])
        .unwrap()
    }

    fn fill(sys: &mut MfaSystem) -> MfaResult<()> {
        let production = sys.parameter("production")?.clone();
        sys.set_flow("sysenv", "use", &production)?;
        let outflow = production.scale(0.25);
        sys.set_flow("use", "sysenv", &outflow)?;
        let stock = sys.stock_mut("in_use")?;
        stock.set_inflow(&production)?;
        stock.set_outflow(&outflow)?;
        stock.compute()
    }

    fn leaky(sys: &mut MfaSystem) -> MfaResult<()> {
        let production = sys.parameter("production")?.clone();
        sys.set_flow("sysenv", "use", &production)
    }

    fn system(compute: ComputeFn) -> MfaSystem {
        let mut sys = MfaSystem::new("toy", compute);
        sys.init_dims(dims(), 't').unwrap();
        let production = NamedDimArray::full(&dims().select(&['t', 'e', 'r']).unwrap(), 4.0);
        let mut params = BTreeMap::new();
        params.insert("production".to_string(), production);
        sys.load_parameters(params).unwrap();
        sys.build(
            &["sysenv", "use"],
            &[
                FlowDefinition::new("sysenv", "use", &['t', 'e', 'r']),
                FlowDefinition::new("use", "sysenv", &['t', 'e', 'r']),
            ],
            &[StockDefinition::new(
                "in_use",
                "use",
                &['t', 'e', 'r'],
                StockKind::SimpleFlowDriven,
            )],
        )
        .unwrap();
        sys
    }

    #[test]
    fn test_lifecycle_reaches_verified() {
        let mut sys = system(fill);
        assert_eq!(sys.state(), SystemState::Empty);
        sys.compute().unwrap();
        let report = sys.audit(1.0, false).unwrap();
        assert_eq!(sys.state(), SystemState::Verified);
        assert!(report.max_total() < 1e-12);
        assert_eq!(report.residuals.letters(), vec!['P', 't', 'e']);
    }

    #[test]
    fn test_unbalanced_system_fails_audit() {
        let mut sys = system(leaky);
        sys.compute().unwrap();
        match sys.audit(1.0, false) {
            Err(MfaError::MassBalanceError {
                process, processes, ..
            }) => {
                assert!(process == "use" || process == "sysenv");
                assert_eq!(processes, vec!["sysenv".to_string(), "use".to_string()]);
            }
            other => panic!("Unexpected result: {other:?}"),
        }
        assert_eq!(sys.state(), SystemState::Failed);
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let mut sys = MfaSystem::new("toy", fill);
        match sys.compute() {
            Err(MfaError::InvalidState(msg)) => assert!(msg.contains("Created")),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parameter_with_foreign_dimension_rejected() {
        let mut sys = MfaSystem::new("toy", fill);
        sys.init_dims(dims(), 't').unwrap();
        let foreign = DimensionSet::new(vec![Dimension::from_strs('x', "X", &["a"]).unwrap()]).unwrap();
        let mut params = BTreeMap::new();
        params.insert("odd".to_string(), NamedDimArray::zeros(&foreign));
        match sys.load_parameters(params) {
            Err(MfaError::ParameterLoadError { name, .. }) => assert_eq!(name, "odd"),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_negative_flow_detection() {
        fn negative(sys: &mut MfaSystem) -> MfaResult<()> {
            sys.set_flow("sysenv", "use", &NamedDimArray::scalar(-1.0))?;
            sys.set_flow("use", "sysenv", &NamedDimArray::scalar(-1.0))
        }
        let mut sys = system(negative);
        sys.compute().unwrap();
        assert!(sys.check_flows(true).is_ok());
        match sys.check_flows(false) {
            Err(MfaError::NegativeFlow { count, .. }) => assert_eq!(count, 10),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_parameter_is_load_error() {
        let sys = system(fill);
        assert_eq!(sys.parameter("gdppc").unwrap_err().exit_code(), 3);
    }
}
