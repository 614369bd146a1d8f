// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Model Driver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Shared run pipeline of the material models.
//!
//! Every model runs the same sequence: load dimensions and parameters,
//! compute and audit a historic inflow-driven system, extrapolate its
//! in-use stock over the full time axis, compute and audit a stock-driven
//! future system, then export.

use mfa_core::io::{
    export_system, read_dimensions, read_parameters, DimensionDefinition, ParameterDefinition,
};
use mfa_core::parameters::extend_constant;
use mfa_core::process::FlowDefinition;
use mfa_core::stock::StockDefinition;
use mfa_core::stock_extrapolation::StockExtrapolation;
use mfa_core::system::{ComputeFn, MassBalanceReport};
use mfa_core::MfaSystem;
use mfa_math::extrapolation::{Bound, BoundList, CurveModel};
use mfa_math::NamedDimArray;
use mfa_types::config::{ExtrapolationKind, ModelConfig, SaturationBound};
use mfa_types::dims::{Dimension, DimensionSet, HISTORIC_TIME, TIME};
use mfa_types::error::MfaResult;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Parameter name under which the projected in-use stock reaches the
/// future system.
pub const STOCK_PROJECTION: &str = "in_use_stock_projection";

pub type Parameters = BTreeMap<String, NamedDimArray>;

/// Processes, flows and stocks of one system.
#[derive(Debug, Clone, Default)]
pub struct SystemLayout {
    pub processes: Vec<&'static str>,
    pub flows: Vec<FlowDefinition>,
    pub stocks: Vec<StockDefinition>,
}

impl SystemLayout {
    pub fn new(processes: &[&'static str]) -> Self {
        Self {
            processes: processes.to_vec(),
            ..Self::default()
        }
    }

    pub fn flow(mut self, from: &str, to: &str, letters: &[char]) -> Self {
        self.flows.push(FlowDefinition::new(from, to, letters));
        self
    }

    pub fn stock(mut self, def: StockDefinition) -> Self {
        self.stocks.push(def);
        self
    }
}

/// Long-term stock: the fit itself plus the stock handed to the future
/// system, typed like its in-use stock.
#[derive(Debug, Clone)]
pub struct StockProjection {
    pub extrapolation: StockExtrapolation,
    pub stock: NamedDimArray,
}

/// Everything one model run produces.
#[derive(Debug)]
pub struct ModelRun {
    pub historic: MfaSystem,
    pub future: MfaSystem,
    pub projection: StockProjection,
    pub historic_balance: MassBalanceReport,
    pub future_balance: MassBalanceReport,
    pub export_dir: Option<PathBuf>,
}

pub trait MaterialModel {
    const NAME: &'static str;

    fn dimensions() -> Vec<DimensionDefinition>;

    fn parameters() -> Vec<ParameterDefinition>;

    /// Inflow-driven system over the historic years, not yet computed.
    fn historic_system(
        dims: &DimensionSet,
        params: &Parameters,
        config: &ModelConfig,
    ) -> MfaResult<MfaSystem>;

    fn long_term_stock(
        historic: &MfaSystem,
        dims: &DimensionSet,
        params: &Parameters,
        config: &ModelConfig,
    ) -> MfaResult<StockProjection>;

    /// Stock-driven system over the full time axis, not yet computed.
    fn future_system(
        dims: &DimensionSet,
        params: &Parameters,
        historic: &MfaSystem,
        projection: &StockProjection,
        config: &ModelConfig,
    ) -> MfaResult<MfaSystem>;
}

/// Load the model inputs from `config.input_data_path` and run.
pub fn run<M: MaterialModel>(config: &ModelConfig) -> MfaResult<ModelRun> {
    config.validate()?;
    info!(
        model = M::NAME,
        input = %config.input_data_path.display(),
        "loading model inputs"
    );
    let dims = read_dimensions(&config.input_data_path, &M::dimensions())?;
    let params = read_parameters(&config.input_data_path, &M::parameters(), &dims)?;
    run_with::<M>(config, dims, params)
}

/// Run on dimensions and parameters already in memory.
pub fn run_with<M: MaterialModel>(
    config: &ModelConfig,
    dims: DimensionSet,
    params: Parameters,
) -> MfaResult<ModelRun> {
    let tolerance = config.mass_balance_tolerance;

    let mut historic = M::historic_system(&dims, &params, config)?;
    historic.compute()?;
    let historic_balance = historic.audit(tolerance, true)?;
    info!(
        model = M::NAME,
        max_residual = historic_balance.max_total(),
        "historic system verified"
    );

    let projection = M::long_term_stock(&historic, &dims, &params, config)?;

    let mut future = M::future_system(&dims, &params, &historic, &projection, config)?;
    future.compute()?;
    let future_balance = future.audit(tolerance, true)?;
    info!(
        model = M::NAME,
        max_residual = future_balance.max_total(),
        "future system verified"
    );

    let export = &config.do_export;
    let export_dir = if export.dictionary || export.csv || export.assumptions {
        Some(export_system(&future, config)?)
    } else {
        None
    };

    Ok(ModelRun {
        historic,
        future,
        projection,
        historic_balance,
        future_balance,
        export_dir,
    })
}

/// Create, type, parameterise and allocate a system in one go.
pub fn assemble(
    name: &str,
    compute: ComputeFn,
    dims: DimensionSet,
    time_letter: char,
    params: Parameters,
    layout: &SystemLayout,
) -> MfaResult<MfaSystem> {
    let mut system = MfaSystem::new(name, compute);
    system.init_dims(dims, time_letter)?;
    system.load_parameters(params)?;
    system.build(&layout.processes, &layout.flows, &layout.stocks)?;
    Ok(system)
}

/// Dimensions of the historic system: everything but the full time axis.
pub fn historic_dims(dims: &DimensionSet) -> DimensionSet {
    dims.drop(&[TIME])
}

/// Parameters restricted to the historic years; `t`-typed parameters are
/// sliced onto `h`.
pub fn to_historic(params: &Parameters, dims: &DimensionSet) -> MfaResult<Parameters> {
    let hist = dims.get(HISTORIC_TIME)?;
    params
        .iter()
        .map(|(name, p)| {
            let value = if p.dims().contains(TIME) {
                p.slice_subdim(TIME, hist)?
            } else {
                p.clone()
            };
            Ok((name.clone(), value))
        })
        .collect()
}

/// Parameters lifted to the full time axis; `h`-typed parameters keep their
/// last observation for every later year.
pub fn to_future(params: &Parameters, dims: &DimensionSet) -> MfaResult<Parameters> {
    let time: &Dimension = dims.get(TIME)?;
    params
        .iter()
        .map(|(name, p)| {
            let value = if p.dims().contains(HISTORIC_TIME) {
                extend_constant(p, time)?
            } else {
                p.clone()
            };
            Ok((name.clone(), value))
        })
        .collect()
}

/// Bounds on the fitted saturation level, when the curve has one.
///
/// `configured` wins over `fallback`; a fallback level pins the parameter.
pub fn saturation_bounds(
    kind: ExtrapolationKind,
    configured: Option<SaturationBound>,
    fallback: Option<f64>,
) -> MfaResult<BoundList> {
    let mut bounds = BoundList::default();
    if !kind.param_names().contains(&"saturation_level") {
        if configured.is_some() {
            warn!(?kind, "saturation bound ignored, curve has no saturation level");
        }
        return Ok(bounds);
    }
    let range = configured
        .map(|b| (b.lower, b.upper))
        .or(fallback.map(|level| (level, level)));
    if let Some((lower, upper)) = range {
        bounds.push(Bound::scalar("saturation_level", lower, upper)?);
    }
    Ok(bounds)
}

/// Parameter by name, as loaded.
pub fn param<'a>(params: &'a Parameters, name: &str) -> MfaResult<&'a NamedDimArray> {
    params
        .get(name)
        .ok_or_else(|| mfa_types::error::MfaError::ParameterLoadError {
            name: name.to_string(),
            message: "missing from model inputs".into(),
        })
}

/// Proportional stock fit and no exports, for in-memory runs.
#[cfg(test)]
pub(crate) fn test_config(class: mfa_types::config::ModelClass) -> ModelConfig {
    let mut config = ModelConfig::new(class);
    config.customization.stock_extrapolation_class_name = ExtrapolationKind::WeightedProportional;
    config.do_export = mfa_types::config::ExportConfig {
        dictionary: false,
        csv: false,
        assumptions: false,
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfa_types::error::MfaError;

    fn dims() -> DimensionSet {
        DimensionSet::new(vec![
            Dimension::years('t', "Time", 2000, 2004).unwrap(),
            Dimension::years('h', "Historic Time", 2000, 2002).unwrap(),
            Dimension::from_strs('r', "Region", &["EUR", "USA"]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_historic_and_future_views() {
        let dims = dims();
        let mut params = Parameters::new();
        params.insert(
            "population".into(),
            NamedDimArray::from_fn(&dims.select(&['t', 'r']).unwrap(), |i| i[0] as f64),
        );
        params.insert(
            "production".into(),
            NamedDimArray::from_fn(&dims.select(&['h', 'r']).unwrap(), |i| 1.0 + i[0] as f64),
        );

        let hist = to_historic(&params, &dims).unwrap();
        assert_eq!(hist["population"].letters(), vec!['h', 'r']);
        assert_eq!(hist["population"].sum(), 2.0 * (0.0 + 1.0 + 2.0));
        assert_eq!(hist["production"].letters(), vec!['h', 'r']);

        let fut = to_future(&params, &dims).unwrap();
        assert_eq!(fut["production"].letters(), vec!['t', 'r']);
        // 1, 2, 3 then 3, 3 per region
        assert_eq!(fut["production"].sum(), 2.0 * 12.0);
        assert_eq!(historic_dims(&dims).letters(), vec!['h', 'r']);
    }

    #[test]
    fn test_saturation_bounds_follow_curve() {
        let none = saturation_bounds(ExtrapolationKind::WeightedProportional, None, Some(5.0)).unwrap();
        assert!(none.is_empty());

        let pinned = saturation_bounds(ExtrapolationKind::LogSigmoidal, None, Some(200.0)).unwrap();
        assert_eq!(pinned.iter().count(), 1);

        let configured = saturation_bounds(
            ExtrapolationKind::Sigmoidal,
            Some(SaturationBound { lower: 10.0, upper: 20.0 }),
            Some(200.0),
        )
        .unwrap();
        assert_eq!(configured.iter().count(), 1);
        assert!(saturation_bounds(ExtrapolationKind::Logistic, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_missing_parameter() {
        match param(&Parameters::new(), "lifetime_mean") {
            Err(MfaError::ParameterLoadError { name, .. }) => assert_eq!(name, "lifetime_mean"),
            other => panic!("Unexpected result: {other:?}"),
        }
    }
}
