// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Cement Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Cement and concrete: raw meal, clinker, grinding, concrete and use.
//!
//! Dimensions: `t` time, `h` historic time, `r` region, `s` stock type.
//! Historic cement consumption (production minus net exports) becomes
//! concrete via `cement_ratio` and is split over stock types by
//! `use_split`. The future chain is run backwards from the inflow the
//! projected stock needs; it adds cement losses at grinding, kiln dust at
//! clinker production and the carbon flows of [`crate::carbon_uptake`].

use crate::carbon_uptake::{compute_carbon_flows, location_dimension, CARBONATION_LOCATION};
use crate::common::{
    assemble, historic_dims, param, saturation_bounds, to_future, to_historic, MaterialModel,
    Parameters, StockProjection, SystemLayout, STOCK_PROJECTION,
};
use mfa_core::io::{DimensionDefinition, ParameterDefinition};
use mfa_core::lifetime::LifetimeModel;
use mfa_core::process::SYSENV;
use mfa_core::stock::{StockDefinition, StockKind};
use mfa_core::stock_extrapolation::{extrapolate_stock, StockExtrapolationSettings};
use mfa_core::MfaSystem;
use mfa_math::NamedDimArray;
use mfa_types::config::ModelConfig;
use mfa_types::constants::{CEMENT_SATURATION_LEVEL, DEFAULT_LIFETIME_REL_STD};
use mfa_types::dims::{DimType, DimensionSet, HISTORIC_TIME, REGION, TIME};
use mfa_types::error::{MfaError, MfaResult};
use tracing::debug;

pub struct Cement;

const CHAIN: [&str; 6] = [
    SYSENV,
    "raw_meal_preparation",
    "clinker_production",
    "cement_grinding",
    "concrete_production",
    "use",
];

fn chain_layout(processes: &[&'static str], time: char) -> SystemLayout {
    SystemLayout::new(processes)
        .flow(SYSENV, "raw_meal_preparation", &[time, 'r'])
        .flow("raw_meal_preparation", "clinker_production", &[time, 'r'])
        .flow("clinker_production", "cement_grinding", &[time, 'r'])
        .flow(SYSENV, "cement_grinding", &[time, 'r'])
        .flow("cement_grinding", "concrete_production", &[time, 'r'])
        .flow(SYSENV, "concrete_production", &[time, 'r'])
        .flow("concrete_production", "use", &[time, 'r', 's'])
}

fn lifetime(params: &Parameters, config: &ModelConfig) -> MfaResult<LifetimeModel> {
    LifetimeModel::with_relative_std(
        config.customization.lifetime_model_name,
        param(params, "use_lifetime_mean")?.clone(),
        DEFAULT_LIFETIME_REL_STD,
    )
}

/// Fill the production chain upstream of `concrete_to_use`.
fn fill_production_chain(sys: &mut MfaSystem, concrete_to_use: &NamedDimArray) -> MfaResult<()> {
    let time = sys.time_letter();
    let concrete = concrete_to_use.sum_to(&[time, REGION])?;
    let cement = concrete.mul(sys.parameter("cement_ratio")?)?;
    let clinker = cement.mul(sys.parameter("clinker_ratio")?)?;

    sys.set_flow("concrete_production", "use", concrete_to_use)?;
    sys.set_flow(SYSENV, "concrete_production", &concrete.sub(&cement)?)?;
    sys.set_flow("cement_grinding", "concrete_production", &cement)?;
    sys.set_flow(SYSENV, "cement_grinding", &cement.sub(&clinker)?)?;
    sys.set_flow("clinker_production", "cement_grinding", &clinker)?;
    sys.set_flow("raw_meal_preparation", "clinker_production", &clinker)?;
    sys.set_flow(SYSENV, "raw_meal_preparation", &clinker)
}

/// Future chain: the delivered flows of [`fill_production_chain`] plus
/// the share of cement lost at grinding and the kiln dust lost at clinker
/// production, both given as shares of production.
fn fill_future_chain(sys: &mut MfaSystem, concrete_to_use: &NamedDimArray) -> MfaResult<()> {
    fill_production_chain(sys, concrete_to_use)?;
    let delivered = sys.flow("cement_grinding", "concrete_production")?.clone();
    let made = delivered.div(&loss_share(sys, "cement_losses")?.complement())?;
    let clinker = made.mul(sys.parameter("clinker_ratio")?)?;
    let kiln = clinker.div(&loss_share(sys, "clinker_losses")?.complement())?;

    sys.set_flow("cement_grinding", SYSENV, &made.sub(&delivered)?)?;
    sys.set_flow(SYSENV, "cement_grinding", &made.sub(&clinker)?)?;
    sys.set_flow("clinker_production", "cement_grinding", &clinker)?;
    sys.set_flow("clinker_production", SYSENV, &kiln.sub(&clinker)?)?;
    sys.set_flow("raw_meal_preparation", "clinker_production", &kiln)?;
    sys.set_flow(SYSENV, "raw_meal_preparation", &kiln)
}

fn loss_share(sys: &MfaSystem, name: &str) -> MfaResult<NamedDimArray> {
    let share = sys.parameter(name)?;
    if share.values().iter().all(|v| (0.0..1.0).contains(v)) {
        Ok(share.clone())
    } else {
        Err(MfaError::ParameterLoadError {
            name: name.to_string(),
            message: "loss shares must lie in [0, 1)".into(),
        })
    }
}

fn compute_historic(sys: &mut MfaSystem) -> MfaResult<()> {
    let consumption = sys
        .parameter("cement_production")?
        .sub(sys.parameter("cement_trade")?)?;
    let concrete = consumption
        .div(sys.parameter("cement_ratio")?)?
        .mul(sys.parameter("use_split")?)?;
    fill_production_chain(sys, &concrete)?;

    let stock = sys.stock_mut("historic_in_use")?;
    stock.set_inflow(&concrete)?;
    stock.compute()?;
    let outflow = stock.outflow().clone();
    sys.set_flow("use", SYSENV, &outflow)
}

fn compute_future(sys: &mut MfaSystem) -> MfaResult<()> {
    let projection = sys.parameter(STOCK_PROJECTION)?.clone();
    let in_use = sys.stock_mut("in_use")?;
    in_use.set_stock(&projection)?;
    in_use.compute()?;
    let inflow = in_use.inflow().clone();
    let outflow = in_use.outflow().clone();

    fill_future_chain(sys, &inflow)?;
    sys.set_flow("use", "eol", &outflow)?;

    let eol = sys.stock_mut("eol")?;
    eol.set_inflow(&outflow)?;
    eol.compute()?;
    compute_carbon_flows(sys)
}

impl MaterialModel for Cement {
    const NAME: &'static str = "cement";

    fn dimensions() -> Vec<DimensionDefinition> {
        vec![
            DimensionDefinition::new('t', "Time", DimType::Int, "time_in_years"),
            DimensionDefinition::new('h', "Historic Time", DimType::Int, "historic_years"),
            DimensionDefinition::new('r', "Region", DimType::Str, "regions"),
            DimensionDefinition::new('s', "Stock Type", DimType::Str, "stock_types"),
        ]
    }

    fn parameters() -> Vec<ParameterDefinition> {
        vec![
            ParameterDefinition::new("cement_production", &['h', 'r']),
            ParameterDefinition::new("cement_trade", &['h', 'r']),
            ParameterDefinition::new("clinker_ratio", &['h', 'r']),
            ParameterDefinition::new("cement_ratio", &['r']),
            ParameterDefinition::new("use_split", &['r', 's']),
            ParameterDefinition::new("use_lifetime_mean", &['r', 's']),
            ParameterDefinition::new("population", &['t', 'r']),
            ParameterDefinition::new("gdppc", &['t', 'r']),
            ParameterDefinition::new("cement_losses", &[]),
            ParameterDefinition::new("clinker_losses", &[]),
            ParameterDefinition::new("clinker_cao_ratio", &[]),
            ParameterDefinition::new("cao_emission_factor", &[]),
            ParameterDefinition::new("cao_carbonation_share", &[]),
            ParameterDefinition::new("ckd_cao_ratio", &[]),
            ParameterDefinition::new("ckd_landfill_share", &[]),
            ParameterDefinition::new("carbonation_rate", &['r', 's']),
            ParameterDefinition::new("carbonation_rate_buried", &['r', 's']),
            ParameterDefinition::new("carbonation_rate_coating", &[]),
            ParameterDefinition::new("carbonation_rate_additives", &[]),
            ParameterDefinition::new("carbonation_rate_co2", &[]),
            ParameterDefinition::new("product_thickness", &['s']),
            ParameterDefinition::new("waste_recycled_share", &['r']),
            ParameterDefinition::new("waste_size_min", &[]),
            ParameterDefinition::new("waste_size_max", &[]),
        ]
    }

    fn historic_system(
        dims: &DimensionSet,
        params: &Parameters,
        config: &ModelConfig,
    ) -> MfaResult<MfaSystem> {
        let h = HISTORIC_TIME;
        let layout = chain_layout(&CHAIN, h)
            .flow("use", SYSENV, &[h, 'r', 's'])
            .stock(StockDefinition::new(
                "historic_in_use",
                "use",
                &[h, 'r', 's'],
                StockKind::InflowDriven,
            ));
        let mut sys = assemble(
            "cement_historic",
            compute_historic,
            historic_dims(dims),
            h,
            to_historic(params, dims)?,
            &layout,
        )?;
        sys.stock_mut("historic_in_use")?
            .set_lifetime(lifetime(params, config)?)?;
        Ok(sys)
    }

    fn long_term_stock(
        historic: &MfaSystem,
        dims: &DimensionSet,
        params: &Parameters,
        config: &ModelConfig,
    ) -> MfaResult<StockProjection> {
        let total = historic
            .stock("historic_in_use")?
            .stock()
            .sum_to(&[HISTORIC_TIME, REGION])?;
        let settings = StockExtrapolationSettings::from_config(config);
        let bounds = saturation_bounds(
            settings.kind,
            config.customization.saturation_bound,
            Some(CEMENT_SATURATION_LEVEL),
        )?;
        let extrapolation = extrapolate_stock(
            &total,
            param(params, "population")?,
            param(params, "gdppc")?,
            dims.get(TIME)?,
            &bounds,
            &settings,
        )?;
        let stock = extrapolation.stocks.mul(param(params, "use_split")?)?;
        debug!(kind = ?settings.kind, "cement stock projected");
        Ok(StockProjection {
            extrapolation,
            stock,
        })
    }

    fn future_system(
        dims: &DimensionSet,
        params: &Parameters,
        _historic: &MfaSystem,
        projection: &StockProjection,
        config: &ModelConfig,
    ) -> MfaResult<MfaSystem> {
        let t = TIME;
        let c = CARBONATION_LOCATION;
        let mut processes = CHAIN.to_vec();
        processes.extend(["eol", "atmosphere", "carbonation"]);
        let layout = chain_layout(&processes, t)
            .flow("cement_grinding", SYSENV, &[t, 'r'])
            .flow("clinker_production", SYSENV, &[t, 'r'])
            .flow("clinker_production", "atmosphere", &[t, 'r'])
            .flow("atmosphere", "carbonation", &[t, 'r', c])
            .flow("use", "eol", &[t, 'r', 's'])
            .stock(StockDefinition::new(
                "in_use",
                "use",
                &[t, 'r', 's'],
                StockKind::StockDriven {
                    correct_negative_inflow: true,
                },
            ))
            .stock(StockDefinition::new(
                "eol",
                "eol",
                &[t, 'r', 's'],
                StockKind::SimpleFlowDriven,
            ))
            .stock(StockDefinition::new(
                "atmosphere",
                "atmosphere",
                &[t, 'r'],
                StockKind::SimpleFlowDriven,
            ))
            .stock(StockDefinition::new(
                "carbonated_co2",
                "carbonation",
                &[t, 'r', c],
                StockKind::SimpleFlowDriven,
            ));
        let mut future_params = to_future(params, dims)?;
        future_params.insert(STOCK_PROJECTION.to_string(), projection.stock.clone());
        let mut sys = assemble(
            "cement_future",
            compute_future,
            dims.expand_by(vec![location_dimension()?])?,
            t,
            future_params,
            &layout,
        )?;
        sys.stock_mut("in_use")?
            .set_lifetime(lifetime(params, config)?)?;
        Ok(sys)
    }
}
