// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Plastics Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Plastics: virgin supply routes, fabrication, use and end-of-life.
//!
//! Dimensions: `t` time, `h` historic time, `e` element, `r` region,
//! `m` material, `g` good. The future in-use stock is resolved by
//! material and element through `material_shares_in_goods` and
//! `carbon_content_materials`; every future flow carries `e`, so mass
//! closes per element.

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
use mfa_types::config::ModelConfig;
use mfa_types::dims::{DimType, DimensionSet, HISTORIC_TIME, TIME};
use mfa_types::error::MfaResult;
use tracing::debug;

pub struct Plastics;

const PROCESSES: [&str; 20] = [
    SYSENV,
    "virginfoss",
    "virginbio",
    "virgindaccu",
    "virginccu",
    "virgin",
    "fabrication",
    "use",
    "eol",
    "collected",
    "mismanaged",
    "reclmech",
    "reclchem",
    "recl",
    "incineration",
    "landfill",
    "uncontrolled",
    "emission",
    "captured",
    "atmosphere",
];

/// Rates over `(t, r, m)`; each is a share of its source flow.
const RATES: [&str; 8] = [
    "mismanaged_rate",
    "mechanical_recycling_rate",
    "chemical_recycling_rate",
    "incineration_rate",
    "mechanical_recycling_yield",
    "reclmech_loss_uncontrolled_rate",
    "bio_production_rate",
    "daccu_production_rate",
];

fn lifetime(params: &Parameters, config: &ModelConfig) -> MfaResult<LifetimeModel> {
    LifetimeModel::new(
        config.customization.lifetime_model_name,
        param(params, "lifetime_mean")?.clone(),
        param(params, "lifetime_std")?.clone(),
    )
}

fn compute_historic(sys: &mut MfaSystem) -> MfaResult<()> {
    let production = sys.parameter("production")?.clone();
    sys.set_flow(SYSENV, "use", &production)?;
    let stock = sys.stock_mut("in_use_historic")?;
    stock.set_inflow(&production)?;
    stock.compute()?;
    let outflow = stock.outflow().clone();
    sys.set_flow("use", SYSENV, &outflow)
}

fn compute_future(sys: &mut MfaSystem) -> MfaResult<()> {
    let stock = sys
        .parameter(STOCK_PROJECTION)?
        .mul(sys.parameter("material_shares_in_goods")?)?
        .mul(sys.parameter("carbon_content_materials")?)?;
    let in_use = sys.stock_mut("in_use")?;
    in_use.set_stock(&stock)?;
    in_use.compute()?;
    let inflow = in_use.inflow().clone();
    let outflow = in_use.outflow().clone();
    sys.set_flow("fabrication", "use", &inflow)?;
    sys.set_flow("use", "eol", &outflow)?;

    let rate = |name: &str| sys.parameter(name).map(Clone::clone);

    // end of life
    let eol = outflow.sum_over(&['g'])?;
    let mismanaged = eol.mul(&rate("mismanaged_rate")?)?;
    let collected = eol.sub(&mismanaged)?;
    let mech = collected.mul(&rate("mechanical_recycling_rate")?)?;
    let chem = collected.mul(&rate("chemical_recycling_rate")?)?;
    let incinerated = collected.mul(&rate("incineration_rate")?)?;
    let landfilled = collected.sub(&mech)?.sub(&chem)?.sub(&incinerated)?;

    let mech_recycled = mech.mul(&rate("mechanical_recycling_yield")?)?;
    let mech_losses = mech.sub(&mech_recycled)?;
    let mech_uncontrolled = mech_losses.mul(&rate("reclmech_loss_uncontrolled_rate")?)?;
    let mech_incinerated = mech_losses.sub(&mech_uncontrolled)?;
    let recycled = mech_recycled.add(&chem)?;

    // emissions and capture
    let emissions = incinerated.add(&mech_incinerated)?.sum_over(&['m'])?;
    let captured = emissions.mul(&rate("emission_capture_rate")?)?;

    // virgin supply
    let virgin = inflow.sum_over(&['g'])?.sub(&recycled)?;
    let bio = virgin.mul(&rate("bio_production_rate")?)?;
    let daccu = virgin.mul(&rate("daccu_production_rate")?)?;
    let remaining = virgin.sub(&bio)?.sub(&daccu)?.clip_min(0.0);
    let ccu_total = captured.minimum(&remaining.sum_over(&['m'])?)?;
    let ccu = remaining.get_shares_over(&['m'])?.mul(&ccu_total)?;
    let fossil = virgin.sub(&bio)?.sub(&daccu)?.sub(&ccu)?;

    sys.set_flow("eol", "mismanaged", &mismanaged)?;
    sys.set_flow("eol", "collected", &collected)?;
    sys.set_flow("mismanaged", "uncontrolled", &mismanaged)?;
    sys.set_flow("collected", "reclmech", &mech)?;
    sys.set_flow("collected", "reclchem", &chem)?;
    sys.set_flow("collected", "incineration", &incinerated)?;
    sys.set_flow("collected", "landfill", &landfilled)?;
    sys.set_flow("reclmech", "recl", &mech_recycled)?;
    sys.set_flow("reclmech", "uncontrolled", &mech_uncontrolled)?;
    sys.set_flow("reclmech", "incineration", &mech_incinerated)?;
    sys.set_flow("reclchem", "recl", &chem)?;
    sys.set_flow("recl", "fabrication", &recycled)?;

    sys.set_flow("incineration", "emission", &emissions)?;
    sys.set_flow("emission", "captured", &captured)?;
    sys.set_flow("emission", "atmosphere", &emissions.sub(&captured)?)?;
    sys.set_flow("captured", "virginccu", &captured)?;

    sys.set_flow("atmosphere", "virginbio", &bio)?;
    sys.set_flow("virginbio", "virgin", &bio)?;
    sys.set_flow("atmosphere", "virgindaccu", &daccu)?;
    sys.set_flow("virgindaccu", "virgin", &daccu)?;
    sys.set_flow("virginccu", "virgin", &ccu)?;
    sys.set_flow("virginccu", SYSENV, &captured.sub(&ccu_total)?)?;
    sys.set_flow(SYSENV, "virginfoss", &fossil)?;
    sys.set_flow("virginfoss", "virgin", &fossil)?;
    sys.set_flow("virgin", "fabrication", &virgin)?;

    let landfill = sys.stock_mut("landfill")?;
    landfill.set_inflow(&landfilled)?;
    landfill.compute()?;
    let uncontrolled = sys.stock_mut("uncontrolled")?;
    uncontrolled.set_inflow(&mismanaged.add(&mech_uncontrolled)?)?;
    uncontrolled.compute()?;
    let atmospheric = sys.stock_mut("atmospheric_co2")?;
    atmospheric.set_inflow(&emissions.sub(&captured)?)?;
    atmospheric.set_outflow(&bio.add(&daccu)?)?;
    atmospheric.compute()
}

impl MaterialModel for Plastics {
    const NAME: &'static str = "plastics";

    fn dimensions() -> Vec<DimensionDefinition> {
        vec![
            DimensionDefinition::new('t', "Time", DimType::Int, "time_in_years"),
            DimensionDefinition::new('h', "Historic Time", DimType::Int, "historic_years"),
            DimensionDefinition::new('e', "Element", DimType::Str, "elements"),
            DimensionDefinition::new('r', "Region", DimType::Str, "regions"),
            DimensionDefinition::new('m', "Material", DimType::Str, "materials"),
            DimensionDefinition::new('g', "Good", DimType::Str, "goods_in_use"),
        ]
    }

    fn parameters() -> Vec<ParameterDefinition> {
        let mut defs = vec![
            ParameterDefinition::new("production", &['h', 'r', 'g']),
            ParameterDefinition::new("lifetime_mean", &['r', 'g']),
            ParameterDefinition::new("lifetime_std", &['r', 'g']),
            ParameterDefinition::new("material_shares_in_goods", &['r', 'm', 'g']),
            ParameterDefinition::new("carbon_content_materials", &['e', 'm']),
            ParameterDefinition::new("emission_capture_rate", &['t']),
            ParameterDefinition::new("population", &['t', 'r']),
            ParameterDefinition::new("gdppc", &['t', 'r']),
        ];
        defs.extend(RATES.iter().map(|name| ParameterDefinition::new(name, &['t', 'r', 'm'])));
        defs
    }

    fn historic_system(
        dims: &DimensionSet,
        params: &Parameters,
        config: &ModelConfig,
    ) -> MfaResult<MfaSystem> {
        let letters = [HISTORIC_TIME, 'r', 'g'];
        let layout = SystemLayout::new(&[SYSENV, "use"])
            .flow(SYSENV, "use", &letters)
            .flow("use", SYSENV, &letters)
            .stock(StockDefinition::new(
                "in_use_historic",
                "use",
                &letters,
                StockKind::InflowDriven,
            ));
        let mut sys = assemble(
            "plastics_historic",
            compute_historic,
            historic_dims(dims),
            HISTORIC_TIME,
            to_historic(params, dims)?,
            &layout,
        )?;
        sys.stock_mut("in_use_historic")?
            .set_lifetime(lifetime(params, config)?)?;
        Ok(sys)
    }

    fn long_term_stock(
        historic: &MfaSystem,
        dims: &DimensionSet,
        params: &Parameters,
        config: &ModelConfig,
    ) -> MfaResult<StockProjection> {
        let settings = StockExtrapolationSettings::from_config(config);
        let bounds = saturation_bounds(settings.kind, config.customization.saturation_bound, None)?;
        let extrapolation = extrapolate_stock(
            historic.stock("in_use_historic")?.stock(),
            param(params, "population")?,
            param(params, "gdppc")?,
            dims.get(TIME)?,
            &bounds,
            &settings,
        )?;
        debug!(
            kind = ?settings.kind,
            by_category = settings.by_category,
            "plastics stock projected"
        );
        Ok(StockProjection {
            stock: extrapolation.stocks.clone(),
            extrapolation,
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
        let trm = [t, 'e', 'r', 'm'];
        let ter = [t, 'e', 'r'];
        let goods = [t, 'e', 'r', 'm', 'g'];
        let layout = SystemLayout::new(&PROCESSES)
            .flow(SYSENV, "virginfoss", &trm)
            .flow("virginfoss", "virgin", &trm)
            .flow("atmosphere", "virginbio", &ter)
            .flow("virginbio", "virgin", &trm)
            .flow("atmosphere", "virgindaccu", &ter)
            .flow("virgindaccu", "virgin", &trm)
            .flow("captured", "virginccu", &ter)
            .flow("virginccu", "virgin", &trm)
            .flow("virginccu", SYSENV, &ter)
            .flow("virgin", "fabrication", &trm)
            .flow("recl", "fabrication", &trm)
            .flow("fabrication", "use", &goods)
            .flow("use", "eol", &goods)
            .flow("eol", "mismanaged", &trm)
            .flow("eol", "collected", &trm)
            .flow("collected", "reclmech", &trm)
            .flow("collected", "reclchem", &trm)
            .flow("collected", "incineration", &trm)
            .flow("collected", "landfill", &trm)
            .flow("mismanaged", "uncontrolled", &trm)
            .flow("reclmech", "recl", &trm)
            .flow("reclmech", "uncontrolled", &trm)
            .flow("reclmech", "incineration", &trm)
            .flow("reclchem", "recl", &trm)
            .flow("incineration", "emission", &ter)
            .flow("emission", "captured", &ter)
            .flow("emission", "atmosphere", &ter)
            .stock(StockDefinition::new(
                "in_use",
                "use",
                &goods,
                StockKind::StockDriven {
                    correct_negative_inflow: true,
                },
            ))
            .stock(StockDefinition::new("landfill", "landfill", &trm, StockKind::SimpleFlowDriven))
            .stock(StockDefinition::new(
                "uncontrolled",
                "uncontrolled",
                &trm,
                StockKind::SimpleFlowDriven,
            ))
            .stock(StockDefinition::new(
                "atmospheric_co2",
                "atmosphere",
                &ter,
                StockKind::SimpleFlowDriven,
            ));
        let mut future_params = to_future(params, dims)?;
        future_params.insert(STOCK_PROJECTION.to_string(), projection.stock.clone());
        let mut sys = assemble(
            "plastics_future",
            compute_future,
            dims.clone(),
            t,
            future_params,
            &layout,
        )?;
        sys.stock_mut("in_use")?
            .set_lifetime(lifetime(params, config)?)?;
        Ok(sys)
    }
}
