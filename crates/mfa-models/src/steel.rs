// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Steel Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Steel: forming, fabrication, trade of intermediate and final goods,
//! use, end-of-life scrap and the EAF/BOF production split.
//!
//! Dimensions: `t` time, `h` historic time, `r` region, `i` intermediate
//! product, `g` good.
//!
//! Historically, intermediate production is traced through three traded
//! markets to the use phase; the split of fabrication over goods blends
//! between typical low-, medium- and high-income sector splits in log
//! GDP per capita. In the future, demand follows the projected stock, trade
//! is projected from its history and scrap fills electric-arc production up
//! to `max_scrap_share_base_model`.

use crate::common::{
    assemble, historic_dims, param, saturation_bounds, to_future, to_historic, MaterialModel,
    Parameters, StockProjection, SystemLayout, STOCK_PROJECTION,
};
use mfa_core::io::{DimensionDefinition, ParameterDefinition};
use mfa_core::lifetime::LifetimeModel;
use mfa_core::price_trade::{PriceDrivenTrade, PriceElasticity, PriceEquilibrium};
use mfa_core::process::SYSENV;
use mfa_core::stock::{StockDefinition, StockKind};
use mfa_core::stock_extrapolation::{extrapolate_stock, StockExtrapolationSettings};
use mfa_core::trade::{BalancePolicy, Trade, TradeSide};
use mfa_core::MfaSystem;
use mfa_math::blending::{blend, BlendKind};
use mfa_math::NamedDimArray;
use mfa_types::config::ModelConfig;
use mfa_types::constants::{EPS, TRADE_PROJECTION_WEIGHT};
use mfa_types::dims::{DimType, DimensionSet, HISTORIC_TIME, REGION, TIME};
use mfa_types::error::MfaResult;
use tracing::debug;

pub struct Steel;

/// Traded markets and the flows carrying their imports and exports.
const MARKETS: [(&str, &str); 3] = [
    ("intermediate", "ip_market"),
    ("indirect", "good_market"),
    ("scrap", "eol_market"),
];

fn lifetime(params: &Parameters, config: &ModelConfig) -> MfaResult<LifetimeModel> {
    LifetimeModel::new(
        config.customization.lifetime_model_name,
        param(params, "lifetime_mean")?.clone(),
        param(params, "lifetime_std")?.clone(),
    )
}

fn trade_from(sys: &MfaSystem, prefix: &str) -> MfaResult<Trade> {
    Trade::new(
        sys.parameter(&format!("{prefix}_imports"))?.clone(),
        sys.parameter(&format!("{prefix}_exports"))?.clone(),
    )
}

/// Result of filling production with available scrap.
#[derive(Debug, Clone)]
pub struct ScrapAllocation {
    pub scrap_in_production: NamedDimArray,
    pub excess_scrap: NamedDimArray,
    /// Share of production inflow made in electric-arc furnaces.
    pub eaf_share: NamedDimArray,
}

/// Use scrap up to `max_scrap_share` of the production inflow; the rest is
/// excess. Scrap beyond the BOF scrap rate goes to EAF production.
pub fn allocate_scrap(
    available: &NamedDimArray,
    production_inflow: &NamedDimArray,
    max_scrap_share: &NamedDimArray,
    scrap_in_bof: &NamedDimArray,
) -> MfaResult<ScrapAllocation> {
    let ceiling = production_inflow.mul(max_scrap_share)?;
    let used = available.minimum(&ceiling)?;
    let excess_scrap = available.sub(&used)?;
    let scrap_share = used.div(production_inflow)?;
    let eaf_share = scrap_share
        .sub(scrap_in_bof)?
        .div(&scrap_in_bof.complement())?
        .apply(|s| s.clamp(0.0, 1.0));
    Ok(ScrapAllocation {
        scrap_in_production: used,
        excess_scrap,
        eaf_share,
    })
}

/// Goods split of fabrication, blended in log GDP per capita from the low
/// split through the medium one to the high split.
fn sector_split(sys: &MfaSystem) -> MfaResult<NamedDimArray> {
    let time = sys.time_letter();
    let target = sys.dims().select(&[time, REGION, 'g'])?;
    let x = sys.parameter("gdppc")?.apply(f64::ln);
    let x_low = sys.parameter("secsplit_gdppc_low")?.apply(f64::ln);
    let x_high = sys.parameter("secsplit_gdppc_high")?.apply(f64::ln);
    let x_mid = x_low.add(&x_high)?.scale(0.5);
    let low = sys.parameter("sector_split_low")?;
    let medium = sys.parameter("sector_split_medium")?;
    let high = sys.parameter("sector_split_high")?;

    let lower_half = blend(&target, low, medium, &x, &x_low, &x_mid, BlendKind::PolyMix)?;
    let upper_half = blend(&target, medium, high, &x, &x_mid, &x_high, BlendKind::PolyMix)?;
    let below_mid = x
        .sub(&x_mid)?
        .apply(|d| if d < 0.0 { 1.0 } else { 0.0 })
        .cast_to(&target)?;
    below_mid
        .mul(&lower_half)?
        .add(&below_mid.complement().mul(&upper_half)?)
}

/// Scale indirect exports down to what fabrication can supply, then balance.
fn cap_exports(indirect: &Trade, fabricated: &NamedDimArray) -> MfaResult<Trade> {
    let exports_total = indirect.exports().sum_over(&['g'])?;
    let factor = exports_total
        .minimum(fabricated)?
        .zip_with(&exports_total, |a, b| a / b.max(EPS))?;
    Trade::new(indirect.imports().clone(), indirect.exports().mul(&factor)?)?
        .balance(BalancePolicy::Minimum)
}

/// Use-phase inflow by good: net imports first, then domestic fabrication
/// fills the goods whose target exceeds them.
fn trade_adjusted_inflow(
    fabricated: &NamedDimArray,
    indirect: &Trade,
    split: &NamedDimArray,
) -> MfaResult<NamedDimArray> {
    let net = indirect.net_imports()?;
    let target = fabricated.add(&net.sum_over(&['g'])?)?.mul(split)?;
    let min_imports = net.clip_min(0.0);
    let imports_excess = min_imports.sub(&target)?.clip_min(0.0).sum_over(&['g'])?;
    let domestic_excess = target.sub(&min_imports)?.clip_min(0.0);
    let domestic_total = domestic_excess.sum_over(&['g'])?;
    let factor = domestic_total
        .sub(&imports_excess)?
        .zip_with(&domestic_total, |a, b| a / b.max(EPS))?;
    min_imports.add(&domestic_excess.mul(&factor)?)
}

fn compute_historic(sys: &mut MfaSystem) -> MfaResult<()> {
    let time = sys.time_letter();
    let intermediate = trade_from(sys, "intermediate")?.balance(BalancePolicy::Maximum)?;
    let indirect = trade_from(sys, "indirect")?.balance(BalancePolicy::Maximum)?;
    let split = sector_split(sys)?;
    sys.insert_parameter("sector_split", split.clone())?;

    let production = sys.parameter("production_by_intermediate")?.clone();
    let formed = production.mul(sys.parameter("forming_yield")?)?;
    let to_fabrication = formed
        .sum_to(&[time, REGION])?
        .add(&intermediate.net_imports()?)?;
    let aggregate_yield = sys
        .parameter("fabrication_yield")?
        .mul(&split)?
        .sum_over(&['g'])?;
    let fabricated = to_fabrication.mul(&aggregate_yield)?;

    let indirect = cap_exports(&indirect, &fabricated)?;
    let inflow = trade_adjusted_inflow(&fabricated, &indirect, &split)?;

    sys.set_flow(SYSENV, "forming", &production)?;
    sys.set_flow("forming", "ip_market", &formed)?;
    sys.set_flow("forming", SYSENV, &production.sub(&formed)?)?;
    sys.set_flow(SYSENV, "ip_market", intermediate.imports())?;
    sys.set_flow("ip_market", SYSENV, intermediate.exports())?;
    sys.set_flow("ip_market", "fabrication", &to_fabrication)?;
    sys.set_flow("fabrication", SYSENV, &to_fabrication.sub(&fabricated)?)?;
    sys.set_flow("fabrication", "good_market", &inflow.sub(&indirect.net_imports()?)?)?;
    sys.set_flow(SYSENV, "good_market", indirect.imports())?;
    sys.set_flow("good_market", SYSENV, indirect.exports())?;
    sys.set_flow("good_market", "use", &inflow)?;

    let stock = sys.stock_mut("historic_in_use")?;
    stock.set_inflow(&inflow)?;
    stock.compute()?;
    let outflow = stock.outflow().clone();
    sys.set_flow("use", SYSENV, &outflow)
}

/// Projected trade of the three markets for the given use-phase demand and
/// outflow.
fn predict_trade(
    sys: &MfaSystem,
    demand: &NamedDimArray,
    eol_products: &NamedDimArray,
) -> MfaResult<[Trade; 3]> {
    let time = sys.time_letter();
    let alpha = TRADE_PROJECTION_WEIGHT;
    let policy = Some(BalancePolicy::Hmean);

    let indirect = Trade::predict(
        &trade_from(sys, "historic_indirect")?,
        demand,
        TradeSide::Imports,
        policy,
        alpha,
    )?;
    let indirect = Trade::new(indirect.imports().minimum(demand)?, indirect.exports().clone())?
        .balance(BalancePolicy::Minimum)?;

    let fabrication_demand = demand.sub(&indirect.net_imports()?)?.sum_to(&[time, REGION])?;
    let intermediate = Trade::predict(
        &trade_from(sys, "historic_intermediate")?,
        &fabrication_demand,
        TradeSide::Imports,
        policy,
        alpha,
    )?;

    let scrap = Trade::predict(
        &trade_from(sys, "historic_scrap")?,
        eol_products,
        TradeSide::Exports,
        policy,
        alpha,
    )?;
    let scrap = Trade::new(scrap.imports().clone(), scrap.exports().minimum(eol_products)?)?
        .balance(BalancePolicy::Minimum)?;

    Ok([intermediate, indirect, scrap])
}

fn compute_future(sys: &mut MfaSystem) -> MfaResult<()> {
    let time = sys.time_letter();
    let projection = sys.parameter(STOCK_PROJECTION)?.clone();
    let in_use = sys.stock_mut("in_use")?;
    in_use.set_stock(&projection)?;
    in_use.compute()?;
    let demand = in_use.inflow().clone();
    let outflow = in_use.outflow().clone();

    let eol_products = outflow.mul(sys.parameter("recovery_rate")?)?;
    let [intermediate, indirect, scrap] = predict_trade(sys, &demand, &eol_products)?;

    // fabrication and forming, upstream from demand
    let to_goods = demand.sub(&indirect.net_imports()?)?;
    let to_fabrication = to_goods
        .div(sys.parameter("fabrication_yield")?)?
        .sum_to(&[time, REGION])?;
    let fabrication_loss = to_fabrication.sub(&to_goods.sum_to(&[time, REGION])?)?;
    let fabrication_losses = sys.parameter("fabrication_losses")?.clone();
    let formed = to_fabrication.sub(&intermediate.net_imports()?)?;
    let n_intermediate = sys.dim('i')?.len() as f64;
    let forming_yield = sys
        .parameter("forming_yield")?
        .sum_all()
        .scale(1.0 / n_intermediate);
    let production = formed.div(&forming_yield)?;
    let forming_loss = production.sub(&formed)?;
    let forming_losses = sys.parameter("forming_losses")?.clone();

    // end of life
    let recycled = eol_products.add(&scrap.net_imports()?)?;
    let obsolete = outflow.sub(&eol_products)?;

    // scrap and primary production
    let production_yield = sys.parameter("production_yield")?.clone();
    let production_inflow = production.div(&production_yield)?;
    let available = recycled
        .sum_to(&[time, REGION])?
        .add(&forming_loss.mul(&forming_losses.complement())?)?
        .add(&fabrication_loss.mul(&fabrication_losses.complement())?)?;
    let allocation = allocate_scrap(
        &available,
        &production_inflow,
        sys.parameter("max_scrap_share_base_model")?,
        sys.parameter("scrap_in_bof_rate")?,
    )?;
    let eaf_inflow = production_inflow.mul(&allocation.eaf_share)?;
    let scrap_to_bof = allocation.scrap_in_production.sub(&eaf_inflow)?;
    let bof_inflow = production_inflow.sub(&eaf_inflow)?;
    let extraction = bof_inflow.sub(&scrap_to_bof)?;
    let bof_output = bof_inflow.mul(&production_yield)?;
    let eaf_output = eaf_inflow.mul(&production_yield)?;
    debug!(
        scrap_used = allocation.scrap_in_production.sum(),
        excess = allocation.excess_scrap.sum(),
        "scrap allocated"
    );

    sys.set_flow("good_market", "use", &demand)?;
    sys.set_flow("imports", "good_market", indirect.imports())?;
    sys.set_flow("good_market", "exports", indirect.exports())?;
    sys.set_flow("fabrication", "good_market", &to_goods)?;
    sys.set_flow("fabrication", "scrap_market", &fabrication_loss.mul(&fabrication_losses.complement())?)?;
    sys.set_flow("fabrication", "losses", &fabrication_loss.mul(&fabrication_losses)?)?;
    sys.set_flow("ip_market", "fabrication", &to_fabrication)?;
    sys.set_flow("imports", "ip_market", intermediate.imports())?;
    sys.set_flow("ip_market", "exports", intermediate.exports())?;
    sys.set_flow("forming", "ip_market", &formed)?;
    sys.set_flow("forming", "scrap_market", &forming_loss.mul(&forming_losses.complement())?)?;
    sys.set_flow("forming", "losses", &forming_loss.mul(&forming_losses)?)?;

    sys.set_flow("use", "eol_market", &eol_products)?;
    sys.set_flow("use", "obsolete", &obsolete)?;
    sys.set_flow("imports", "eol_market", scrap.imports())?;
    sys.set_flow("eol_market", "exports", scrap.exports())?;
    sys.set_flow("eol_market", "recycling", &recycled)?;
    sys.set_flow("recycling", "scrap_market", &recycled)?;

    sys.set_flow("scrap_market", "excess_scrap", &allocation.excess_scrap)?;
    sys.set_flow("scrap_market", "eaf_production", &eaf_inflow)?;
    sys.set_flow("scrap_market", "bof_production", &scrap_to_bof)?;
    sys.set_flow(SYSENV, "extraction", &extraction)?;
    sys.set_flow("extraction", "bof_production", &extraction)?;
    sys.set_flow("bof_production", "forming", &bof_output)?;
    sys.set_flow("bof_production", "losses", &bof_inflow.sub(&bof_output)?)?;
    sys.set_flow("eaf_production", "forming", &eaf_output)?;
    sys.set_flow("eaf_production", "losses", &eaf_inflow.sub(&eaf_output)?)?;

    for (_, market) in MARKETS {
        let imports = sys.flow("imports", market)?.clone();
        let exports = sys.flow(market, "exports")?.clone();
        sys.add_to_flow(SYSENV, "imports", &imports)?;
        sys.add_to_flow("exports", SYSENV, &exports)?;
    }
    for source in ["bof_production", "eaf_production", "forming", "fabrication"] {
        let lost = sys.flow(source, "losses")?.clone();
        sys.add_to_flow("losses", SYSENV, &lost)?;
    }

    let obsolete_stock = sys.stock_mut("obsolete")?;
    obsolete_stock.set_inflow(&obsolete)?;
    obsolete_stock.compute()?;
    let excess = sys.stock_mut("excess_scrap")?;
    excess.set_inflow(&allocation.excess_scrap)?;
    excess.compute()
}

/// Intermediate trade re-solved with price-elastic origin choice.
///
/// Export penalties and domestic preferences are calibrated on the
/// projected trade of `calibration_year` at `price`; every later market
/// then settles with forming output as base supply and fabrication intake
/// as base demand. The system itself is left unchanged.
pub fn price_elastic_intermediate_trade(
    future: &MfaSystem,
    price: &NamedDimArray,
    calibration_year: i64,
    settings: PriceElasticity,
) -> MfaResult<PriceEquilibrium> {
    let time = future.time_letter();
    let tr = [time, REGION];
    let demand = future.flow("ip_market", "fabrication")?.sum_to(&tr)?;
    let supply = future.flow("forming", "ip_market")?.sum_to(&tr)?;
    let imports = future.flow("imports", "ip_market")?.sum_to(&tr)?;
    let exports = future.flow("ip_market", "exports")?.sum_to(&tr)?;

    let at_year = |arr: &NamedDimArray| arr.slice_item(time, calibration_year);
    let reference_demand = at_year(&demand)?;
    let reference_price = price.cast_to(reference_demand.dims())?;
    let model = PriceDrivenTrade::calibrate(
        settings,
        &reference_demand,
        &reference_price,
        &at_year(&imports)?,
        &at_year(&exports)?,
    )?;
    let equilibrium = model.solve(&reference_price, &demand, &supply)?;
    debug!(
        calibration_year,
        iterations = equilibrium.iterations,
        "intermediate trade settled on prices"
    );
    Ok(equilibrium)
}

impl MaterialModel for Steel {
    const NAME: &'static str = "steel";

    fn dimensions() -> Vec<DimensionDefinition> {
        vec![
            DimensionDefinition::new('t', "Time", DimType::Int, "time_in_years"),
            DimensionDefinition::new('h', "Historic Time", DimType::Int, "historic_years"),
            DimensionDefinition::new('r', "Region", DimType::Str, "regions"),
            DimensionDefinition::new('i', "Intermediate", DimType::Str, "intermediate_products"),
            DimensionDefinition::new('g', "Good", DimType::Str, "goods_in_use"),
        ]
    }

    fn parameters() -> Vec<ParameterDefinition> {
        let mut defs = vec![
            ParameterDefinition::new("production_by_intermediate", &['h', 'r', 'i']),
            ParameterDefinition::new("forming_yield", &['i']),
            ParameterDefinition::new("fabrication_yield", &['g']),
            ParameterDefinition::new("recovery_rate", &['g']),
            ParameterDefinition::new("lifetime_mean", &['r', 'g']),
            ParameterDefinition::new("lifetime_std", &['r', 'g']),
            ParameterDefinition::new("sector_split_low", &['g']),
            ParameterDefinition::new("sector_split_medium", &['g']),
            ParameterDefinition::new("sector_split_high", &['g']),
            ParameterDefinition::new("secsplit_gdppc_low", &[]),
            ParameterDefinition::new("secsplit_gdppc_high", &[]),
            ParameterDefinition::new("max_scrap_share_base_model", &[]),
            ParameterDefinition::new("scrap_in_bof_rate", &[]),
            ParameterDefinition::new("forming_losses", &[]),
            ParameterDefinition::new("fabrication_losses", &[]),
            ParameterDefinition::new("production_yield", &[]),
            ParameterDefinition::new("population", &['t', 'r']),
            ParameterDefinition::new("gdppc", &['t', 'r']),
        ];
        for (market, _) in MARKETS {
            let letters: &[char] = if market == "indirect" { &['h', 'r', 'g'] } else { &['h', 'r'] };
            defs.push(ParameterDefinition::new(&format!("{market}_imports"), letters));
            defs.push(ParameterDefinition::new(&format!("{market}_exports"), letters));
        }
        defs
    }

    fn historic_system(
        dims: &DimensionSet,
        params: &Parameters,
        config: &ModelConfig,
    ) -> MfaResult<MfaSystem> {
        let h = HISTORIC_TIME;
        let layout = SystemLayout::new(&[
            SYSENV,
            "forming",
            "ip_market",
            "fabrication",
            "good_market",
            "use",
        ])
        .flow(SYSENV, "forming", &[h, 'r', 'i'])
        .flow("forming", "ip_market", &[h, 'r', 'i'])
        .flow("forming", SYSENV, &[h, 'r', 'i'])
        .flow(SYSENV, "ip_market", &[h, 'r'])
        .flow("ip_market", SYSENV, &[h, 'r'])
        .flow("ip_market", "fabrication", &[h, 'r'])
        .flow("fabrication", SYSENV, &[h, 'r'])
        .flow("fabrication", "good_market", &[h, 'r', 'g'])
        .flow(SYSENV, "good_market", &[h, 'r', 'g'])
        .flow("good_market", SYSENV, &[h, 'r', 'g'])
        .flow("good_market", "use", &[h, 'r', 'g'])
        .flow("use", SYSENV, &[h, 'r', 'g'])
        .stock(StockDefinition::new(
            "historic_in_use",
            "use",
            &[h, 'r', 'g'],
            StockKind::InflowDriven,
        ));
        let mut sys = assemble(
            "steel_historic",
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
        let settings = StockExtrapolationSettings::from_config(config);
        let bounds = saturation_bounds(settings.kind, config.customization.saturation_bound, None)?;
        let extrapolation = extrapolate_stock(
            historic.stock("historic_in_use")?.stock(),
            param(params, "population")?,
            param(params, "gdppc")?,
            dims.get(TIME)?,
            &bounds,
            &settings,
        )?;
        debug!(kind = ?settings.kind, "steel stock projected");
        Ok(StockProjection {
            stock: extrapolation.stocks.clone(),
            extrapolation,
        })
    }

    fn future_system(
        dims: &DimensionSet,
        params: &Parameters,
        historic: &MfaSystem,
        projection: &StockProjection,
        config: &ModelConfig,
    ) -> MfaResult<MfaSystem> {
        let t = TIME;
        let tr = [t, 'r'];
        let trg = [t, 'r', 'g'];
        let layout = SystemLayout::new(&[
            SYSENV,
            "extraction",
            "bof_production",
            "eaf_production",
            "forming",
            "ip_market",
            "fabrication",
            "good_market",
            "use",
            "obsolete",
            "eol_market",
            "recycling",
            "scrap_market",
            "excess_scrap",
            "imports",
            "exports",
            "losses",
        ])
        .flow(SYSENV, "extraction", &tr)
        .flow("extraction", "bof_production", &tr)
        .flow("scrap_market", "bof_production", &tr)
        .flow("scrap_market", "eaf_production", &tr)
        .flow("bof_production", "forming", &tr)
        .flow("bof_production", "losses", &tr)
        .flow("eaf_production", "forming", &tr)
        .flow("eaf_production", "losses", &tr)
        .flow("forming", "ip_market", &tr)
        .flow("forming", "scrap_market", &tr)
        .flow("forming", "losses", &tr)
        .flow("imports", "ip_market", &tr)
        .flow("ip_market", "exports", &tr)
        .flow("ip_market", "fabrication", &tr)
        .flow("fabrication", "good_market", &trg)
        .flow("fabrication", "scrap_market", &tr)
        .flow("fabrication", "losses", &tr)
        .flow("imports", "good_market", &trg)
        .flow("good_market", "exports", &trg)
        .flow("good_market", "use", &trg)
        .flow("use", "obsolete", &trg)
        .flow("use", "eol_market", &trg)
        .flow("imports", "eol_market", &trg)
        .flow("eol_market", "exports", &trg)
        .flow("eol_market", "recycling", &trg)
        .flow("recycling", "scrap_market", &trg)
        .flow("scrap_market", "excess_scrap", &tr)
        .flow(SYSENV, "imports", &tr)
        .flow("exports", SYSENV, &tr)
        .flow("losses", SYSENV, &tr)
        .stock(StockDefinition::new(
            "in_use",
            "use",
            &trg,
            StockKind::StockDriven {
                correct_negative_inflow: true,
            },
        ))
        .stock(StockDefinition::new("obsolete", "obsolete", &trg, StockKind::SimpleFlowDriven))
        .stock(StockDefinition::new(
            "excess_scrap",
            "excess_scrap",
            &tr,
            StockKind::SimpleFlowDriven,
        ));

        let mut future_params = to_future(params, dims)?;
        future_params.insert(STOCK_PROJECTION.to_string(), projection.stock.clone());
        future_params.insert(
            "historic_intermediate_imports".into(),
            historic.flow(SYSENV, "ip_market")?.clone(),
        );
        future_params.insert(
            "historic_intermediate_exports".into(),
            historic.flow("ip_market", SYSENV)?.clone(),
        );
        future_params.insert(
            "historic_indirect_imports".into(),
            historic.flow(SYSENV, "good_market")?.clone(),
        );
        future_params.insert(
            "historic_indirect_exports".into(),
            historic.flow("good_market", SYSENV)?.clone(),
        );
        let scrap = Trade::new(
            param(params, "scrap_imports")?.clone(),
            param(params, "scrap_exports")?.clone(),
        )?
        .balance(BalancePolicy::Maximum)?;
        future_params.insert("historic_scrap_imports".into(), scrap.imports().clone());
        future_params.insert("historic_scrap_exports".into(), scrap.exports().clone());

        let mut sys = assemble(
            "steel_future",
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
