// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Price-Driven Trade
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Price-elastic trade between regions.
//!
//! Every importing region `r` buys from each source `R` in proportion to
//! `exp(−μ · L[R, r])`, where the local price `L` is the source price
//! raised by an export penalty of `R` for foreign buyers, or scaled by the
//! domestic preference of `r` for its own producers. Penalties and
//! preferences are calibrated once so that a reference year reproduces the
//! observed trade. Prices then move until every region's supply covers its
//! demand plus net exports, with demand and supply following constant
//! price elasticities.

use crate::trade::Trade;
use mfa_math::NamedDimArray;
use mfa_types::constants::EPS;
use mfa_types::dims::{DimensionSet, REGION};
use mfa_types::error::{MfaError, MfaResult};
use ndarray::{Array1, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceElasticity {
    pub eta_demand: f64,
    pub eta_supply: f64,
    /// Price sensitivity of the origin choice, in 1/price.
    pub mu: f64,
    /// Exponent damping each update.
    pub learning_rate: f64,
    pub convergence_tol: f64,
    pub max_iterations: usize,
}

impl Default for PriceElasticity {
    fn default() -> Self {
        Self {
            eta_demand: -0.3,
            eta_supply: 1.2,
            mu: 0.012,
            learning_rate: 0.2,
            convergence_tol: 1e-4,
            max_iterations: 5000,
        }
    }
}

impl PriceElasticity {
    pub fn validate(&self) -> MfaResult<()> {
        if self.eta_supply <= 0.0 || self.eta_demand > 0.0 {
            return Err(MfaError::ConfigError(format!(
                "price elasticities need demand <= 0 < supply, got {} and {}",
                self.eta_demand, self.eta_supply
            )));
        }
        if self.mu <= 0.0 || !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(MfaError::ConfigError(format!(
                "mu must be positive and the learning rate in (0, 1], got {} and {}",
                self.mu, self.learning_rate
            )));
        }
        if self.convergence_tol <= 0.0 || self.max_iterations == 0 {
            return Err(MfaError::ConfigError(
                "price-driven trade needs a positive tolerance and iteration count".into(),
            ));
        }
        Ok(())
    }
}

/// Market state after prices have settled, typed like the demand it was
/// solved for.
#[derive(Debug, Clone)]
pub struct PriceEquilibrium {
    pub price: NamedDimArray,
    pub demand: NamedDimArray,
    pub supply: NamedDimArray,
    pub trade: Trade,
    /// Largest iteration count over the solved markets.
    pub iterations: usize,
}

/// One market over the regions.
struct MarketState {
    price: Array1<f64>,
    demand: Array1<f64>,
    supply: Array1<f64>,
    imports: Array1<f64>,
    exports: Array1<f64>,
}

/// Calibrated origin choice of a set of regions.
#[derive(Debug, Clone)]
pub struct PriceDrivenTrade {
    settings: PriceElasticity,
    regions: usize,
    export_penalty: Array1<f64>,
    domestic_preference: Array1<f64>,
}

fn region_series(arr: &NamedDimArray, what: &str) -> MfaResult<Array1<f64>> {
    if arr.letters() != [REGION] {
        return Err(MfaError::DimensionMismatch(format!(
            "{what} for trade calibration must be typed by '{REGION}' only, got {:?}",
            arr.letters()
        )));
    }
    Ok(arr.values().iter().copied().collect())
}

fn max_abs(values: &Array1<f64>) -> f64 {
    values.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

fn shares(values: &Array1<f64>) -> Array1<f64> {
    let total = values.sum().max(EPS);
    values.mapv(|v| v / total)
}

impl PriceDrivenTrade {
    /// Fit export penalties and domestic preferences so that trade at
    /// `price` reproduces the targets for the given demand. All inputs are
    /// typed by the region letter alone; every region must import and
    /// export something.
    pub fn calibrate(
        settings: PriceElasticity,
        demand: &NamedDimArray,
        price: &NamedDimArray,
        imports_target: &NamedDimArray,
        exports_target: &NamedDimArray,
    ) -> MfaResult<Self> {
        settings.validate()?;
        let demand = region_series(demand, "demand")?;
        let price = region_series(price, "price")?;
        let imports_target = region_series(imports_target, "imports")?;
        let exports_target = region_series(exports_target, "exports")?;
        let n = demand.len();
        if [price.len(), imports_target.len(), exports_target.len()] != [n; 3] {
            return Err(MfaError::TradeDimensionMismatch(
                "calibration inputs cover different regions".into(),
            ));
        }
        let feasible = (0..n).all(|r| {
            price[r] > 0.0
                && exports_target[r] > 0.0
                && imports_target[r] > 0.0
                && imports_target[r] < demand[r]
        });
        if n < 2 || !feasible {
            return Err(MfaError::ConfigError(
                "price-driven trade needs two or more regions with positive prices, \
                 exports and imports below demand"
                    .into(),
            ));
        }

        let mut model = Self {
            settings,
            regions: n,
            export_penalty: Array1::ones(n),
            domestic_preference: Array1::ones(n),
        };
        let export_shares_target = shares(&exports_target);
        let domestic_target = (&demand - &imports_target) / &demand;
        let (mu, rate, tol) = (settings.mu, settings.learning_rate, settings.convergence_tol);

        for iteration in 1..=settings.max_iterations {
            let (_, exports) = model.flows(&price, &demand);
            let export_shares = shares(&exports);
            let penalty_step = Array1::from_shape_fn(n, |r| {
                (export_shares[r] / export_shares_target[r]).ln()
                    / (mu * price[r] * model.domestic_preference[r])
            });
            model.export_penalty.scaled_add(rate, &penalty_step);
            let floor = model.export_penalty.fold(f64::INFINITY, |m, &v| m.min(v));
            model.export_penalty.mapv_inplace(|v| v + 1.0 - floor);

            let (imports, _) = model.flows(&price, &demand);
            let preference_step = Array1::from_shape_fn(n, |r| {
                ((demand[r] - imports[r]) / demand[r] / domestic_target[r]).ln()
                    / (mu * price[r] * model.export_penalty[r])
            });
            model.domestic_preference.scaled_add(rate, &preference_step);

            if max_abs(&penalty_step) < tol && max_abs(&preference_step) < tol {
                debug!(regions = n, iterations = iteration, "price-driven trade calibrated");
                return Ok(model);
            }
        }
        Err(MfaError::FitFailed {
            location: "trade calibration".into(),
            message: format!(
                "export penalties and domestic preferences not settled after {} iterations",
                settings.max_iterations
            ),
        })
    }

    pub fn settings(&self) -> &PriceElasticity {
        &self.settings
    }

    pub fn export_penalty(&self) -> &Array1<f64> {
        &self.export_penalty
    }

    pub fn domestic_preference(&self) -> &Array1<f64> {
        &self.domestic_preference
    }

    /// Imports and exports per region for one market.
    fn flows(&self, price: &Array1<f64>, demand: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let n = self.regions;
        let mu = self.settings.mu;
        let mut imports = Array1::zeros(n);
        let mut exports = Array1::zeros(n);
        for r in 0..n {
            let local: Vec<f64> = (0..n)
                .map(|source| {
                    let markup = if source == r {
                        self.domestic_preference[r]
                    } else {
                        self.export_penalty[source]
                    };
                    price[source] * markup
                })
                .collect();
            let floor = local.iter().copied().fold(f64::INFINITY, f64::min);
            let weights: Vec<f64> = local.iter().map(|l| (-mu * (l - floor)).exp()).collect();
            let total: f64 = weights.iter().sum();
            for source in (0..n).filter(|&s| s != r) {
                let amount = weights[source] / total * demand[r];
                imports[r] += amount;
                exports[source] += amount;
            }
        }
        (imports, exports)
    }

    /// Trade at fixed prices for a demand typed with the region letter.
    pub fn trade_at(&self, price: &NamedDimArray, demand: &NamedDimArray) -> MfaResult<Trade> {
        let (dims, ax) = self.market_layout(demand)?;
        let price = price.align_to(&dims)?;
        let mut imports = ArrayD::zeros(IxDyn(&dims.shape()));
        let mut exports = imports.clone();
        for (((p, d), mut imp), mut exp) in price
            .lanes(ax)
            .into_iter()
            .zip(demand.values().lanes(ax))
            .zip(imports.lanes_mut(ax))
            .zip(exports.lanes_mut(ax))
        {
            let (i, e) = self.flows(&p.to_owned(), &d.to_owned());
            imp.assign(&i);
            exp.assign(&e);
        }
        Trade::new(
            NamedDimArray::from_values(dims.clone(), imports)?,
            NamedDimArray::from_values(dims, exports)?,
        )
    }

    fn market_layout(&self, demand: &NamedDimArray) -> MfaResult<(DimensionSet, Axis)> {
        let dims = demand.dims().clone();
        let regions = dims.get(REGION).map_err(|_| {
            MfaError::MissingRegionDim(format!("demand typed {:?}", demand.letters()))
        })?;
        if regions.len() != self.regions {
            return Err(MfaError::TradeDimensionMismatch(format!(
                "calibrated for {} regions, demand has {}",
                self.regions,
                regions.len()
            )));
        }
        let ax = Axis(dims.index(REGION)?);
        Ok((dims, ax))
    }

    fn settle(
        &self,
        price_0: &Array1<f64>,
        demand_0: &Array1<f64>,
        supply_0: &Array1<f64>,
    ) -> Result<(MarketState, usize), f64> {
        let s = &self.settings;
        let mut price = price_0.clone();
        let mut excess = f64::INFINITY;
        for iteration in 1..=s.max_iterations {
            let ratio = &price / price_0;
            let demand = demand_0 * &ratio.mapv(|x| x.powf(s.eta_demand));
            let supply = supply_0 * &ratio.mapv(|x| x.powf(s.eta_supply));
            let (imports, exports) = self.flows(&price, &demand);
            let target = &demand + &exports - &imports;

            excess = max_abs(&(&supply - &target)) / max_abs(&target).max(EPS);
            if excess < s.convergence_tol {
                let state = MarketState {
                    price,
                    demand,
                    supply,
                    imports,
                    exports,
                };
                return Ok((state, iteration));
            }
            let exponent = s.learning_rate / s.eta_supply;
            for r in 0..self.regions {
                price[r] *= (target[r].max(EPS) / supply[r]).powf(exponent);
            }
        }
        Err(excess)
    }

    /// Settle prices for every market, i.e. every index of `demand_0` apart
    /// from the region. `price_0` and `supply_0` broadcast to its dims;
    /// prices and supply must be positive.
    pub fn solve(
        &self,
        price_0: &NamedDimArray,
        demand_0: &NamedDimArray,
        supply_0: &NamedDimArray,
    ) -> MfaResult<PriceEquilibrium> {
        let (dims, ax) = self.market_layout(demand_0)?;
        let price_0 = price_0.align_to(&dims)?;
        let supply_0 = supply_0.align_to(&dims)?;
        if price_0.iter().chain(supply_0.iter()).any(|&v| !(v > 0.0)) {
            return Err(MfaError::ConfigError(
                "price-driven trade needs positive base prices and supply".into(),
            ));
        }

        let shape = dims.shape();
        let mut out: Vec<ArrayD<f64>> = (0..5).map(|_| ArrayD::zeros(IxDyn(&shape))).collect();
        let rest: Vec<_> = dims.iter().filter(|d| d.letter != REGION).collect();
        let rest_shape: Vec<usize> = rest.iter().map(|d| d.len()).collect();
        let mut iterations = 0;
        for (k, ((p, d), s)) in price_0
            .lanes(ax)
            .into_iter()
            .zip(demand_0.values().lanes(ax))
            .zip(supply_0.lanes(ax))
            .enumerate()
        {
            let (state, n_iter) =
                self.settle(&p.to_owned(), &d.to_owned(), &s.to_owned())
                    .map_err(|excess| {
                        let mut idx = vec![0; rest_shape.len()];
                        let mut flat = k;
                        for (i, &n) in idx.iter_mut().zip(&rest_shape).rev() {
                            *i = flat % n;
                            flat /= n;
                        }
                        let parts: Vec<String> = rest
                            .iter()
                            .zip(&idx)
                            .map(|(d, &i)| format!("{}={}", d.letter, d.items()[i]))
                            .collect();
                        let location = if parts.is_empty() {
                            "price-driven trade".to_string()
                        } else {
                            parts.join(", ")
                        };
                        warn!(location = location.as_str(), excess, "market did not clear");
                        MfaError::FitFailed {
                            location,
                            message: format!(
                                "market not cleared after {} iterations (relative excess {excess:.3e})",
                                self.settings.max_iterations
                            ),
                        }
                    })?;
            iterations = iterations.max(n_iter);
            let series = [
                &state.price,
                &state.demand,
                &state.supply,
                &state.imports,
                &state.exports,
            ];
            for (arr, values) in out.iter_mut().zip(series) {
                if let Some(mut lane) = arr.lanes_mut(ax).into_iter().nth(k) {
                    lane.assign(values);
                }
            }
        }
        debug!(iterations, "price-driven trade settled");

        let mut out = out.into_iter();
        let mut next = || -> MfaResult<NamedDimArray> {
            let values = out.next().ok_or_else(|| {
                MfaError::InvalidState("price-driven trade result incomplete".into())
            })?;
            NamedDimArray::from_values(dims.clone(), values)
        };
        let price = next()?;
        let demand = next()?;
        let supply = next()?;
        let trade = Trade::new(next()?, next()?)?;
        Ok(PriceEquilibrium {
            price,
            demand,
            supply,
            trade,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfa_types::dims::{Dimension, Item};

    fn regions() -> DimensionSet {
        DimensionSet::new(vec![Dimension::from_strs('r', "Region", &["EUR", "USA", "CHA"]).unwrap()])
            .unwrap()
    }

    fn series(values: Vec<f64>) -> NamedDimArray {
        NamedDimArray::from_vec(&regions(), values).unwrap()
    }

    fn tight() -> PriceElasticity {
        PriceElasticity {
            convergence_tol: 1e-6,
            max_iterations: 20_000,
            ..PriceElasticity::default()
        }
    }

    fn calibrated() -> PriceDrivenTrade {
        PriceDrivenTrade::calibrate(
            tight(),
            &series(vec![100.0, 80.0, 50.0]),
            &series(vec![500.0; 3]),
            &series(vec![20.0, 10.0, 5.0]),
            &series(vec![10.0, 15.0, 10.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_calibration_reproduces_reference_trade() {
        let model = calibrated();
        let trade = model
            .trade_at(&series(vec![500.0; 3]), &series(vec![100.0, 80.0, 50.0]))
            .unwrap();
        for (got, want) in trade.imports().values().iter().zip([20.0, 10.0, 5.0]) {
            assert!((got - want).abs() < 1e-2, "imports {got} vs {want}");
        }
        for (got, want) in trade.exports().values().iter().zip([10.0, 15.0, 10.0]) {
            assert!((got - want).abs() < 1e-2, "exports {got} vs {want}");
        }
        assert!(model.export_penalty().iter().all(|&p| p > 1.0 - 1e-12));
    }

    #[test]
    fn test_cleared_market_keeps_its_prices() {
        let model = calibrated();
        let demand = series(vec![100.0, 80.0, 50.0]);
        let price = series(vec![500.0; 3]);
        let trade = model.trade_at(&price, &demand).unwrap();
        let supply = demand.sub(&trade.net_imports().unwrap()).unwrap();

        let eq = model.solve(&price, &demand, &supply).unwrap();
        assert_eq!(eq.iterations, 1);
        assert!(eq.price.sub(&price).unwrap().max_abs() < 1e-12);
    }

    #[test]
    fn test_demand_shock_raises_local_price_and_imports() {
        let model = calibrated();
        let price = series(vec![500.0; 3]);
        let base = series(vec![100.0, 80.0, 50.0]);
        let trade = model.trade_at(&price, &base).unwrap();
        let supply = base.sub(&trade.net_imports().unwrap()).unwrap();

        let eq = model
            .solve(&price, &series(vec![130.0, 80.0, 50.0]), &supply)
            .unwrap();
        let p = eq.price.values();
        assert!(p[[0]] > p[[1]] && p[[1]] > 500.0 && p[[2]] > 500.0);
        assert!(eq.trade.imports().values()[[0]] > 20.0);
        // elastic demand gives way to the higher price
        assert!(eq.demand.values()[[0]] < 130.0);
        let excess = eq.supply.sum() - eq.demand.sum();
        assert!(excess.abs() < 1e-3 * eq.demand.sum());
        assert!(eq.trade.global_imbalance().unwrap().max_abs() < 1e-9);
    }

    #[test]
    fn test_markets_over_time_settle_independently() {
        let model = calibrated();
        let dims = regions()
            .expand_by(vec![Dimension::years('t', "Time", 2020, 2022).unwrap()])
            .unwrap();
        let demand = NamedDimArray::from_fn(&dims, |i| [100.0, 80.0, 50.0][i[0]] * (1.0 + 0.1 * i[1] as f64));
        let price = NamedDimArray::scalar(500.0);
        let trade = model.trade_at(&price, &demand.slice_item('t', Item::from(2020)).unwrap()).unwrap();
        let supply = series(vec![100.0, 80.0, 50.0]).sub(&trade.net_imports().unwrap()).unwrap();

        let eq = model.solve(&price, &demand, &supply).unwrap();
        assert_eq!(eq.price.letters(), vec!['r', 't']);
        let first = eq.price.slice_item('t', Item::from(2020)).unwrap();
        assert!(first.sub(&NamedDimArray::scalar(500.0)).unwrap().max_abs() < 1e-9);
        let last = eq.price.slice_item('t', Item::from(2022)).unwrap();
        assert!(last.min_value() > 500.0);
    }

    #[test]
    fn test_unsettled_market_is_fit_failed() {
        let mut model = calibrated();
        model.settings.max_iterations = 2;
        let price = series(vec![500.0; 3]);
        let supply = series(vec![90.0, 85.0, 55.0]);
        match model.solve(&price, &series(vec![200.0, 80.0, 50.0]), &supply) {
            Err(MfaError::FitFailed { location, message }) => {
                assert_eq!(location, "price-driven trade");
                assert!(message.contains("after 2 iterations"));
            }
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_calibration_needs_two_way_trade() {
        let err = PriceDrivenTrade::calibrate(
            PriceElasticity::default(),
            &series(vec![100.0, 80.0, 50.0]),
            &series(vec![500.0; 3]),
            &series(vec![20.0, 0.0, 5.0]),
            &series(vec![10.0, 15.0, 0.0]),
        )
        .unwrap_err();
        assert!(matches!(err, MfaError::ConfigError(_)));
        assert!(PriceElasticity { eta_supply: 0.0, ..PriceElasticity::default() }
            .validate()
            .is_err());
    }
}
