// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Cement Carbon Uptake
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Process CO2 of clinker making and its re-uptake by carbonation.
//!
//! Calcination releases the CO2 bound in the CaO of clinker and kiln dust
//! into an `atmosphere` stock. Cement products take part of it back as they
//! carbonate, tracked over the carbonation locations `c`: landfilled kiln
//! dust, construction waste, the in-use stock and end-of-life concrete.
//!
//! In-use products carbonate from their free surface with a front at
//! `k·√age` (Fick's law) until it crosses the product thickness.
//! End-of-life concrete is crushed into spheres whose diameters spread
//! uniformly over `[waste_size_min, waste_size_max]`; after a short
//! demolition period in air, recycled aggregate stays exposed and the rest
//! is buried at the slower rate.
//!
//! Rates are in mm/√yr, thickness and particle diameters in mm.

use mfa_core::dsm::DsmLane;
use mfa_core::process::SYSENV;
use mfa_core::MfaSystem;
use mfa_math::NamedDimArray;
use mfa_types::constants::{CONSTRUCTION_WASTE_CARBONATION_YEARS, DEMOLITION_EXPOSURE_YEARS};
use mfa_types::dims::{Dimension, Item, REGION};
use mfa_types::error::{MfaError, MfaResult};
use ndarray::{Array1, ArrayD, Axis};
use tracing::debug;

pub const CARBONATION_LOCATION: char = 'c';

pub const CARBONATION_LOCATIONS: [&str; 4] = ["ckd", "construction_waste", "in_use", "end_of_life"];

pub fn location_dimension() -> MfaResult<Dimension> {
    Dimension::from_strs(CARBONATION_LOCATION, "Carbonation Location", &CARBONATION_LOCATIONS)
}

/// Carbonation front after `years` of exposure.
pub fn fick_depth(rate: f64, years: f64) -> f64 {
    rate * years.max(0.0).sqrt()
}

/// Front `years` after entering end of life at `rate`, counting the
/// demolition period in air as the equivalent time at `rate`.
fn end_of_life_depth(rate: f64, rate_free: f64, years: f64) -> f64 {
    if rate <= 0.0 {
        return fick_depth(rate_free, DEMOLITION_EXPOSURE_YEARS);
    }
    let equivalent = DEMOLITION_EXPOSURE_YEARS * (rate_free / rate).powi(2);
    fick_depth(rate, equivalent + years - DEMOLITION_EXPOSURE_YEARS)
}

/// Crushed concrete as spheres with diameters spread uniformly over a range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSizes {
    r_min: f64,
    r_max: f64,
}

impl ParticleSizes {
    pub fn from_diameters(min: f64, max: f64) -> MfaResult<Self> {
        if !(min >= 0.0 && max > min) {
            return Err(MfaError::ParameterLoadError {
                name: "waste_size_min".into(),
                message: format!("particle diameters need 0 <= min < max, got [{min}, {max}]"),
            });
        }
        Ok(Self {
            r_min: min / 2.0,
            r_max: max / 2.0,
        })
    }

    /// Mean volume still uncarbonated below `depth`, without the common
    /// factor `π / (3 (r_max − r_min))`.
    fn core(&self, depth: f64) -> f64 {
        (self.r_max - depth).max(0.0).powi(4) - (self.r_min - depth).max(0.0).powi(4)
    }

    /// Volume share of the shell between depths `outer` and `inner`.
    pub fn shell_share(&self, outer: f64, inner: f64) -> f64 {
        (self.core(outer) - self.core(inner)) / self.core(0.0)
    }

    /// Share of the particle volume carbonating in each of the first
    /// `years` years of end of life.
    pub fn carbonation_profile(&self, rate: f64, rate_free: f64, years: usize) -> Vec<f64> {
        let mut front = 0.0;
        (0..years)
            .map(|u| {
                let next = end_of_life_depth(rate, rate_free, u as f64).max(front);
                let share = self.shell_share(front, next);
                front = next;
                share
            })
            .collect()
    }
}

/// Carbonation properties of the cohorts of one stock lane, indexed by
/// entry year.
#[derive(Debug, Clone)]
pub struct CohortExposure {
    /// CO2 taken up per tonne of product once fully carbonated.
    pub co2_capacity: Array1<f64>,
    pub rate_free: Array1<f64>,
    pub rate_buried: Array1<f64>,
    pub thickness: Array1<f64>,
    /// Share of end-of-life concrete recycled as exposed aggregate.
    pub recycled_share: Array1<f64>,
}

impl CohortExposure {
    /// Share of a cohort-`c` product carbonating in its year of age `age`.
    fn in_use_increment(&self, c: usize, age: usize) -> f64 {
        if age == 0 {
            return 0.0;
        }
        let thickness = self.thickness[c];
        let before = fick_depth(self.rate_free[c], (age - 1) as f64);
        let after = fick_depth(self.rate_free[c], age as f64);
        (after - before).min((thickness - before).max(0.0)) / thickness
    }

    /// Share of a cohort-`c` product still uncarbonated when it leaves use
    /// at age `age`.
    fn uncarbonated_at_exit(&self, c: usize, age: usize) -> f64 {
        let thickness = self.thickness[c];
        let front = fick_depth(self.rate_free[c], age.saturating_sub(1) as f64);
        (thickness - front).max(0.0) / thickness
    }
}

/// Yearly CO2 uptake of the products standing in a stock lane.
pub fn in_use_uptake(lane: &DsmLane, exposure: &CohortExposure) -> Array1<f64> {
    let n = lane.stock.len();
    Array1::from_shape_fn(n, |t| {
        (0..=t)
            .map(|c| {
                lane.stock_by_cohort[[t, c]]
                    * exposure.in_use_increment(c, t - c)
                    * exposure.co2_capacity[c]
            })
            .sum()
    })
}

/// Yearly CO2 uptake of the crushed concrete leaving a stock lane.
pub fn end_of_life_uptake(
    lane: &DsmLane,
    exposure: &CohortExposure,
    particles: &ParticleSizes,
) -> Array1<f64> {
    let n = lane.outflow.len();
    let mut uptake = Array1::zeros(n);
    for t0 in 0..n {
        let potential: f64 = (0..=t0)
            .map(|c| {
                lane.outflow_by_cohort[[t0, c]]
                    * exposure.uncarbonated_at_exit(c, t0 - c)
                    * exposure.co2_capacity[c]
            })
            .sum();
        if potential == 0.0 {
            continue;
        }
        let recycled = exposure.recycled_share[t0];
        let free = exposure.rate_free[t0];
        let exposed = particles.carbonation_profile(free, free, n - t0);
        let buried = particles.carbonation_profile(exposure.rate_buried[t0], free, n - t0);
        for (u, (e, b)) in exposed.iter().zip(&buried).enumerate() {
            uptake[t0 + u] += potential * (recycled * e + (1.0 - recycled) * b);
        }
    }
    uptake
}

/// Rolling sum over the last `window` entries along `letter`.
pub fn window_sum(arr: &NamedDimArray, letter: char, window: usize) -> MfaResult<NamedDimArray> {
    let ax = Axis(arr.dims().index(letter)?);
    let mut values = arr.values().clone();
    for mut lane in values.lanes_mut(ax) {
        let source = lane.to_owned();
        let mut acc = 0.0;
        for (t, &v) in source.iter().enumerate() {
            acc += v;
            if t >= window {
                acc -= source[t - window];
            }
            lane[t] = acc;
        }
    }
    NamedDimArray::from_values(arr.dims().clone(), values)
}

fn checked<'a>(sys: &'a MfaSystem, name: &str, allow_zero: bool) -> MfaResult<&'a NamedDimArray> {
    let p = sys.parameter(name)?;
    let ok = p
        .values()
        .iter()
        .all(|&v| if allow_zero { v >= 0.0 } else { v > 0.0 });
    if !ok {
        let message = if allow_zero {
            "values must be non-negative"
        } else {
            "values must be positive"
        };
        return Err(MfaError::ParameterLoadError {
            name: name.to_string(),
            message: message.into(),
        });
    }
    Ok(p)
}

fn scalar(sys: &MfaSystem, name: &str) -> MfaResult<f64> {
    sys.parameter(name)?
        .as_scalar()
        .ok_or_else(|| MfaError::ParameterLoadError {
            name: name.to_string(),
            message: "expected a single value".into(),
        })
}

fn lanes_of(values: &ArrayD<f64>, ax: Axis) -> Vec<Array1<f64>> {
    values.lanes(ax).into_iter().map(|l| l.to_owned()).collect()
}

/// In-use and end-of-life uptake, typed like the `in_use` stock.
fn product_uptake(sys: &MfaSystem) -> MfaResult<(NamedDimArray, NamedDimArray)> {
    let stock = sys.stock("in_use")?;
    let dims = stock.dims();
    let ax = Axis(dims.index(stock.time_letter())?);
    if stock.cohorts().is_empty() {
        return Err(MfaError::InvalidState(
            "in-use stock has no cohort tables yet".into(),
        ));
    }

    let capacity = sys
        .parameter("cement_ratio")?
        .mul(sys.parameter("clinker_ratio")?)?
        .mul(sys.parameter("clinker_cao_ratio")?)?
        .mul(sys.parameter("cao_carbonation_share")?)?
        .mul(sys.parameter("cao_emission_factor")?)?;
    let modifiers = sys
        .parameter("carbonation_rate_coating")?
        .mul(sys.parameter("carbonation_rate_additives")?)?
        .mul(sys.parameter("carbonation_rate_co2")?)?;
    let rate_free = checked(sys, "carbonation_rate", true)?.mul(&modifiers)?;
    let rate_buried = checked(sys, "carbonation_rate_buried", true)?;
    let thickness = checked(sys, "product_thickness", false)?;
    let recycled = checked(sys, "waste_recycled_share", true)?;
    let particles =
        ParticleSizes::from_diameters(scalar(sys, "waste_size_min")?, scalar(sys, "waste_size_max")?)?;

    let exposures = lanes_of(&capacity.align_to(dims)?, ax)
        .into_iter()
        .zip(lanes_of(&rate_free.align_to(dims)?, ax))
        .zip(lanes_of(&rate_buried.align_to(dims)?, ax))
        .zip(lanes_of(&thickness.align_to(dims)?, ax))
        .zip(lanes_of(&recycled.align_to(dims)?, ax))
        .map(
            |((((co2_capacity, rate_free), rate_buried), thickness), recycled_share)| CohortExposure {
                co2_capacity,
                rate_free,
                rate_buried,
                thickness,
                recycled_share,
            },
        );

    let mut in_use = NamedDimArray::zeros(dims);
    let mut end_of_life = NamedDimArray::zeros(dims);
    let targets = in_use
        .values_mut()
        .lanes_mut(ax)
        .into_iter()
        .zip(end_of_life.values_mut().lanes_mut(ax));
    for ((lane, exposure), (mut dst_use, mut dst_eol)) in
        stock.cohorts().iter().zip(exposures).zip(targets)
    {
        dst_use.assign(&in_use_uptake(lane, &exposure));
        dst_eol.assign(&end_of_life_uptake(lane, &exposure, &particles));
    }
    Ok((in_use, end_of_life))
}

fn set_location(uptake: &mut NamedDimArray, location: &str, value: &NamedDimArray) -> MfaResult<()> {
    uptake.assign_slice(&[(CARBONATION_LOCATION, Item::from(location))], value)
}

/// Uptake over `(time, region, location)`.
fn carbonation(sys: &MfaSystem) -> MfaResult<NamedDimArray> {
    let t = sys.time_letter();
    let emission_factor = sys.parameter("cao_emission_factor")?;
    let mut uptake = sys.get_new_array(&[t, REGION, CARBONATION_LOCATION])?;

    // landfilled kiln dust carbonates completely within its year
    let ckd = sys
        .flow("clinker_production", SYSENV)?
        .mul(sys.parameter("ckd_landfill_share")?)?
        .mul(sys.parameter("ckd_cao_ratio")?)?
        .mul(emission_factor)?;
    set_location(&mut uptake, "ckd", &ckd)?;

    let years = CONSTRUCTION_WASTE_CARBONATION_YEARS;
    let annual = sys
        .flow("cement_grinding", SYSENV)?
        .mul(sys.parameter("clinker_ratio")?)?
        .mul(sys.parameter("clinker_cao_ratio")?)?
        .mul(sys.parameter("cao_carbonation_share")?)?
        .mul(emission_factor)?
        .scale(1.0 / years as f64);
    set_location(&mut uptake, "construction_waste", &window_sum(&annual, t, years)?)?;

    let (in_use, end_of_life) = product_uptake(sys)?;
    set_location(&mut uptake, "in_use", &in_use.sum_to(&[t, REGION])?)?;
    set_location(&mut uptake, "end_of_life", &end_of_life.sum_to(&[t, REGION])?)?;
    Ok(uptake)
}

/// Process emissions of clinker making and the carbonation that returns
/// them, with the `atmosphere` and `carbonated_co2` stocks.
///
/// Expects the production chain and the `in_use` stock to be computed. The
/// emitted CO2 enters the kiln with the raw meal.
pub fn compute_carbon_flows(sys: &mut MfaSystem) -> MfaResult<()> {
    let emissions = sys
        .flow("clinker_production", "cement_grinding")?
        .mul(sys.parameter("clinker_cao_ratio")?)?
        .add(
            &sys.flow("clinker_production", SYSENV)?
                .mul(sys.parameter("ckd_cao_ratio")?)?,
        )?
        .mul(sys.parameter("cao_emission_factor")?)?;
    sys.set_flow("clinker_production", "atmosphere", &emissions)?;
    sys.add_to_flow("raw_meal_preparation", "clinker_production", &emissions)?;
    sys.add_to_flow(SYSENV, "raw_meal_preparation", &emissions)?;

    let uptake = carbonation(sys)?;
    sys.set_flow("atmosphere", "carbonation", &uptake)?;

    let atmosphere = sys.stock_mut("atmosphere")?;
    atmosphere.set_inflow(&emissions)?;
    atmosphere.set_outflow(&uptake)?;
    atmosphere.compute()?;
    let carbonated = sys.stock_mut("carbonated_co2")?;
    carbonated.set_inflow(&uptake)?;
    carbonated.compute()?;

    debug!(
        emitted = emissions.sum(),
        absorbed = uptake.sum(),
        "cement carbon flows computed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfa_types::dims::DimensionSet;
    use ndarray::Array2;

    fn exposure(n: usize, rate: f64, thickness: f64, recycled: f64) -> CohortExposure {
        CohortExposure {
            co2_capacity: Array1::from_elem(n, 0.5),
            rate_free: Array1::from_elem(n, rate),
            rate_buried: Array1::from_elem(n, rate / 4.0),
            thickness: Array1::from_elem(n, thickness),
            recycled_share: Array1::from_elem(n, recycled),
        }
    }

    /// One unit entering in year 0; it stays, or leaves in `exit_year`.
    fn single_cohort(n: usize, exit_year: Option<usize>) -> DsmLane {
        let mut stock_by_cohort = Array2::zeros((n, n));
        let mut outflow_by_cohort = Array2::zeros((n, n));
        for t in 0..n {
            match exit_year {
                Some(exit) if t >= exit => {
                    if t == exit {
                        outflow_by_cohort[[t, 0]] = 1.0;
                    }
                }
                _ => stock_by_cohort[[t, 0]] = 1.0,
            }
        }
        let mut inflow = Array1::zeros(n);
        inflow[0] = 1.0;
        DsmLane {
            inflow,
            stock: stock_by_cohort.sum_axis(Axis(1)),
            outflow: outflow_by_cohort.sum_axis(Axis(1)),
            stock_by_cohort,
            outflow_by_cohort,
            corrected_years: 0,
        }
    }

    #[test]
    fn test_in_use_front_follows_square_root_of_age() {
        let lane = single_cohort(150, None);
        let uptake = in_use_uptake(&lane, &exposure(150, 1.0, 10.0, 0.0));
        assert_eq!(uptake[0], 0.0);
        assert!((uptake[4] - 0.5 * (2.0 - 3f64.sqrt()) / 10.0).abs() < 1e-12);
        // the front reaches the back face after 100 years
        assert!((uptake.sum() - 0.5).abs() < 1e-12);
        assert_eq!(uptake[120], 0.0);
    }

    #[test]
    fn test_sphere_shells_add_up_to_the_particle() {
        let particles = ParticleSizes::from_diameters(0.0, 20.0).unwrap();
        let profile = particles.carbonation_profile(1.0, 1.0, 200);
        assert_eq!(profile[0], 0.0);
        assert!(profile.iter().all(|&s| s >= 0.0));
        assert!((profile.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((particles.shell_share(0.0, 10.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_buried_particles_keep_demolition_front() {
        let particles = ParticleSizes::from_diameters(2.0, 40.0).unwrap();
        let profile = particles.carbonation_profile(0.5, 2.0, 3);
        // 0.4 years in air count as 6.4 buried years at a quarter of the rate
        let first = fick_depth(0.5, 6.4 - DEMOLITION_EXPOSURE_YEARS);
        assert!((profile[0] - particles.shell_share(0.0, first)).abs() < 1e-12);
        // buried front moves slower than the exposed one
        let exposed = particles.carbonation_profile(2.0, 2.0, 3);
        assert!(profile[2] < exposed[2]);

        let sealed = particles.carbonation_profile(0.0, 2.0, 3);
        let demolition = fick_depth(2.0, DEMOLITION_EXPOSURE_YEARS);
        assert!((sealed[0] - particles.shell_share(0.0, demolition)).abs() < 1e-12);
        assert_eq!(&sealed[1..], &[0.0, 0.0]);
    }

    #[test]
    fn test_particle_range_must_be_ordered() {
        assert!(ParticleSizes::from_diameters(5.0, 5.0).is_err());
        assert!(ParticleSizes::from_diameters(-1.0, 5.0).is_err());
        assert!(ParticleSizes::from_diameters(f64::NAN, 5.0).is_err());
    }

    #[test]
    fn test_end_of_life_takes_up_what_use_left() {
        let n = 160;
        let lane = single_cohort(n, Some(5));
        let exposure = exposure(n, 1.0, 10.0, 1.0);
        let in_use = in_use_uptake(&lane, &exposure);
        let eol = end_of_life_uptake(&lane, &exposure, &ParticleSizes::from_diameters(0.0, 20.0).unwrap());
        assert!(eol.iter().take(6).all(|&v| v == 0.0));
        assert!(eol[6] > 0.0);
        // uncarbonated at exit: front at √4 = 2 mm of 10 mm
        assert!((in_use.sum() - 0.5 * 0.2).abs() < 1e-12);
        assert!((eol.sum() - 0.5 * 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_window_sum_spans_the_last_years() {
        let time = DimensionSet::new(vec![Dimension::years('t', "Time", 2000, 2006).unwrap()]).unwrap();
        let annual = NamedDimArray::full(&time, 1.0);
        let summed = window_sum(&annual, 't', 5).unwrap();
        let values: Vec<f64> = summed.values().iter().copied().collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 5.0, 5.0]);
    }
}
