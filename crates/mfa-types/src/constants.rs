// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Absolute mass-balance tolerance in tonnes.
pub const MASS_BALANCE_TOLERANCE: f64 = 1.0;

/// Gaussian relaxation time of the historic/future splice (years).
/// The envelope has decayed to 5 % after this many years.
pub const GAUSSIAN_RELAXATION_YEARS: f64 = 50.0;

/// Number of trailing historic points used for slope matching and
/// weighted proportional fits.
pub const N_TRAILING_POINTS: usize = 5;

/// Relative margin of the initial saturation guess above the data maximum.
pub const SATURATION_GUESS_MARGIN: f64 = 0.2;

/// Amplitude of the Gaussian envelope at the relaxation time.
pub const GAUSSIAN_RESIDUAL_AMPLITUDE: f64 = 0.05;

/// Relative standard deviation used when only a lifetime mean is known.
pub const DEFAULT_LIFETIME_REL_STD: f64 = 0.2;

/// Default saturation of per-capita in-use concrete stock (t/cap).
pub const CEMENT_SATURATION_LEVEL: f64 = 200.0;

/// Exponent weight of the proportional trade projection.
pub const TRADE_PROJECTION_WEIGHT: f64 = 0.5;

/// Machine epsilon used as a division guard.
pub const EPS: f64 = f64::EPSILON;

/// Years over which construction waste carbonates completely, in equal parts.
pub const CONSTRUCTION_WASTE_CARBONATION_YEARS: usize = 5;

/// Years demolished concrete lies exposed to air before its end-of-life use.
pub const DEMOLITION_EXPOSURE_YEARS: f64 = 0.4;
