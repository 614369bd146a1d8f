// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Property-Based Tests (proptest) for mfa-core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for mfa-core using proptest.
//!
//! Covers: survival curves, dynamic stock balance, stock-driven inversion,
//! trade balancing.

use mfa_core::dsm::{inflow_driven, stock_driven};
use mfa_core::lifetime::{survival, survival_table};
use mfa_core::trade::{BalancePolicy, Trade};
use mfa_math::named_array::NamedDimArray;
use mfa_types::config::LifetimeKind;
use mfa_types::dims::{Dimension, DimensionSet};
use ndarray::Array1;
use proptest::prelude::*;

const KINDS: [LifetimeKind; 4] = [
    LifetimeKind::Normal,
    LifetimeKind::FoldedNormal,
    LifetimeKind::LogNormal,
    LifetimeKind::Weibull,
];

fn lane(n: usize, seed: u64) -> Array1<f64> {
    Array1::from_shape_fn(n, |i| ((seed as f64 * 0.61 + i as f64 * 1.7).sin().abs() + 0.1) * 5.0)
}

// ── Survival Curves ──────────────────────────────────────────────────

proptest! {
    /// Survival starts below one and never increases with age.
    #[test]
    fn survival_is_monotone(
        kind_idx in 0usize..4,
        mean in 2.0f64..60.0,
        rel in 0.05f64..0.6,
    ) {
        let kind = KINDS[kind_idx];
        let std = mean * rel;
        let mut prev = 1.0;
        for age in 0..120 {
            let s = survival(kind, age as f64, mean, std).unwrap();
            prop_assert!((0.0..=1.0).contains(&s));
            prop_assert!(s <= prev + 1e-12, "{kind:?} rose at age {age}: {prev} -> {s}");
            prev = s;
        }
    }
}

// ── Dynamic Stock Models ─────────────────────────────────────────────

proptest! {
    /// Inflow-driven lanes satisfy inflow - outflow = stock change every year.
    #[test]
    fn inflow_driven_balances(
        n in 2usize..40,
        seed in 0u64..200,
        kind_idx in 0usize..4,
        mean in 3.0f64..30.0,
    ) {
        let sf = survival_table(KINDS[kind_idx], &vec![mean; n], &vec![0.3 * mean; n]).unwrap();
        let out = inflow_driven(lane(n, seed).view(), &sf).unwrap();
        prop_assert!(out.balance_residual() < 1e-9);
        prop_assert!(out.outflow.iter().all(|&v| v >= -1e-12));
    }

    /// Feeding the stock of an inflow-driven run back recovers the inflow.
    #[test]
    fn stock_driven_inverts_inflow_driven(
        n in 2usize..30,
        seed in 0u64..200,
        mean in 3.0f64..30.0,
    ) {
        let sf = survival_table(LifetimeKind::Normal, &vec![mean; n], &vec![0.2 * mean; n]).unwrap();
        let inflow = lane(n, seed);
        let forward = inflow_driven(inflow.view(), &sf).unwrap();
        let back = stock_driven(forward.stock.view(), &sf, false).unwrap();
        for (a, b) in back.inflow.iter().zip(inflow.iter()) {
            prop_assert!((a - b).abs() < 1e-6 * (1.0 + b.abs()));
        }
        prop_assert!(back.balance_residual() < 1e-9);
    }
}

// ── Trade Balancing ──────────────────────────────────────────────────

fn trade_dims(n_reg: usize, n_time: usize) -> DimensionSet {
    let regions: Vec<String> = (0..n_reg).map(|i| format!("R{i}")).collect();
    let refs: Vec<&str> = regions.iter().map(String::as_str).collect();
    DimensionSet::new(vec![
        Dimension::years('t', "Time", 2000, 2000 + n_time as i64 - 1).unwrap(),
        Dimension::from_strs('r', "Region", &refs).unwrap(),
    ])
    .unwrap()
}

fn side(dims: &DimensionSet, seed: u64) -> NamedDimArray {
    NamedDimArray::from_fn(dims, |idx| {
        ((seed as f64 * 0.43 + idx[0] as f64 * 0.9 + idx[1] as f64 * 2.3).cos() + 1.05) * 3.0
    })
}

proptest! {
    /// Every policy leaves global imports equal to global exports.
    #[test]
    fn balance_closes_globally(
        n_reg in 2usize..8,
        n_time in 1usize..6,
        seed in 0u64..100,
        policy_idx in 0usize..8,
    ) {
        let dims = trade_dims(n_reg, n_time);
        let trade = Trade::new(side(&dims, seed), side(&dims, seed + 7)).unwrap();
        let balanced = trade.balance(BalancePolicy::ALL[policy_idx]).unwrap();
        let scale = trade.imports().max_abs() + trade.exports().max_abs();
        prop_assert!(balanced.global_imbalance().unwrap().max_abs() < 1e-9 * scale.max(1.0));
    }

    /// Scaling never flips a region between net importer and net exporter.
    #[test]
    fn scaling_preserves_direction(
        n_reg in 2usize..8,
        n_time in 1usize..6,
        seed in 0u64..100,
    ) {
        let dims = trade_dims(n_reg, n_time);
        let trade = Trade::new(side(&dims, seed), side(&dims, seed + 3)).unwrap();
        let before = trade.net_imports().unwrap();
        let after = trade.balance(BalancePolicy::Scaling).unwrap().net_imports().unwrap();
        for (a, b) in after.values().iter().zip(before.values().iter()) {
            prop_assert!(a * b >= -1e-12);
            prop_assert!(a.abs() <= b.abs() * 2.0 + 1e-12);
        }
    }
}
