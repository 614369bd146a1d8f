// ─────────────────────────────────────────────────────────────────────
// SCPN MFA Core — Dynamic Stock Model Benchmarks
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mfa_core::dsm::{inflow_driven, stock_driven};
use mfa_core::lifetime::survival_table;
use mfa_types::config::LifetimeKind;
use ndarray::Array1;
use std::hint::black_box;

fn bench_survival_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("survival_table");
    for kind in [LifetimeKind::Normal, LifetimeKind::LogNormal, LifetimeKind::Weibull] {
        group.bench_function(format!("{kind:?}_200y"), |b| {
            b.iter(|| black_box(survival_table(kind, &[25.0; 200], &[5.0; 200]).unwrap()))
        });
    }
    group.finish();
}

fn bench_dsm(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsm");
    for n in [50usize, 100, 200] {
        let sf = survival_table(LifetimeKind::Normal, &vec![30.0; n], &vec![6.0; n]).unwrap();
        let inflow = Array1::from_shape_fn(n, |t| 1.0 + 0.03 * t as f64);
        let stock = inflow_driven(inflow.view(), &sf).unwrap().stock;
        group.bench_with_input(BenchmarkId::new("inflow_driven", n), &n, |b, _| {
            b.iter(|| black_box(inflow_driven(inflow.view(), &sf).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("stock_driven", n), &n, |b, _| {
            b.iter(|| black_box(stock_driven(stock.view(), &sf, true).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_survival_table, bench_dsm);
criterion_main!(benches);
