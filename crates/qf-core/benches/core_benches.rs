//! Criterion benchmarks for qf-core hot paths.
//!
//! Covers: coefficient banding, currency conversion, overrides parsing,
//! and contribution aggregation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use num_bigint::BigUint;

use qf_core::aggregate::AggregatedContributions;
use qf_core::coefficient::score_to_coefficient;
use qf_core::currency::{fiat_to_token, token_to_fiat};
use qf_core::overrides::parse_coefficient_overrides;
use qf_core::types::{Contribution, ProportionalMatchOptions};

fn bench_coefficient(c: &mut Criterion) {
    let opts = ProportionalMatchOptions::default();
    c.bench_function("score_to_coefficient", |b| {
        b.iter(|| score_to_coefficient(black_box(&opts), black_box(Some(21.3))))
    });
}

fn bench_currency(c: &mut Criterion) {
    let amount = BigUint::from(1_234_567_890_123_456_789u64);

    c.bench_function("token_to_fiat", |b| {
        b.iter(|| token_to_fiat(black_box(&amount), 18, black_box(1843.27), 8))
    });

    c.bench_function("fiat_to_token", |b| {
        b.iter(|| fiat_to_token(black_box(250.75), black_box(1843.27), 18, 8))
    });
}

fn bench_overrides(c: &mut Criterion) {
    let mut csv = String::from("id,coefficient\n");
    for i in 0..10_000 {
        csv.push_str(&format!("0xvote{i},0.{}\n", i % 10));
    }

    c.bench_function("parse_overrides_10k_rows", |b| {
        b.iter(|| parse_coefficient_overrides(black_box(csv.as_bytes())))
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let contributions: Vec<Contribution> = (0..10_000u64)
        .map(|i| Contribution {
            voter: format!("0xvoter{}", i % 2_000),
            application_id: format!("{}", i % 50),
            amount: BigUint::from(i * 1_000_000_000),
        })
        .collect();

    c.bench_function("aggregate_10k_contributions", |b| {
        b.iter(|| {
            black_box(&contributions)
                .iter()
                .cloned()
                .collect::<AggregatedContributions>()
        })
    });
}

criterion_group!(
    benches,
    bench_coefficient,
    bench_currency,
    bench_overrides,
    bench_aggregate,
);
criterion_main!(benches);
