//! Criterion benchmarks for the breadth hot paths.
//!
//! Benchmarks:
//! 1. Matrix assembly (dedup + pivot) at universe scale
//! 2. Rolling extrema kernel over a 200-day window
//! 3. Full breadth computation for a mid-size matrix

use breadth_core::data::assemble::assemble;
use breadth_core::domain::PriceObservation;
use breadth_core::engine::{compute_breadth, rolling_max, BreadthParams};
use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn make_observations(instruments: usize, days: usize) -> Vec<PriceObservation> {
    let base = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut out = Vec::with_capacity(instruments * days);
    for inst in 0..instruments {
        for day in 0..days {
            let close = 100.0 + ((inst * 7 + day) as f64 * 0.1).sin() * 10.0;
            out.push(PriceObservation {
                date: base + chrono::Duration::days(day as i64),
                instrument: format!("{:04}", 1000 + inst),
                close,
            });
        }
    }
    out
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");
    for instruments in [100usize, 500] {
        let observations = make_observations(instruments, 250);
        group.bench_with_input(
            BenchmarkId::from_parameter(instruments),
            &observations,
            |b, obs| b.iter(|| assemble(black_box(obs))),
        );
    }
    group.finish();
}

fn bench_rolling(c: &mut Criterion) {
    let series: Vec<Option<f64>> = (0..300)
        .map(|i| Some(100.0 + (i as f64 * 0.1).sin() * 10.0))
        .collect();
    c.bench_function("rolling_max_200", |b| {
        b.iter(|| rolling_max(black_box(&series), 200, 150))
    });
}

fn bench_breadth(c: &mut Criterion) {
    let observations = make_observations(500, 250);
    let matrix = assemble(&observations);
    let params = BreadthParams::default();
    c.bench_function("compute_breadth_500x250", |b| {
        b.iter(|| compute_breadth(black_box(&matrix), None, params))
    });
}

criterion_group!(benches, bench_assemble, bench_rolling, bench_breadth);
criterion_main!(benches);
