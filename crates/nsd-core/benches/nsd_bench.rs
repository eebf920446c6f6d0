//! Benchmarks for NSD estimation, smoothing and fitting
//!
//! Run with: cargo bench -p nsd-core --bench nsd_bench
//! Parallel segment averaging: cargo bench -p nsd-core --bench nsd_bench --features parallel

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nsd_core::prelude::*;
use nsd_core::welch::{welch, Detrend};
use nsd_core::windows::{flattop_window, hft90d_window};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

fn test_series(samples: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(7);
    nsd_noise(samples, &[NoiseKind::White, NoiseKind::Pink], &mut rng)
        .unwrap_or_else(|_| vec![0.0; samples])
}

// ============================================================================
// Window Generation
// ============================================================================

fn bench_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_generation");

    for length in [1024usize, 16384, 262144].iter() {
        group.throughput(Throughput::Elements(*length as u64));
        group.bench_with_input(BenchmarkId::new("hft90d", length), length, |b, &n| {
            b.iter(|| hft90d_window(black_box(n)))
        });
        group.bench_with_input(BenchmarkId::new("flattop", length), length, |b, &n| {
            b.iter(|| flattop_window(black_box(n)))
        });
    }

    group.finish();
}

// ============================================================================
// Welch / NSD Estimation
// ============================================================================

fn bench_welch(c: &mut Criterion) {
    let mut group = c.benchmark_group("welch");
    group.measurement_time(Duration::from_secs(10));

    let series = test_series(1 << 20);
    let window = SpectralWindow::default();
    group.throughput(Throughput::Elements(series.len() as u64));

    for bins in [1usize << 10, 1 << 14, 1 << 18].iter() {
        group.bench_with_input(BenchmarkId::new("segment_length", bins), bins, |b, &l| {
            b.iter(|| welch(black_box(&series), 50.0, l, &window, Detrend::None))
        });
    }

    group.finish();
}

fn bench_estimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("nsd_estimate");
    group.sample_size(20);

    let series = test_series(1 << 18);
    group.throughput(Throughput::Elements(series.len() as u64));

    let estimator = NsdEstimator::new(50.0);
    group.bench_function("default_bins", |b| {
        b.iter(|| estimator.estimate(black_box(&series)))
    });

    let detrended = NsdEstimator::new(50.0).with_detrend(Detrend::Constant);
    group.bench_function("constant_detrend", |b| {
        b.iter(|| detrended.estimate(black_box(&series)))
    });

    group.finish();
}

// ============================================================================
// Post-processing
// ============================================================================

fn bench_post_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_processing");

    let series = test_series(1 << 18);
    let nsd = match NsdEstimator::new(50.0).with_bins(1 << 14).estimate(&series) {
        Ok(nsd) => nsd,
        Err(e) => panic!("estimate failed: {}", e),
    };

    for aggregate in [Aggregate::Mean, Aggregate::Median].iter() {
        group.bench_with_input(
            BenchmarkId::new("smooth", aggregate.name()),
            aggregate,
            |b, agg| b.iter(|| smooth(black_box(&nsd), 64, agg)),
        );
    }

    let smoothed = match smooth(&nsd, 64, &Aggregate::Median) {
        Ok(s) => s,
        Err(e) => panic!("smooth failed: {}", e),
    };
    group.bench_function("fit_linear", |b| b.iter(|| fit(black_box(&smoothed))));
    group.bench_function("fit_loglog", |b| {
        b.iter(|| fit_loglog(black_box(&smoothed)))
    });

    group.bench_function("nsd_rms", |b| b.iter(|| nsd_rms(black_box(&nsd))));

    group.finish();
}

criterion_group!(
    name = estimation_benches;
    config = Criterion::default();
    targets = bench_windows, bench_welch, bench_estimator
);

criterion_group!(
    name = post_benches;
    config = Criterion::default();
    targets = bench_post_processing
);

criterion_main!(estimation_benches, post_benches);
