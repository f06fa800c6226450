//! Criterion benchmarks for the spectrum analyzer pipeline
//!
//! Measures:
//! - Spectrum estimation per FFT order
//! - Path building per display width

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pareq_benchmarks::generate_sine_wave;
use pareq_core::domain::config::FftOrder;
use pareq_core::domain::response::Rect;
use pareq_infra::audio::{build_path, PathLayout, SpectrumEstimator};
use std::hint::black_box;

const SAMPLE_RATE: u32 = 48000;

fn bench_spectrum_estimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectrum_estimator");
    let block = generate_sine_wave(1000.0, SAMPLE_RATE, 512);

    for order in FftOrder::ALL {
        let (mut estimator, mut spectra) = SpectrumEstimator::new(order, -48.0, 30);
        let mut spectrum = Vec::with_capacity(order.bins());
        group.bench_with_input(BenchmarkId::from_parameter(order), &order, |b, _| {
            b.iter(|| {
                estimator.process_block(black_box(&block));
                spectra.pull(&mut spectrum);
            });
        });
    }

    group.finish();
}

fn bench_build_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_path");
    let order = FftOrder::Order2048;

    let (mut estimator, mut spectra) = SpectrumEstimator::new(order, -48.0, 30);
    estimator.process_block(&generate_sine_wave(1000.0, SAMPLE_RATE, order.size()));
    let mut spectrum = Vec::new();
    spectra.pull(&mut spectrum);

    for width in [300.0f32, 800.0, 1920.0] {
        let layout = PathLayout {
            bounds: Rect::new(0.0, 0.0, width, 300.0),
            fft_size: order.size(),
            bin_width: SAMPLE_RATE as f32 / order.size() as f32,
            negative_infinity_db: -48.0,
            resolution: 2,
        };
        let mut path = Vec::with_capacity(order.bins());
        group.bench_with_input(BenchmarkId::from_parameter(width), &layout, |b, layout| {
            b.iter(|| build_path(black_box(&spectrum), layout, &mut path));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_spectrum_estimator, bench_build_path);
criterion_main!(benches);
