//! Criterion benchmarks for equalizer processing on the audio thread
//!
//! Measures:
//! - Filter chain throughput per slope
//! - Full processor throughput (filters plus analysis tap)
//! - Host block size sensitivity

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pareq_benchmarks::{generate_silence, generate_white_noise};
use pareq_core::domain::audio::Channel;
use pareq_core::domain::config::EqConfig;
use pareq_core::domain::engine::FilterChainEngine;
use pareq_core::domain::settings::{ChainSettings, ParamId, ParameterTree, Slope};
use pareq_core::domain::response::Rect;
use pareq_infra::audio::EqSession;
use std::hint::black_box;
use std::sync::Arc;

const SAMPLE_RATE: f64 = 48000.0;

fn bench_filter_chain_slopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_chain_slope");
    let input = generate_white_noise(512);
    group.throughput(Throughput::Elements(input.len() as u64));

    for slope in Slope::ALL {
        let (mut engine, mut processor) = match FilterChainEngine::new(SAMPLE_RATE) {
            Ok(halves) => halves,
            Err(e) => panic!("engine setup failed: {e}"),
        };
        let settings = ChainSettings {
            low_cut_freq: 80.0,
            low_cut_slope: slope,
            high_cut_freq: 12000.0,
            high_cut_slope: slope,
            peak_gain_db: 6.0,
            ..ChainSettings::default()
        };
        if let Err(e) = engine.update_chain(&settings, SAMPLE_RATE) {
            panic!("update failed: {e}");
        }

        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::from_parameter(slope), &slope, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                processor.process(Channel::Left, black_box(&mut buffer));
            });
        });
    }

    group.finish();
}

fn bench_processor_block_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("eq_processor_block_size");

    for block_size in [64usize, 128, 256, 512, 1024, 2048] {
        let tree = Arc::new(ParameterTree::new());
        tree.set_value(ParamId::LowCutSlope, 3.0);
        tree.set_value(ParamId::HighCutSlope, 3.0);
        let (mut processor, mut polling) = match EqSession::prepare(&EqConfig::default(), tree, SAMPLE_RATE) {
            Ok(session) => session,
            Err(e) => panic!("session setup failed: {e}"),
        };
        let bounds = Rect::new(0.0, 0.0, 800.0, 300.0);
        polling.tick(bounds);

        let input = generate_white_noise(block_size);
        let mut left = input.clone();
        let mut right = input.clone();
        group.throughput(Throughput::Elements(block_size as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(block_size), &block_size, |b, _| {
            b.iter(|| {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                processor.ingest_stereo(black_box(&mut left), black_box(&mut right), SAMPLE_RATE);
                // Keep the analysis queues draining like a running editor would
                polling.tick(bounds);
            });
        });
    }

    group.finish();
}

fn bench_bypassed_chain(c: &mut Criterion) {
    let (mut engine, mut processor) = match FilterChainEngine::new(SAMPLE_RATE) {
        Ok(halves) => halves,
        Err(e) => panic!("engine setup failed: {e}"),
    };
    let settings = ChainSettings {
        low_cut_bypassed: true,
        peak_bypassed: true,
        high_cut_bypassed: true,
        ..ChainSettings::default()
    };
    if let Err(e) = engine.update_chain(&settings, SAMPLE_RATE) {
        panic!("update failed: {e}");
    }

    let mut buffer = generate_silence(512);
    c.bench_function("bypassed_chain_512", |b| {
        b.iter(|| processor.process(Channel::Right, black_box(&mut buffer)));
    });
}

criterion_group!(
    benches,
    bench_filter_chain_slopes,
    bench_processor_block_sizes,
    bench_bypassed_chain
);
criterion_main!(benches);
