//! Integration tests for the equalizer core
//!
//! These tests drive the public API across crates: the slot queue, the
//! analysis pipeline, the filter chain and its hot-swap protocol, and the
//! parameter snapshotter feeding it.

use pareq_core::domain::audio::Channel;
use pareq_core::domain::chain::{ChainConfig, ChainPosition};
use pareq_core::domain::config::{EqConfig, FftOrder};
use pareq_core::domain::dsp::CASCADE_LEN;
use pareq_core::domain::engine::FilterChainEngine;
use pareq_core::domain::gc::gc_handle;
use pareq_core::domain::response::Rect;
use pareq_core::domain::settings::{ChainSettings, ParamId, ParameterStore, ParameterTree, Slope};
use pareq_core::domain::snapshot::ParameterSnapshotter;
use pareq_infra::audio::{bounded_slot_queue, EqSession, SampleBlockAccumulator, SpectrumEstimator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const SAMPLE_RATE: f64 = 48000.0;

fn generate_sine_wave(frequency: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| 2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE as f32)
        .map(|phase| phase.sin())
        .collect()
}

fn magnitude_db(config: &ChainConfig, frequency: f64) -> f64 {
    20.0 * config.magnitude_for_frequency(frequency).log10()
}

fn impulse(len: usize) -> Vec<f32> {
    let mut block = vec![0.0; len];
    block[0] = 1.0;
    block
}

// ============================================================================
// QUEUE
// ============================================================================

#[test]
fn test_queue_overflow_then_drain_in_order() {
    let (mut tx, mut rx) = bounded_slot_queue(30, &0u32);

    let accepted: Vec<bool> = (0..35u32).map(|i| tx.push(&i)).collect();
    assert_eq!(accepted.iter().filter(|&&ok| ok).count(), 30);
    assert!(accepted[..30].iter().all(|&ok| ok));
    assert!(accepted[30..].iter().all(|&ok| !ok));

    let mut out = 0;
    for expected in 0..30u32 {
        assert!(rx.pull(&mut out));
        assert_eq!(out, expected);
    }
    assert!(!rx.pull(&mut out));
}

#[test]
fn test_queue_default_capacity_from_config() {
    let config = EqConfig::default();
    let (tx, _rx) = bounded_slot_queue(config.queues.capacity, &Vec::<f32>::new());
    assert_eq!(tx.capacity(), 30);
}

// ============================================================================
// FILTER RESPONSE
// ============================================================================

#[test]
fn test_peak_boost_response() {
    let settings = ChainSettings {
        peak_freq: 1000.0,
        peak_gain_db: 6.0,
        peak_quality: 1.0,
        low_cut_bypassed: true,
        high_cut_bypassed: true,
        peak_bypassed: false,
        ..ChainSettings::default()
    };
    let config = ChainConfig::build(&gc_handle(), &settings, SAMPLE_RATE, 1).unwrap();

    assert!((magnitude_db(&config, 1000.0) - 6.0).abs() < 0.5);
    assert!(magnitude_db(&config, 20.0).abs() < 0.5);
    assert!(magnitude_db(&config, 20000.0).abs() < 1.0);
}

#[test]
fn test_steep_low_cut_attenuation() {
    let settings = ChainSettings {
        low_cut_freq: 500.0,
        low_cut_slope: Slope::Db48,
        peak_bypassed: true,
        high_cut_bypassed: true,
        low_cut_bypassed: false,
        ..ChainSettings::default()
    };
    let config = ChainConfig::build(&gc_handle(), &settings, SAMPLE_RATE, 1).unwrap();

    let passband = magnitude_db(&config, 5000.0);
    let stopband = magnitude_db(&config, 100.0);
    assert!(passband.abs() < 0.5);
    assert!(passband - stopband >= 24.0, "only {} dB down", passband - stopband);
}

#[test]
fn test_slope_activates_cumulative_stages() {
    for low in Slope::ALL {
        for high in Slope::ALL {
            let settings = ChainSettings {
                low_cut_slope: low,
                high_cut_slope: high,
                ..ChainSettings::default()
            };
            let config = ChainConfig::build(&gc_handle(), &settings, SAMPLE_RATE, 1).unwrap();

            for (cascade, slope) in [(&config.low_cut, low), (&config.high_cut, high)] {
                assert_eq!(cascade.active_stage_count(), slope.index() + 1);
                for stage in 0..CASCADE_LEN {
                    assert_eq!(cascade.is_stage_active(stage), stage <= slope.index());
                }
            }
        }
    }
}

#[test]
fn test_bypass_flags_follow_settings() {
    let settings = ChainSettings {
        low_cut_bypassed: true,
        peak_bypassed: true,
        high_cut_bypassed: false,
        ..ChainSettings::default()
    };
    let config = ChainConfig::build(&gc_handle(), &settings, SAMPLE_RATE, 1).unwrap();

    assert!(config.is_bypassed(ChainPosition::LowCut));
    assert!(config.is_bypassed(ChainPosition::Peak));
    assert!(!config.is_bypassed(ChainPosition::HighCut));
}

#[test]
fn test_update_chain_rejects_non_positive_sample_rate() {
    let (mut engine, _processor) = FilterChainEngine::new(SAMPLE_RATE).unwrap();
    assert!(engine.update_chain(&ChainSettings::default(), 0.0).is_err());
    assert!(engine.update_chain(&ChainSettings::default(), -44100.0).is_err());
    assert!(engine.update_chain(&ChainSettings::default(), f64::NAN).is_err());
    assert_eq!(engine.generation(), 0);
}

// ============================================================================
// HOT SWAP
// ============================================================================

fn impulse_response(settings: &ChainSettings, len: usize) -> Vec<f32> {
    let (mut engine, mut processor) = FilterChainEngine::new(SAMPLE_RATE).unwrap();
    engine.update_chain(settings, SAMPLE_RATE).unwrap();
    let mut block = impulse(len);
    processor.process(Channel::Left, &mut block);
    block
}

#[test]
fn test_concurrent_updates_never_mix_configurations() {
    let boost = ChainSettings {
        peak_freq: 1000.0,
        peak_gain_db: 12.0,
        low_cut_slope: Slope::Db12,
        ..ChainSettings::default()
    };
    let cut = ChainSettings {
        peak_freq: 3000.0,
        peak_gain_db: -12.0,
        low_cut_freq: 200.0,
        low_cut_slope: Slope::Db48,
        high_cut_freq: 8000.0,
        high_cut_slope: Slope::Db36,
        ..ChainSettings::default()
    };
    const LEN: usize = 256;
    let expected = [impulse_response(&boost, LEN), impulse_response(&cut, LEN)];
    assert_ne!(expected[0], expected[1]);

    let (mut engine, mut processor) = FilterChainEngine::new(SAMPLE_RATE).unwrap();
    engine.update_chain(&boost, SAMPLE_RATE).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let renderer = {
        let stop = Arc::clone(&stop);
        let expected = expected.clone();
        thread::spawn(move || {
            let mut blocks = 0usize;
            let mut seen = [false; 2];
            while !stop.load(Ordering::Acquire) || blocks == 0 {
                processor.reset();
                let mut block = impulse(LEN);
                processor.process(Channel::Left, &mut block);

                let matched = expected.iter().position(|ir| *ir == block);
                assert!(matched.is_some(), "block rendered with a mixed configuration");
                if let Some(index) = matched {
                    seen[index] = true;
                }
                blocks += 1;
            }
            (blocks, seen)
        })
    };

    for i in 0..2000 {
        let settings = if i % 2 == 0 { &cut } else { &boost };
        engine.update_chain(settings, SAMPLE_RATE).unwrap();
        if i % 64 == 0 {
            thread::yield_now();
        }
    }
    stop.store(true, Ordering::Release);

    let (blocks, seen) = renderer.join().unwrap();
    assert!(blocks > 0);
    assert!(seen[0] || seen[1]);
    assert_eq!(engine.generation(), 2001);
}

// ============================================================================
// SNAPSHOTTER
// ============================================================================

#[test]
fn test_notifications_during_ticks_are_not_lost() {
    let tree = Arc::new(ParameterTree::new());
    let snapshotter = ParameterSnapshotter::new(tree.clone());
    let (mut engine, _processor) = FilterChainEngine::new(SAMPLE_RATE).unwrap();

    let writer = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            for step in 0..=480 {
                tree.set_value(ParamId::PeakGain, -24.0 + step as f32 * 0.1);
            }
        })
    };

    while !writer.is_finished() {
        snapshotter.tick(&mut engine, SAMPLE_RATE).unwrap();
    }
    writer.join().unwrap();
    snapshotter.tick(&mut engine, SAMPLE_RATE).unwrap();

    let final_gain = tree.get_value(ParamId::PeakGain);
    let settings = snapshotter.snapshot().unwrap();
    assert_eq!(settings.peak_gain_db, final_gain);

    // The engine has applied the final value
    let applied = magnitude_db(engine.current(), settings.peak_freq as f64);
    assert!((applied - final_gain as f64).abs() < 0.1);
}

// ============================================================================
// ANALYSIS PIPELINE
// ============================================================================

#[test]
fn test_accumulator_to_estimator_finds_tone() {
    let (mut accumulator, mut blocks) = SampleBlockAccumulator::new(Channel::Left, 512, 30);
    let (mut estimator, mut spectra) = SpectrumEstimator::new(FftOrder::Order2048, -48.0, 30);

    accumulator.update(&generate_sine_wave(1000.0, 2048));

    let mut block = Vec::new();
    while blocks.pull(&mut block) {
        estimator.process_block(&block);
    }

    let mut spectrum = Vec::new();
    assert_eq!(spectra.pull_latest(&mut spectrum), 4);

    let peak_bin = spectrum
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    let bin_width = estimator.bin_width(SAMPLE_RATE);
    let peak_freq = peak_bin as f64 * bin_width;
    assert!((peak_freq - 1000.0).abs() <= bin_width, "peak at {peak_freq} Hz");
}

#[test]
fn test_spectrum_levels_are_monotonic_in_amplitude() {
    let mut previous = f32::NEG_INFINITY;
    for amplitude in [0.001f32, 0.01, 0.1, 0.5, 1.0] {
        let (mut estimator, mut spectra) = SpectrumEstimator::new(FftOrder::Order2048, -48.0, 30);
        let tone: Vec<f32> = generate_sine_wave(750.0, 2048).iter().map(|s| s * amplitude).collect();
        estimator.process_block(&tone);

        let mut spectrum = Vec::new();
        spectra.pull(&mut spectrum);
        assert!(spectrum[32] >= previous);
        previous = spectrum[32];
    }
}

#[test]
fn test_session_round_trip_across_threads() {
    let tree = Arc::new(ParameterTree::new());
    let (mut processor, mut polling) = EqSession::prepare(&EqConfig::default(), tree.clone(), SAMPLE_RATE).unwrap();
    let bounds = Rect::new(0.0, 0.0, 800.0, 300.0);
    polling.tick(bounds);

    tree.set_value(ParamId::HighCutFreq, 2000.0);
    tree.set_value(ParamId::HighCutSlope, 3.0);
    assert_eq!(polling.tick(bounds).generation, Some(2));

    let audio = thread::spawn(move || {
        // 5 kHz sits well above the 2 kHz high cut, 500 Hz well below it
        let mut low = generate_sine_wave(500.0, 4096);
        let mut high = generate_sine_wave(5000.0, 4096);
        processor.ingest(Channel::Left, &mut low, SAMPLE_RATE);
        processor.ingest(Channel::Right, &mut high, SAMPLE_RATE);
        processor
    });
    let _processor = audio.join().unwrap();

    polling.tick(bounds);
    let left_peak = polling.peak_frequency(Channel::Left).unwrap();
    assert!((left_peak - 500.0).abs() <= SAMPLE_RATE / 2048.0);

    let left_level = polling.spectrum(Channel::Left).iter().cloned().fold(f32::MIN, f32::max);
    let right_level = polling.spectrum(Channel::Right).iter().cloned().fold(f32::MIN, f32::max);
    assert!(left_level - right_level > 24.0);
}
