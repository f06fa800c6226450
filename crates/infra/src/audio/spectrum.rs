//! Spectrum estimation: sliding mono buffer, windowed FFT, dB magnitudes
//!
//! Incoming blocks of any length are shifted into a mono buffer the size of
//! the transform, newest samples last. Each block produces one magnitude
//! spectrum of `size / 2` bins in decibels, pushed to a bounded slot queue.

use crate::audio::slot_queue::{bounded_slot_queue, SlotConsumer, SlotProducer};
use pareq_core::domain::config::FftOrder;
use pareq_core::domain::dsp::gain_to_db;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;
use tracing::info;

/// Blackman-Harris window of `size` points, normalized to unit mean
///
/// Symmetric over `size - 1`, then scaled so the coefficients sum to `size`.
pub fn blackman_harris(size: usize) -> Vec<f32> {
    const A0: f32 = 0.35875;
    const A1: f32 = 0.48829;
    const A2: f32 = 0.14128;
    const A3: f32 = 0.01168;

    if size < 2 {
        return vec![1.0; size];
    }

    let denominator = (size - 1) as f32;
    let mut window: Vec<f32> = (0..size)
        .map(|i| {
            let phase = 2.0 * PI * i as f32 / denominator;
            A0 - A1 * phase.cos() + A2 * (2.0 * phase).cos() - A3 * (3.0 * phase).cos()
        })
        .collect();

    let sum: f32 = window.iter().sum();
    if sum > 0.0 {
        let factor = size as f32 / sum;
        window.iter_mut().for_each(|w| *w *= factor);
    }
    window
}

/// Windowed magnitude spectrum of a sliding mono buffer
pub struct SpectrumEstimator {
    order: FftOrder,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    mono_buffer: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    negative_infinity_db: f32,
    capacity: usize,
    producer: SlotProducer<Vec<f32>>,
}

impl SpectrumEstimator {
    /// Create an estimator for `order` and the consumer of its spectra
    pub fn new(order: FftOrder, negative_infinity_db: f32, capacity: usize) -> (Self, SlotConsumer<Vec<f32>>) {
        let (parts, consumer) = EstimatorParts::allocate(order, negative_infinity_db, capacity);
        (
            Self {
                order,
                fft: parts.fft,
                window: parts.window,
                mono_buffer: parts.mono_buffer,
                spectrum: parts.spectrum,
                scratch: parts.scratch,
                negative_infinity_db,
                capacity,
                producer: parts.producer,
            },
            consumer,
        )
    }

    /// Switch transform size
    ///
    /// Recreates the window, plan, buffers and output queue and returns the
    /// new queue's consumer. Not real-time safe.
    pub fn change_order(&mut self, order: FftOrder) -> SlotConsumer<Vec<f32>> {
        let (parts, consumer) = EstimatorParts::allocate(order, self.negative_infinity_db, self.capacity);
        self.order = order;
        self.fft = parts.fft;
        self.window = parts.window;
        self.mono_buffer = parts.mono_buffer;
        self.spectrum = parts.spectrum;
        self.scratch = parts.scratch;
        self.producer = parts.producer;

        info!(fft_size = order.size(), "Spectrum estimator order changed");
        consumer
    }

    /// Shift `block` into the mono buffer and push the resulting spectrum
    ///
    /// Returns `false` if the output queue was full and the spectrum dropped.
    pub fn process_block(&mut self, block: &[f32]) -> bool {
        self.shift_in(block);
        self.produce()
    }

    /// Append `block` at the end of the mono buffer, discarding the oldest
    /// samples
    fn shift_in(&mut self, block: &[f32]) {
        let size = self.mono_buffer.len();
        if block.len() >= size {
            self.mono_buffer.copy_from_slice(&block[block.len() - size..]);
        } else {
            self.mono_buffer.copy_within(block.len().., 0);
            self.mono_buffer[size - block.len()..].copy_from_slice(block);
        }
    }

    /// Window, transform, normalize by the bin count and convert to dB
    fn produce(&mut self) -> bool {
        for ((bin, &sample), &w) in self.spectrum.iter_mut().zip(&self.mono_buffer).zip(&self.window) {
            *bin = Complex::new(sample * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let bins = self.order.bins();
        let floor = self.negative_infinity_db;
        let spectrum = &self.spectrum;

        self.producer.push_with(|magnitudes| {
            magnitudes.resize(bins, floor);
            for (out, value) in magnitudes.iter_mut().zip(spectrum.iter()) {
                let magnitude = value.norm() / bins as f32;
                *out = if magnitude.is_finite() {
                    gain_to_db(magnitude, floor)
                } else {
                    floor
                };
            }
        })
    }

    pub fn order(&self) -> FftOrder {
        self.order
    }

    pub fn fft_size(&self) -> usize {
        self.order.size()
    }

    /// Frequency span of one bin
    pub fn bin_width(&self, sample_rate: f64) -> f64 {
        sample_rate / self.order.size() as f64
    }

    pub fn negative_infinity_db(&self) -> f32 {
        self.negative_infinity_db
    }

    /// Current contents of the sliding buffer, oldest sample first
    pub fn mono_buffer(&self) -> &[f32] {
        &self.mono_buffer
    }

    /// Spectra dropped because the output queue was full
    pub fn dropped_count(&self) -> usize {
        self.producer.dropped_count()
    }
}

/// Everything that depends on the transform size
struct EstimatorParts {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    mono_buffer: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    producer: SlotProducer<Vec<f32>>,
}

impl EstimatorParts {
    fn allocate(order: FftOrder, negative_infinity_db: f32, capacity: usize) -> (Self, SlotConsumer<Vec<f32>>) {
        let size = order.size();
        let fft = FftPlanner::new().plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let (producer, consumer) = bounded_slot_queue(capacity, &vec![negative_infinity_db; order.bins()]);

        (
            Self {
                fft,
                window: blackman_harris(size),
                mono_buffer: vec![0.0; size],
                spectrum: vec![Complex::new(0.0, 0.0); size],
                scratch,
                producer,
            },
            consumer,
        )
    }
}
