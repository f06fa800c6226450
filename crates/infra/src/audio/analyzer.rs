//! Per-channel analysis pipeline on the polling side
//!
//! Drains accumulated blocks into the spectrum estimator, turns every new
//! spectrum into a polyline and keeps the most recent one for display.

use crate::audio::path::{CurvePathBuilder, PathLayout, Polyline};
use crate::audio::slot_queue::SlotConsumer;
use crate::audio::spectrum::SpectrumEstimator;
use pareq_core::domain::audio::Channel;
use pareq_core::domain::config::{AnalyzerConfig, FftOrder};
use pareq_core::domain::response::{Point, Rect};
use tracing::{info, trace};

/// Counts from one analysis pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    pub blocks: usize,
    pub spectra: usize,
    pub paths: usize,
}

/// Block queue → spectrum estimator → path builder for one channel
pub struct ChannelAnalyzer {
    channel: Channel,
    blocks: SlotConsumer<Vec<f32>>,
    incoming: Vec<f32>,
    estimator: SpectrumEstimator,
    spectra: SlotConsumer<Vec<f32>>,
    spectrum: Vec<f32>,
    builder: CurvePathBuilder,
    paths: SlotConsumer<Polyline>,
    path: Polyline,
    resolution: usize,
}

impl ChannelAnalyzer {
    /// Wire an analyzer onto the block queue of `channel`'s accumulator
    pub fn new(
        channel: Channel,
        blocks: SlotConsumer<Vec<f32>>,
        config: &AnalyzerConfig,
        capacity: usize,
        width_hint: usize,
    ) -> Self {
        let (estimator, spectra) = SpectrumEstimator::new(config.fft_order, config.negative_infinity_db, capacity);
        let (builder, paths) = CurvePathBuilder::new(capacity, width_hint);

        Self {
            channel,
            blocks,
            incoming: Vec::new(),
            estimator,
            spectra,
            spectrum: vec![config.negative_infinity_db; config.fft_order.bins()],
            builder,
            paths,
            path: Polyline::with_capacity(3 * width_hint.max(1)),
            resolution: config.path_resolution,
        }
    }

    /// Drain all pending work and keep the newest path
    ///
    /// Every available block updates the spectrum; every spectrum becomes a
    /// path inside `bounds`; of the queued paths only the last is kept.
    pub fn process(&mut self, bounds: Rect, sample_rate: f64) -> AnalysisStats {
        let mut stats = AnalysisStats::default();

        while self.blocks.pull(&mut self.incoming) {
            self.estimator.process_block(&self.incoming);
            stats.blocks += 1;
        }

        let layout = PathLayout {
            bounds,
            fft_size: self.estimator.fft_size(),
            bin_width: self.estimator.bin_width(sample_rate) as f32,
            negative_infinity_db: self.estimator.negative_infinity_db(),
            resolution: self.resolution,
        };
        while self.spectra.pull(&mut self.spectrum) {
            self.builder.generate_path(&self.spectrum, &layout);
            stats.spectra += 1;
        }

        stats.paths = self.paths.pull_latest(&mut self.path);

        trace!(
            channel = self.channel.name(),
            blocks = stats.blocks,
            spectra = stats.spectra,
            paths = stats.paths,
            "Analysis pass"
        );
        stats
    }

    /// Throw away queued blocks without analysing them
    ///
    /// Keeps the accumulator queue from filling with stale audio while the
    /// analyser is switched off.
    pub fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.blocks.pull_with(|_| ()) {
            discarded += 1;
        }
        discarded
    }

    /// Switch the transform size; the displayed path restarts from scratch
    pub fn change_order(&mut self, order: FftOrder) {
        self.spectra = self.estimator.change_order(order);
        self.spectrum.clear();
        self.spectrum.resize(order.bins(), self.estimator.negative_infinity_db());
        self.path.clear();
        info!(channel = self.channel.name(), fft_size = order.size(), "Analyzer order changed");
    }

    /// Attach to a re-prepared accumulator
    pub fn set_block_source(&mut self, blocks: SlotConsumer<Vec<f32>>) {
        self.blocks = blocks;
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Most recent polyline
    pub fn path(&self) -> &[Point] {
        &self.path
    }

    /// Most recent dB spectrum, `fft_size / 2` bins
    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    pub fn order(&self) -> FftOrder {
        self.estimator.order()
    }

    /// Centre frequency of the loudest bin of the latest spectrum
    pub fn peak_frequency(&self, sample_rate: f64) -> Option<f64> {
        let floor = self.estimator.negative_infinity_db();
        self.spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .filter(|(_, db)| **db > floor)
            .map(|(bin, _)| bin as f64 * self.estimator.bin_width(sample_rate))
    }

    /// Blocks, spectra and paths dropped on full queues
    pub fn dropped_counts(&self) -> AnalysisStats {
        AnalysisStats {
            blocks: self.blocks.dropped_count(),
            spectra: self.estimator.dropped_count(),
            paths: self.builder.dropped_count(),
        }
    }
}
