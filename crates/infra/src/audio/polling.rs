//! Polling half of an equalizer session
//!
//! Driven by a timer at the configured rate on a non-real-time thread. Each
//! tick applies pending parameter changes to the filter chain, drains the
//! analysis queues of both channels and refreshes the response curve.

use crate::audio::analyzer::{AnalysisStats, ChannelAnalyzer};
use crate::audio::processor::SharedSampleRate;
use crate::audio::slot_queue::SlotConsumer;
use pareq_core::domain::audio::Channel;
use pareq_core::domain::config::{FftOrder, ResponseConfig};
use pareq_core::domain::engine::FilterChainEngine;
use pareq_core::domain::response::{Point, Rect, ResponseCurve, ResponseCurveCache};
use pareq_core::domain::settings::ParamId;
use pareq_core::domain::snapshot::ParameterSnapshotter;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Generation published by this tick, if the parameters changed
    pub generation: Option<u64>,
    pub analyser_enabled: bool,
    /// Per channel, left then right
    pub analysis: [AnalysisStats; 2],
}

pub struct PollingContext {
    engine: FilterChainEngine,
    snapshotter: ParameterSnapshotter,
    analyzers: [ChannelAnalyzer; 2],
    response: ResponseCurveCache,
    response_range: ResponseConfig,
    sample_rate: SharedSampleRate,
    applied_sample_rate: f64,
    analyzer_allowed: bool,
    interval: Duration,
}

impl PollingContext {
    pub(crate) fn new(
        engine: FilterChainEngine,
        snapshotter: ParameterSnapshotter,
        analyzers: [ChannelAnalyzer; 2],
        sample_rate: SharedSampleRate,
        response_range: ResponseConfig,
        analyzer_allowed: bool,
        rate_hz: u32,
    ) -> Self {
        let applied_sample_rate = sample_rate.load();
        Self {
            engine,
            snapshotter,
            analyzers,
            response: ResponseCurveCache::new(),
            response_range,
            sample_rate,
            applied_sample_rate,
            analyzer_allowed,
            interval: Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64),
        }
    }

    /// One polling tick for a display area of `bounds`
    pub fn tick(&mut self, bounds: Rect) -> TickReport {
        let reported = self.sample_rate.load();
        if reported > 0.0 && reported != self.applied_sample_rate {
            info!(
                from = self.applied_sample_rate,
                to = reported,
                "Sample rate changed, redesigning filters"
            );
            self.applied_sample_rate = reported;
            self.snapshotter.mark_dirty();
        }

        let generation = match self.snapshotter.tick(&mut self.engine, self.applied_sample_rate) {
            Ok(generation) => generation,
            Err(e) => {
                warn!(error = %e, "Chain update skipped");
                None
            }
        };

        let analyser_enabled = self.analyser_enabled();
        let mut analysis = [AnalysisStats::default(); 2];
        for (stats, analyzer) in analysis.iter_mut().zip(self.analyzers.iter_mut()) {
            if analyser_enabled {
                *stats = analyzer.process(bounds, self.applied_sample_rate);
            } else {
                analyzer.discard_pending();
            }
        }

        let width = bounds.width.max(0.0) as usize;
        self.response.get(self.engine.current(), width);

        if generation.is_some() {
            debug!(?generation, "Polling tick applied parameter changes");
        }
        TickReport {
            generation,
            analyser_enabled,
            analysis,
        }
    }

    /// Time between ticks at the configured rate
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Analyser allowed by configuration and switched on in the store
    pub fn analyser_enabled(&self) -> bool {
        self.analyzer_allowed && self.snapshotter.store().get_bool(ParamId::AnalyserEnabled)
    }

    /// Most recent analyzer polyline of `channel`
    pub fn path(&self, channel: Channel) -> &[Point] {
        self.analyzers[channel.index()].path()
    }

    /// Most recent dB spectrum of `channel`
    pub fn spectrum(&self, channel: Channel) -> &[f32] {
        self.analyzers[channel.index()].spectrum()
    }

    /// Frequency of the loudest bin in `channel`'s latest spectrum
    pub fn peak_frequency(&self, channel: Channel) -> Option<f64> {
        self.analyzers[channel.index()].peak_frequency(self.applied_sample_rate)
    }

    pub fn analyzer(&self, channel: Channel) -> &ChannelAnalyzer {
        &self.analyzers[channel.index()]
    }

    /// Response curve of the current chain, `width` points wide
    pub fn response_curve(&mut self, width: usize) -> &ResponseCurve {
        self.response.get(self.engine.current(), width)
    }

    /// Response curve mapped into `bounds` over the configured dB range
    pub fn response_polyline(&mut self, bounds: Rect) -> Vec<Point> {
        let (min_db, max_db) = (self.response_range.min_db, self.response_range.max_db);
        let width = bounds.width.max(0.0) as usize;
        self.response
            .get(self.engine.current(), width)
            .to_polyline(bounds, min_db, max_db)
    }

    pub fn engine(&self) -> &FilterChainEngine {
        &self.engine
    }

    pub fn snapshotter(&self) -> &ParameterSnapshotter {
        &self.snapshotter
    }

    /// Sample rate the current chain was designed for
    pub fn sample_rate(&self) -> f64 {
        self.applied_sample_rate
    }

    /// Switch both analyzers to a new transform size
    pub fn change_order(&mut self, order: FftOrder) {
        for analyzer in &mut self.analyzers {
            analyzer.change_order(order);
        }
    }

    /// Attach the block queues returned by `EqProcessor::prepare_block_size`
    pub fn set_block_sources(&mut self, sources: [SlotConsumer<Vec<f32>>; 2]) {
        for (analyzer, source) in self.analyzers.iter_mut().zip(sources) {
            analyzer.set_block_source(source);
        }
    }
}
