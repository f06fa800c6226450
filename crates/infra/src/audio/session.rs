//! Session preparation: allocate everything, then split by thread
//!
//! `EqSession::prepare` is the only place where queues, buffers, FFT plans
//! and the filter chain are allocated. It hands back the real-time
//! `EqProcessor` and the polling `PollingContext`, which share nothing but
//! lock-free queues, the published chain cells, the sample-rate cell and the
//! parameter store's dirty flag.

use crate::audio::accumulator::SampleBlockAccumulator;
use crate::audio::analyzer::ChannelAnalyzer;
use crate::audio::polling::PollingContext;
use crate::audio::processor::{EqProcessor, SharedSampleRate};
use pareq_core::domain::audio::{validate_sample_rate, AudioError, Channel};
use pareq_core::domain::config::{ConfigError, EqConfig};
use pareq_core::domain::engine::FilterChainEngine;
use pareq_core::domain::settings::ParameterStore;
use pareq_core::domain::snapshot::ParameterSnapshotter;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Widest display the analyzer paths are pre-sized for
pub const DEFAULT_DISPLAY_WIDTH: usize = 1024;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub struct EqSession;

impl EqSession {
    /// Prepare a session at `sample_rate`
    ///
    /// Validates `config`, builds one accumulator and analyzer per channel,
    /// the filter chain engine and a snapshotter subscribed to `store`. The
    /// first polling tick publishes the store's current settings.
    pub fn prepare(
        config: &EqConfig,
        store: Arc<dyn ParameterStore>,
        sample_rate: f64,
    ) -> Result<(EqProcessor, PollingContext)> {
        config.validate()?;
        let sample_rate = validate_sample_rate(sample_rate)?;

        let capacity = config.queues.capacity;
        let block_size = config.audio.block_size;

        let (engine, filters) = FilterChainEngine::new(sample_rate)?;
        let snapshotter = ParameterSnapshotter::new(store);
        let shared_rate = SharedSampleRate::new(sample_rate);

        let [(left_acc, left_blocks), (right_acc, right_blocks)] =
            Channel::ALL.map(|channel| SampleBlockAccumulator::new(channel, block_size, capacity));

        let analyzers = [
            ChannelAnalyzer::new(Channel::Left, left_blocks, &config.analyzer, capacity, DEFAULT_DISPLAY_WIDTH),
            ChannelAnalyzer::new(Channel::Right, right_blocks, &config.analyzer, capacity, DEFAULT_DISPLAY_WIDTH),
        ];

        let processor = EqProcessor::new(filters, [left_acc, right_acc], shared_rate.clone());
        let polling = PollingContext::new(
            engine,
            snapshotter,
            analyzers,
            shared_rate,
            config.response.clone(),
            config.analyzer.enabled,
            config.polling.rate_hz,
        );

        info!(
            sample_rate,
            block_size,
            capacity,
            fft_size = config.analyzer.fft_order.size(),
            poll_hz = config.polling.rate_hz,
            "Session prepared"
        );
        Ok((processor, polling))
    }
}
