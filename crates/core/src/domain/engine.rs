//! Filter chain engine: coefficient hot-swap between threads
//!
//! The engine is split in two halves at construction:
//! - `FilterChainEngine` lives on a non-real-time thread. `update_chain`
//!   designs a complete `ChainConfig` and publishes it to every channel with
//!   a single pointer swap per channel.
//! - `FilterChainProcessor` lives on the real-time thread and renders blocks
//!   with whatever configuration was last published.
//!
//! Readers never observe a half-updated chain: a configuration is fully built
//! before it becomes reachable and is never mutated afterwards.

use crate::domain::audio::{validate_sample_rate, Channel, Result};
use crate::domain::chain::{ChainConfig, MonoChannelChain};
use crate::domain::gc::gc_handle;
use crate::domain::settings::ChainSettings;
use basedrop::{Handle, Shared, SharedCell};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Non-real-time owner of the published chain configuration
pub struct FilterChainEngine {
    handle: Handle,
    cells: [Arc<SharedCell<ChainConfig>>; 2],
    current: Shared<ChainConfig>,
    generation: u64,
}

/// Real-time half: one mono chain per channel
pub struct FilterChainProcessor {
    chains: [MonoChannelChain; 2],
}

impl FilterChainEngine {
    /// Create both halves with a pass-through configuration
    pub fn new(sample_rate: f64) -> Result<(Self, FilterChainProcessor)> {
        Self::with_handle(gc_handle(), sample_rate)
    }

    /// Create both halves, allocating snapshots through `handle`
    pub fn with_handle(handle: Handle, sample_rate: f64) -> Result<(Self, FilterChainProcessor)> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        let current = Shared::new(&handle, ChainConfig::passthrough(&handle, sample_rate));
        let cells: [Arc<SharedCell<ChainConfig>>; 2] =
            std::array::from_fn(|_| Arc::new(SharedCell::new(current.clone())));

        let processor = FilterChainProcessor {
            chains: std::array::from_fn(|i| MonoChannelChain::new(Arc::clone(&cells[i]))),
        };

        info!(sample_rate, "Filter chain engine prepared");
        Ok((
            Self {
                handle,
                cells,
                current,
                generation: 0,
            },
            processor,
        ))
    }

    /// Redesign every stage from `settings` and publish the result
    ///
    /// Returns the generation of the published configuration. A non-positive
    /// or non-finite sample rate is rejected before anything is touched.
    pub fn update_chain(&mut self, settings: &ChainSettings, sample_rate: f64) -> Result<u64> {
        let sample_rate = validate_sample_rate(sample_rate).map_err(|e| {
            warn!(sample_rate, "Rejected chain update");
            e
        })?;
        settings.validate()?;

        let generation = self.generation + 1;
        let config = ChainConfig::build(&self.handle, settings, sample_rate, generation)?;
        let shared = Shared::new(&self.handle, config);

        for cell in &self.cells {
            cell.set(shared.clone());
        }
        self.current = shared;
        self.generation = generation;

        debug!(
            generation,
            peak_freq = settings.peak_freq,
            peak_gain_db = settings.peak_gain_db,
            peak_q = settings.peak_quality,
            low_cut = settings.low_cut_freq,
            low_slope = %settings.low_cut_slope,
            high_cut = settings.high_cut_freq,
            high_slope = %settings.high_cut_slope,
            "Chain updated"
        );
        Ok(generation)
    }

    /// Configuration most recently published
    pub fn current(&self) -> &ChainConfig {
        &self.current
    }

    /// Shared handle to the current configuration, for display threads
    pub fn snapshot(&self) -> Shared<ChainConfig> {
        self.current.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl FilterChainProcessor {
    /// Run one block of `channel` through its chain in place
    #[inline]
    pub fn process(&mut self, channel: Channel, block: &mut [f32]) {
        self.chains[channel.index()].process(block);
    }

    pub fn chain(&self, channel: Channel) -> &MonoChannelChain {
        &self.chains[channel.index()]
    }

    /// Clear every delay line, e.g. when playback restarts
    pub fn reset(&mut self) {
        self.chains.iter_mut().for_each(MonoChannelChain::reset);
    }
}
