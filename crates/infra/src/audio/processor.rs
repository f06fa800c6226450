//! Real-time half of an equalizer session
//!
//! `EqProcessor` is handed to the audio callback. Per host block it runs the
//! channel's filter chain in place and feeds the filtered samples to that
//! channel's accumulator. It never allocates, locks or logs.

use crate::audio::accumulator::SampleBlockAccumulator;
use crate::audio::slot_queue::SlotConsumer;
use pareq_core::domain::audio::Channel;
use pareq_core::domain::engine::FilterChainProcessor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Host sample rate as last reported by the audio thread
///
/// Stored as raw `f64` bits; zero means nothing reported yet.
#[derive(Debug, Clone, Default)]
pub struct SharedSampleRate {
    bits: Arc<AtomicU64>,
}

impl SharedSampleRate {
    pub fn new(sample_rate: f64) -> Self {
        let shared = Self::default();
        shared.store(sample_rate);
        shared
    }

    /// Record `sample_rate` if it is positive and finite
    #[inline]
    pub fn store(&self, sample_rate: f64) {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return;
        }
        let bits = sample_rate.to_bits();
        if self.bits.load(Ordering::Relaxed) != bits {
            self.bits.store(bits, Ordering::Release);
        }
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Filter chains plus analysis taps for both channels
pub struct EqProcessor {
    filters: FilterChainProcessor,
    accumulators: [SampleBlockAccumulator; 2],
    sample_rate: SharedSampleRate,
}

impl EqProcessor {
    pub(crate) fn new(
        filters: FilterChainProcessor,
        accumulators: [SampleBlockAccumulator; 2],
        sample_rate: SharedSampleRate,
    ) -> Self {
        Self {
            filters,
            accumulators,
            sample_rate,
        }
    }

    /// Equalize one host block of `channel` in place and tap it for analysis
    #[inline]
    pub fn ingest(&mut self, channel: Channel, block: &mut [f32], sample_rate: f64) {
        self.sample_rate.store(sample_rate);
        self.filters.process(channel, block);
        self.accumulators[channel.index()].update(block);
    }

    /// `ingest` for both channels of a stereo block
    pub fn ingest_stereo(&mut self, left: &mut [f32], right: &mut [f32], sample_rate: f64) {
        self.ingest(Channel::Left, left, sample_rate);
        self.ingest(Channel::Right, right, sample_rate);
    }

    /// Change the analysis block size
    ///
    /// Returns the new block queues for the polling side, left then right.
    /// Only call this while the audio callback is stopped.
    pub fn prepare_block_size(&mut self, block_size: usize) -> [SlotConsumer<Vec<f32>>; 2] {
        let [left, right] = &mut self.accumulators;
        [left.prepare(block_size), right.prepare(block_size)]
    }

    /// Clear every filter delay line, e.g. when playback restarts
    pub fn reset(&mut self) {
        self.filters.reset();
    }

    pub fn accumulator(&self, channel: Channel) -> &SampleBlockAccumulator {
        &self.accumulators[channel.index()]
    }

    /// Generation of the chain the next block of `channel` will use
    pub fn chain_generation(&self, channel: Channel) -> u64 {
        self.filters.chain(channel).generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_sample_rate_ignores_invalid() {
        let rate = SharedSampleRate::new(48000.0);
        rate.store(0.0);
        rate.store(-1.0);
        rate.store(f64::NAN);
        assert_eq!(rate.load(), 48000.0);

        let reader = rate.clone();
        rate.store(44100.0);
        assert_eq!(reader.load(), 44100.0);
    }

    #[test]
    fn test_default_sample_rate_is_unset() {
        assert_eq!(SharedSampleRate::default().load(), 0.0);
    }
}
