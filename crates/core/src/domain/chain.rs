//! Filter chain data model: stages, cut cascades and the mono channel chain
//!
//! A chain configuration (`ChainConfig`) is an immutable value: every stage
//! holds a reference to a published `CoefficientSet` plus its bypass flag. The
//! real-time thread renders with one configuration per block and owns only
//! the delay lines (`MonoChannelChain`).

use crate::domain::audio::{validate_sample_rate, Result};
use crate::domain::dsp::{BiquadCoeffs, BiquadState, CoefficientSet, CASCADE_LEN};
use crate::domain::settings::{ChainSettings, Slope};
use basedrop::{Handle, Shared, SharedCell};
use std::sync::Arc;

/// Position of a stage in the mono chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainPosition {
    LowCut,
    Peak,
    HighCut,
}

// ============================================================================
// FILTER STAGE
// ============================================================================

/// One second-order section: a coefficient reference and a bypass flag
#[derive(Clone)]
pub struct FilterStage {
    coefficients: Shared<CoefficientSet>,
    section: usize,
    bypassed: bool,
}

impl FilterStage {
    /// A stage pointing at `section` of `coefficients`
    pub fn new(coefficients: &Shared<CoefficientSet>, section: usize, bypassed: bool) -> Self {
        debug_assert!(section < CASCADE_LEN);
        Self {
            coefficients: coefficients.clone(),
            section,
            bypassed,
        }
    }

    #[inline]
    pub fn coefficients(&self) -> &BiquadCoeffs {
        &self.coefficients[self.section]
    }

    /// The whole set this stage draws its section from
    pub fn coefficient_set(&self) -> &Shared<CoefficientSet> {
        &self.coefficients
    }

    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    /// Replace the coefficient reference with `section` of a new set
    pub fn assign(&mut self, coefficients: &Shared<CoefficientSet>, section: usize) {
        self.coefficients = coefficients.clone();
        self.section = section;
    }
}

// ============================================================================
// CUT CASCADE
// ============================================================================

/// Four stages in series plus a top-level bypass
///
/// Exactly `slope.active_stages()` leading stages are active once
/// `apply_slope` has run; the rest are bypassed.
#[derive(Clone)]
pub struct CutCascade {
    stages: [FilterStage; CASCADE_LEN],
    bypassed: bool,
}

impl CutCascade {
    /// A cascade with every stage bypassed
    pub fn new(coefficients: &Shared<CoefficientSet>) -> Self {
        Self {
            stages: std::array::from_fn(|i| FilterStage::new(coefficients, i, true)),
            bypassed: false,
        }
    }

    /// Activate stages `0..=slope.index()` with the matching sections of
    /// `coefficients`, bypassing the rest
    ///
    /// Higher slopes activate a strict superset of the stages of lower ones.
    pub fn apply_slope(&mut self, coefficients: &Shared<CoefficientSet>, slope: Slope) {
        for stage in &mut self.stages {
            stage.set_bypassed(true);
        }
        for (index, stage) in self.stages.iter_mut().enumerate().take(slope.active_stages()) {
            stage.assign(coefficients, index);
            stage.set_bypassed(false);
        }
    }

    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    pub fn stages(&self) -> &[FilterStage; CASCADE_LEN] {
        &self.stages
    }

    pub fn is_stage_active(&self, index: usize) -> bool {
        !self.stages[index].is_bypassed()
    }

    pub fn active_stage_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.is_bypassed()).count()
    }

    /// Stages contributing to the output, empty if the cascade is bypassed
    pub fn active_stages(&self) -> impl Iterator<Item = &FilterStage> {
        let bypassed = self.bypassed;
        self.stages
            .iter()
            .filter(move |s| !bypassed && !s.is_bypassed())
    }
}

// ============================================================================
// CHAIN CONFIGURATION
// ============================================================================

/// Immutable configuration of a mono chain: low cut -> peak -> high cut
#[derive(Clone)]
pub struct ChainConfig {
    pub low_cut: CutCascade,
    pub peak: FilterStage,
    pub high_cut: CutCascade,
    sample_rate: f64,
    generation: u64,
}

impl ChainConfig {
    /// A configuration that passes audio through unchanged
    pub fn passthrough(handle: &Handle, sample_rate: f64) -> Self {
        let identity = Shared::new(handle, CoefficientSet::identity());
        Self {
            low_cut: CutCascade::new(&identity),
            peak: FilterStage::new(&identity, 0, true),
            high_cut: CutCascade::new(&identity),
            sample_rate,
            generation: 0,
        }
    }

    /// Design every stage from `settings` and derive the bypass flags
    ///
    /// Runs off the real-time thread; allocates one shared coefficient set
    /// per band.
    pub fn build(
        handle: &Handle,
        settings: &ChainSettings,
        sample_rate: f64,
        generation: u64,
    ) -> Result<Self> {
        let sample_rate = validate_sample_rate(sample_rate)?;

        let peak = Shared::new(handle, CoefficientSet::peak(settings, sample_rate)?);
        let low_cut = Shared::new(handle, CoefficientSet::low_cut(settings, sample_rate)?);
        let high_cut = Shared::new(handle, CoefficientSet::high_cut(settings, sample_rate)?);

        let mut config = Self {
            low_cut: CutCascade::new(&low_cut),
            peak: FilterStage::new(&peak, 0, settings.peak_bypassed),
            high_cut: CutCascade::new(&high_cut),
            sample_rate,
            generation,
        };

        config.low_cut.set_bypassed(settings.low_cut_bypassed);
        config.low_cut.apply_slope(&low_cut, settings.low_cut_slope);
        config.high_cut.set_bypassed(settings.high_cut_bypassed);
        config.high_cut.apply_slope(&high_cut, settings.high_cut_slope);

        Ok(config)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Update counter of the engine that published this configuration
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_bypassed(&self, position: ChainPosition) -> bool {
        match position {
            ChainPosition::LowCut => self.low_cut.is_bypassed(),
            ChainPosition::Peak => self.peak.is_bypassed(),
            ChainPosition::HighCut => self.high_cut.is_bypassed(),
        }
    }

    /// Stages contributing to the output, in processing order
    pub fn active_stages(&self) -> impl Iterator<Item = &FilterStage> {
        let peak = (!self.peak.is_bypassed()).then_some(&self.peak);
        self.low_cut
            .active_stages()
            .chain(peak)
            .chain(self.high_cut.active_stages())
    }

    /// Linear magnitude of the whole chain at `freq`
    pub fn magnitude_for_frequency(&self, freq: f64) -> f64 {
        self.active_stages()
            .map(|stage| stage.coefficients().magnitude_for_frequency(freq, self.sample_rate))
            .product()
    }
}

// ============================================================================
// MONO CHANNEL CHAIN (real-time side)
// ============================================================================

/// Running state of one channel's chain
///
/// Owned by the real-time thread. The configuration is read through the
/// shared cell once per block, so a block is never rendered with a mix of
/// two configurations.
pub struct MonoChannelChain {
    config: Arc<SharedCell<ChainConfig>>,
    low_cut: [BiquadState; CASCADE_LEN],
    peak: BiquadState,
    high_cut: [BiquadState; CASCADE_LEN],
}

impl MonoChannelChain {
    pub fn new(config: Arc<SharedCell<ChainConfig>>) -> Self {
        Self {
            config,
            low_cut: [BiquadState::default(); CASCADE_LEN],
            peak: BiquadState::default(),
            high_cut: [BiquadState::default(); CASCADE_LEN],
        }
    }

    /// Run `block` through low cut, peak and high cut in place
    ///
    /// Never allocates or locks. Dropping a stale snapshot here only queues
    /// it for the collector thread.
    pub fn process(&mut self, block: &mut [f32]) {
        let config = self.config.get();

        process_cascade(&config.low_cut, &mut self.low_cut, block);
        if !config.peak.is_bypassed() {
            self.peak.process(config.peak.coefficients(), block);
        }
        process_cascade(&config.high_cut, &mut self.high_cut, block);
    }

    /// Generation of the configuration the next block will use
    pub fn generation(&self) -> u64 {
        self.config.get().generation()
    }

    /// Clear all delay lines
    pub fn reset(&mut self) {
        self.low_cut.iter_mut().for_each(BiquadState::reset);
        self.peak.reset();
        self.high_cut.iter_mut().for_each(BiquadState::reset);
    }
}

#[inline]
fn process_cascade(cascade: &CutCascade, states: &mut [BiquadState; CASCADE_LEN], block: &mut [f32]) {
    if cascade.is_bypassed() {
        return;
    }
    for (stage, state) in cascade.stages().iter().zip(states.iter_mut()) {
        if !stage.is_bypassed() {
            state.process(stage.coefficients(), block);
        }
    }
}
