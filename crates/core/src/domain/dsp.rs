//! Digital signal processing primitives for the filter chain
//!
//! This module provides:
//! - Second-order (biquad) coefficients with RBJ peaking and Butterworth
//!   high-pass / low-pass sections
//! - High-order Butterworth cascade design producing a `CoefficientSet`
//! - The per-stage running state (delay lines) used by the real-time thread
//! - Magnitude response evaluation for display
//!
//! Coefficients are designed in `f64` and stored as `f32`; running state is
//! `f32`. Nothing in the `process` path allocates.

use crate::domain::audio::{validate_sample_rate, Result};
use crate::domain::settings::{ChainSettings, Slope};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Number of second-order sections in a cut cascade
pub const CASCADE_LEN: usize = 4;

/// Floor used when converting the response curve to decibels
pub const RESPONSE_FLOOR_DB: f64 = -100.0;

/// Highest design frequency as a fraction of Nyquist
const MAX_NYQUIST_FRACTION: f64 = 0.99;

/// Normalized angular frequency of a design corner
///
/// The corner is kept below Nyquist; above it `sin(w0)` turns negative and
/// the section becomes unstable.
#[inline]
fn design_angle(freq: f64, sample_rate: f64) -> f64 {
    let freq = freq.min(0.5 * sample_rate * MAX_NYQUIST_FRACTION);
    2.0 * PI * freq / sample_rate
}

/// Convert a linear gain to decibels, clamping at `minus_infinity_db`
///
/// Non-positive gains map to the floor, so the conversion is monotonically
/// non-decreasing over its whole input range.
#[inline]
pub fn gain_to_db(gain: f32, minus_infinity_db: f32) -> f32 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(minus_infinity_db)
    } else {
        minus_infinity_db
    }
}

/// `f64` variant of [`gain_to_db`] for response evaluation
#[inline]
pub fn gain_to_db_f64(gain: f64, minus_infinity_db: f64) -> f64 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(minus_infinity_db)
    } else {
        minus_infinity_db
    }
}

#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

// ============================================================================
// BIQUAD COEFFICIENTS
// ============================================================================

/// Biquad filter coefficients, normalized so that `a0 == 1`
///
/// Design frequencies at or above Nyquist are pulled just below it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoeffs {
    /// Unity gain, no phase shift
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// Peaking (bell) filter around a center frequency
    ///
    /// # Parameters
    /// - `sample_rate`: Audio sample rate in Hz
    /// - `freq`: Center frequency in Hz
    /// - `gain_db`: Boost/cut in decibels (clamped to +/- 24dB)
    /// - `q`: Quality factor, higher is narrower
    #[must_use]
    pub fn peaking(sample_rate: f64, freq: f64, gain_db: f64, q: f64) -> Self {
        let gain_db = gain_db.clamp(-24.0, 24.0);
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = design_angle(freq, sample_rate);
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        )
    }

    /// Second-order high-pass section
    #[must_use]
    pub fn high_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let w0 = design_angle(freq, sample_rate);
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        Self::normalized(
            (1.0 + cos_w0) / 2.0,
            -(1.0 + cos_w0),
            (1.0 + cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    /// Second-order low-pass section
    #[must_use]
    pub fn low_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let w0 = design_angle(freq, sample_rate);
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        Self::normalized(
            (1.0 - cos_w0) / 2.0,
            1.0 - cos_w0,
            (1.0 - cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    /// Linear magnitude of the transfer function at `freq`
    pub fn magnitude_for_frequency(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let numerator = self.b0 as f64 + z1 * self.b1 as f64 + z2 * self.b2 as f64;
        let denominator = 1.0 + z1 * self.a1 as f64 + z2 * self.a2 as f64;

        (numerator / denominator).norm()
    }
}

/// Q of section `index` in an even-order Butterworth design
///
/// The pole pairs sit at angles `(2k + 1)π / 2n` from the imaginary axis.
pub fn butterworth_q(order: usize, index: usize) -> f64 {
    let angle = PI * (2 * index + 1) as f64 / (2 * order) as f64;
    1.0 / (2.0 * angle.sin())
}

// ============================================================================
// COEFFICIENT SETS
// ============================================================================

/// Ordered coefficients for the four sections of a stage
///
/// A cut cascade uses entries `0..=slope`; unused entries hold the identity.
/// The peak stage uses entry 0 only. Once published a set is never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    sections: [BiquadCoeffs; CASCADE_LEN],
    designed: usize,
}

impl CoefficientSet {
    /// A set whose every section passes the signal unchanged
    pub fn identity() -> Self {
        Self {
            sections: [BiquadCoeffs::IDENTITY; CASCADE_LEN],
            designed: 0,
        }
    }

    fn from_sections(designed: &[BiquadCoeffs]) -> Self {
        let mut set = Self::identity();
        set.sections[..designed.len()].copy_from_slice(designed);
        set.designed = designed.len();
        set
    }

    /// Peak/bell filter from the settings
    pub fn peak(settings: &ChainSettings, sample_rate: f64) -> Result<Self> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        let coeffs = BiquadCoeffs::peaking(
            sample_rate,
            settings.peak_freq as f64,
            settings.peak_gain_db as f64,
            settings.peak_quality as f64,
        );
        Ok(Self::from_sections(&[coeffs]))
    }

    /// Butterworth high-pass cascade for the low cut
    pub fn low_cut(settings: &ChainSettings, sample_rate: f64) -> Result<Self> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        Ok(Self::butterworth(settings.low_cut_slope, |q| {
            BiquadCoeffs::high_pass(sample_rate, settings.low_cut_freq as f64, q)
        }))
    }

    /// Butterworth low-pass cascade for the high cut
    pub fn high_cut(settings: &ChainSettings, sample_rate: f64) -> Result<Self> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        Ok(Self::butterworth(settings.high_cut_slope, |q| {
            BiquadCoeffs::low_pass(sample_rate, settings.high_cut_freq as f64, q)
        }))
    }

    fn butterworth(slope: Slope, section: impl Fn(f64) -> BiquadCoeffs) -> Self {
        let order = slope.filter_order();
        let mut designed = [BiquadCoeffs::IDENTITY; CASCADE_LEN];
        for (index, coeffs) in designed.iter_mut().take(slope.active_stages()).enumerate() {
            *coeffs = section(butterworth_q(order, index));
        }
        Self::from_sections(&designed[..slope.active_stages()])
    }

    /// Number of sections produced by the designer
    pub fn designed_len(&self) -> usize {
        self.designed
    }

    pub fn sections(&self) -> &[BiquadCoeffs; CASCADE_LEN] {
        &self.sections
    }
}

impl std::ops::Index<usize> for CoefficientSet {
    type Output = BiquadCoeffs;

    fn index(&self, index: usize) -> &BiquadCoeffs {
        &self.sections[index]
    }
}

// ============================================================================
// RUNNING STATE
// ============================================================================

/// Delay-line memory of one second-order section, Direct Form I
///
/// Owned by the real-time thread; coefficients are borrowed per call so a
/// snapshot swap never touches this state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl BiquadState {
    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, coeffs: &BiquadCoeffs, x: f32) -> f32 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let y = coeffs.b0 * x + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Process a buffer of samples in place
    pub fn process(&mut self, coeffs: &BiquadCoeffs, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(coeffs, *sample);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
