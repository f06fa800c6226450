//! Audio-level domain types shared by the filter engine and the analyzer
//!
//! This module defines the error taxonomy for contract violations and the
//! channel identifiers of the stereo chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised at the boundary of the equalizer core
///
/// None of these are produced on the real-time path: `process` is
/// infallible. They surface from settings conversion, chain updates and
/// session preparation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    /// Sample rate is zero, negative or not finite
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    /// Slope index outside of the four defined slopes
    #[error("Invalid slope index: {0} (expected 0..=3)")]
    InvalidSlope(i64),

    /// Frequency is zero, negative or not finite
    #[error("Invalid frequency for {param}: {value}")]
    InvalidFrequency { param: &'static str, value: f32 },

    /// Parameter name not part of the layout
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Invalid configuration for the engine or the analyzer
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio channel processed by its own mono chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    /// Both channels, in processing order
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];

    /// Dense index for per-channel arrays
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Left => "left",
            Channel::Right => "right",
        }
    }
}

/// Reject a sample rate the filter designers cannot work with
pub fn validate_sample_rate(sample_rate: f64) -> Result<f64> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(sample_rate)
    } else {
        Err(AudioError::InvalidSampleRate(sample_rate))
    }
}
