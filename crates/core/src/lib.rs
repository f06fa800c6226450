//! Pareq core: the domain model of a three-band parametric equalizer
//!
//! Parameters and settings, filter design, the filter chain with its
//! lock-free coefficient hot-swap, the parameter snapshotter, the
//! frequency-response curve and session configuration.

pub mod domain;

pub use domain::*;
