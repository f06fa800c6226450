//! Frequency-response curve of the filter chain, for display
//!
//! Each active stage is evaluated at log-spaced frequencies between 20 Hz and
//! 20 kHz; magnitudes are multiplied and converted to decibels. The curve only
//! changes when a new chain is published, so `ResponseCurveCache` recomputes
//! it per generation instead of per frame.

use crate::domain::chain::ChainConfig;
use crate::domain::dsp::{gain_to_db_f64, RESPONSE_FLOOR_DB};
use serde::{Deserialize, Serialize};

pub const MIN_FREQUENCY: f64 = 20.0;
pub const MAX_FREQUENCY: f64 = 20000.0;

/// Map a 0..1 proportion to a frequency on a log10 scale
#[inline]
pub fn map_to_log10(proportion: f64, min: f64, max: f64) -> f64 {
    min * (max / min).powf(proportion)
}

/// Map a frequency to its 0..1 proportion on a log10 scale
#[inline]
pub fn map_from_log10(value: f64, min: f64, max: f64) -> f64 {
    (value / min).log10() / (max / min).log10()
}

/// Linear remap of `value` from one range to another
#[inline]
pub fn jmap(value: f64, source_min: f64, source_max: f64, target_min: f64, target_max: f64) -> f64 {
    target_min + (value - source_min) * (target_max - target_min) / (source_max - source_min)
}

/// Axis-aligned rectangle in pixel space (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// 2-D point of a polyline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// One sample of the response curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponsePoint {
    pub frequency: f64,
    pub magnitude_db: f64,
}

/// Magnitude response of a chain over a log-frequency sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseCurve {
    pub points: Vec<ResponsePoint>,
}

impl ResponseCurve {
    /// Evaluate `config` at `width` log-spaced frequencies
    pub fn compute(config: &ChainConfig, width: usize) -> Self {
        let points = (0..width)
            .map(|i| {
                let frequency = map_to_log10(i as f64 / width as f64, MIN_FREQUENCY, MAX_FREQUENCY);
                let magnitude = config.magnitude_for_frequency(frequency);
                ResponsePoint {
                    frequency,
                    magnitude_db: gain_to_db_f64(magnitude, RESPONSE_FLOOR_DB),
                }
            })
            .collect();
        Self { points }
    }

    /// Map the curve into `bounds`, `min_db` at the bottom and `max_db` at
    /// the top, one point per horizontal pixel
    pub fn to_polyline(&self, bounds: Rect, min_db: f64, max_db: f64) -> Vec<Point> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, point)| Point {
                x: bounds.left() + i as f32,
                y: jmap(point.magnitude_db, min_db, max_db, bounds.bottom() as f64, bounds.top() as f64) as f32,
            })
            .collect()
    }

    /// Magnitude at the sample closest to `frequency`
    pub fn magnitude_near(&self, frequency: f64) -> Option<f64> {
        self.points
            .iter()
            .min_by(|a, b| {
                (a.frequency - frequency)
                    .abs()
                    .total_cmp(&(b.frequency - frequency).abs())
            })
            .map(|p| p.magnitude_db)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Response curve recomputed only when the chain generation or width changes
#[derive(Debug, Default)]
pub struct ResponseCurveCache {
    key: Option<(u64, usize)>,
    curve: ResponseCurve,
}

impl ResponseCurveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Curve for `config`, reusing the cached one when still valid
    pub fn get(&mut self, config: &ChainConfig, width: usize) -> &ResponseCurve {
        let key = (config.generation(), width);
        if self.key != Some(key) {
            self.curve = ResponseCurve::compute(config, width);
            self.key = Some(key);
        }
        &self.curve
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gc::gc_handle;
    use crate::domain::settings::{ChainSettings, Slope};

    const SAMPLE_RATE: f64 = 48000.0;

    #[test]
    fn test_log_mapping_round_trip() {
        assert_eq!(map_to_log10(0.0, 20.0, 20000.0), 20.0);
        assert!((map_to_log10(1.0, 20.0, 20000.0) - 20000.0).abs() < 1e-6);
        assert!((map_to_log10(0.5, 20.0, 20000.0) - 632.455_532).abs() < 1e-3);
        assert!((map_from_log10(632.455_532, 20.0, 20000.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_jmap() {
        assert_eq!(jmap(0.0, -24.0, 24.0, 100.0, 0.0), 50.0);
        assert_eq!(jmap(24.0, -24.0, 24.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn test_flat_chain_is_zero_db() {
        let config = ChainSettings {
            peak_bypassed: true,
            low_cut_bypassed: true,
            high_cut_bypassed: true,
            ..ChainSettings::default()
        };
        let config = ChainConfig::build(&gc_handle(), &config, SAMPLE_RATE, 1).unwrap();
        let curve = ResponseCurve::compute(&config, 200);

        assert_eq!(curve.len(), 200);
        assert!(curve.points.iter().all(|p| p.magnitude_db.abs() < 1e-9));
        assert_eq!(curve.points[0].frequency, 20.0);
    }

    #[test]
    fn test_curve_follows_peak_and_cuts() {
        let settings = ChainSettings {
            peak_freq: 1000.0,
            peak_gain_db: 6.0,
            low_cut_freq: 100.0,
            low_cut_slope: Slope::Db24,
            high_cut_freq: 10000.0,
            high_cut_slope: Slope::Db24,
            ..ChainSettings::default()
        };
        let config = ChainConfig::build(&gc_handle(), &settings, SAMPLE_RATE, 1).unwrap();
        let curve = ResponseCurve::compute(&config, 600);

        let at_1k = curve.magnitude_near(1000.0).unwrap();
        assert!((at_1k - 6.0).abs() < 0.5, "got {at_1k}");
        assert!(curve.magnitude_near(25.0).unwrap() < -40.0);
        assert!(curve.magnitude_near(19000.0).unwrap() < -10.0);
    }

    #[test]
    fn test_polyline_spans_bounds() {
        let curve = ResponseCurve {
            points: vec![
                ResponsePoint { frequency: 20.0, magnitude_db: -24.0 },
                ResponsePoint { frequency: 200.0, magnitude_db: 0.0 },
                ResponsePoint { frequency: 2000.0, magnitude_db: 24.0 },
            ],
        };
        let line = curve.to_polyline(Rect::new(10.0, 20.0, 3.0, 100.0), -24.0, 24.0);
        assert_eq!(line[0], Point { x: 10.0, y: 120.0 });
        assert_eq!(line[1], Point { x: 11.0, y: 70.0 });
        assert_eq!(line[2], Point { x: 12.0, y: 20.0 });
    }

    #[test]
    fn test_cache_recomputes_per_generation() {
        let settings = ChainSettings::default();
        let boosted = ChainSettings { peak_gain_db: 12.0, ..settings };
        let first = ChainConfig::build(&gc_handle(), &settings, SAMPLE_RATE, 1).unwrap();
        let same_generation = ChainConfig::build(&gc_handle(), &boosted, SAMPLE_RATE, 1).unwrap();
        let second = ChainConfig::build(&gc_handle(), &boosted, SAMPLE_RATE, 2).unwrap();

        let mut cache = ResponseCurveCache::new();
        let original = cache.get(&first, 100).clone();

        // Keyed on generation: no recomputation until a new chain is published
        assert_eq!(cache.get(&same_generation, 100), &original);

        let updated = cache.get(&second, 100).clone();
        assert_ne!(updated, original);

        assert_eq!(cache.get(&second, 50).len(), 50);
        cache.invalidate();
        assert_eq!(cache.get(&second, 50).len(), 50);
    }
}
