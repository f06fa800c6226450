//! Parameter layout and the immutable chain settings snapshot
//!
//! The parameter store is an external collaborator: the engine only reads
//! values from it and subscribes to change notifications. `ParameterTree` is
//! the in-process implementation used by the CLI and the tests.

use crate::domain::audio::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

// ============================================================================
// SLOPE
// ============================================================================

/// Steepness of a cut cascade
///
/// The discriminant is the index of the last active section: `Db12` runs one
/// second-order section, `Db48` runs all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slope {
    Db12 = 0,
    Db24 = 1,
    Db36 = 2,
    Db48 = 3,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Number of second-order sections active for this slope
    #[inline]
    pub fn active_stages(self) -> usize {
        self.index() + 1
    }

    /// Butterworth order designed for this slope
    #[inline]
    pub fn filter_order(self) -> usize {
        self.active_stages() * 2
    }

    pub fn db_per_octave(self) -> u32 {
        12 * self.active_stages() as u32
    }
}

impl TryFrom<i64> for Slope {
    type Error = AudioError;

    fn try_from(index: i64) -> Result<Self> {
        match index {
            0 => Ok(Slope::Db12),
            1 => Ok(Slope::Db24),
            2 => Ok(Slope::Db36),
            3 => Ok(Slope::Db48),
            other => Err(AudioError::InvalidSlope(other)),
        }
    }
}

impl std::fmt::Display for Slope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} dB/Oct", self.db_per_octave())
    }
}

// ============================================================================
// PARAMETER LAYOUT
// ============================================================================

/// Parameters recognized by the equalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamId {
    PeakFreq,
    PeakGain,
    PeakQuality,
    LowCutFreq,
    HighCutFreq,
    LowCutSlope,
    HighCutSlope,
    LowCutBypassed,
    HighCutBypassed,
    PeakBypassed,
    AnalyserEnabled,
}

impl ParamId {
    pub const ALL: [ParamId; 11] = [
        ParamId::PeakFreq,
        ParamId::PeakGain,
        ParamId::PeakQuality,
        ParamId::LowCutFreq,
        ParamId::HighCutFreq,
        ParamId::LowCutSlope,
        ParamId::HighCutSlope,
        ParamId::LowCutBypassed,
        ParamId::HighCutBypassed,
        ParamId::PeakBypassed,
        ParamId::AnalyserEnabled,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used by the host and by preset files
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.name() == name)
            .ok_or_else(|| AudioError::UnknownParameter(name.to_string()))
    }

    pub fn spec(self) -> &'static ParamSpec {
        &PARAMETER_LAYOUT[self.index()]
    }
}

/// Range, default and normalization of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub id: ParamId,
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    /// Snapping interval in engineering units (0 = continuous)
    pub step: f32,
    /// Skew of the normalized mapping; values below 1 spread the low end
    pub skew: f32,
    pub default: f32,
}

impl ParamSpec {
    /// Clamp and snap an engineering value into range
    pub fn constrain(&self, value: f32) -> f32 {
        let value = if value.is_finite() { value } else { self.default };
        let snapped = if self.step > 0.0 {
            self.min + ((value - self.min) / self.step).round() * self.step
        } else {
            value
        };
        snapped.clamp(self.min, self.max)
    }

    /// Map a normalized 0..1 value to engineering units
    pub fn from_normalized(&self, normalized: f32) -> f32 {
        let p = normalized.clamp(0.0, 1.0);
        let p = if self.skew != 1.0 && p > 0.0 {
            (p.ln() / self.skew).exp()
        } else {
            p
        };
        self.constrain(self.min + (self.max - self.min) * p)
    }

    /// Map an engineering value to normalized 0..1
    pub fn to_normalized(&self, value: f32) -> f32 {
        let p = ((self.constrain(value) - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        if self.skew != 1.0 {
            p.powf(self.skew)
        } else {
            p
        }
    }
}

const FREQ_SKEW: f32 = 0.25;

/// Parameter layout, indexed by `ParamId::index`
pub static PARAMETER_LAYOUT: [ParamSpec; 11] = [
    ParamSpec { id: ParamId::PeakFreq, name: "Peak Freq", min: 20.0, max: 20000.0, step: 1.0, skew: FREQ_SKEW, default: 750.0 },
    ParamSpec { id: ParamId::PeakGain, name: "Peak Gain", min: -24.0, max: 24.0, step: 0.5, skew: 1.0, default: 0.0 },
    ParamSpec { id: ParamId::PeakQuality, name: "Peak Quality", min: 0.1, max: 10.0, step: 0.05, skew: 1.0, default: 1.0 },
    ParamSpec { id: ParamId::LowCutFreq, name: "LowCut Freq", min: 20.0, max: 20000.0, step: 1.0, skew: FREQ_SKEW, default: 20.0 },
    ParamSpec { id: ParamId::HighCutFreq, name: "HighCut Freq", min: 20.0, max: 20000.0, step: 1.0, skew: FREQ_SKEW, default: 20000.0 },
    ParamSpec { id: ParamId::LowCutSlope, name: "LowCut Slope", min: 0.0, max: 3.0, step: 1.0, skew: 1.0, default: 0.0 },
    ParamSpec { id: ParamId::HighCutSlope, name: "HighCut Slope", min: 0.0, max: 3.0, step: 1.0, skew: 1.0, default: 0.0 },
    ParamSpec { id: ParamId::LowCutBypassed, name: "LowCut Bypassed", min: 0.0, max: 1.0, step: 1.0, skew: 1.0, default: 0.0 },
    ParamSpec { id: ParamId::HighCutBypassed, name: "HighCut Bypassed", min: 0.0, max: 1.0, step: 1.0, skew: 1.0, default: 0.0 },
    ParamSpec { id: ParamId::PeakBypassed, name: "Peak Bypassed", min: 0.0, max: 1.0, step: 1.0, skew: 1.0, default: 0.0 },
    ParamSpec { id: ParamId::AnalyserEnabled, name: "Analyser Enabled", min: 0.0, max: 1.0, step: 1.0, skew: 1.0, default: 1.0 },
];

// ============================================================================
// PARAMETER STORE
// ============================================================================

/// Handle returned when registering a change listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receives parameter change notifications, possibly on a host thread
pub trait ParameterListener: Send + Sync {
    fn parameter_value_changed(&self, id: ParamId, value: f32);
}

/// Read access to the external parameter store
pub trait ParameterStore: Send + Sync {
    /// Current value in engineering units
    fn get_value(&self, id: ParamId) -> f32;

    fn add_change_listener(&self, listener: Arc<dyn ParameterListener>) -> ListenerId;

    fn remove_change_listener(&self, id: ListenerId);

    /// Boolean view of a toggle parameter
    fn get_bool(&self, id: ParamId) -> bool {
        self.get_value(id) >= 0.5
    }
}

/// In-memory parameter store with lock-free value reads
pub struct ParameterTree {
    values: [AtomicU32; 11],
    listeners: Mutex<Vec<(ListenerId, Arc<dyn ParameterListener>)>>,
    next_listener: AtomicU64,
}

impl ParameterTree {
    /// Create a store holding every parameter's default
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|i| AtomicU32::new(PARAMETER_LAYOUT[i].default.to_bits())),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Set a value in engineering units, clamped to its range
    ///
    /// Listeners are notified on the calling thread.
    pub fn set_value(&self, id: ParamId, value: f32) {
        let constrained = id.spec().constrain(value);
        self.values[id.index()].store(constrained.to_bits(), Ordering::Release);
        trace!(param = id.name(), value = constrained, "Parameter changed");
        self.notify(id, constrained);
    }

    /// Set a value from its normalized 0..1 representation
    pub fn set_normalized(&self, id: ParamId, normalized: f32) {
        self.set_value(id, id.spec().from_normalized(normalized));
    }

    pub fn set_bool(&self, id: ParamId, on: bool) {
        self.set_value(id, if on { 1.0 } else { 0.0 });
    }

    /// Set a value by its layout name
    pub fn set_by_name(&self, name: &str, value: f32) -> Result<()> {
        let id = ParamId::from_name(name).map_err(|e| {
            warn!(name, "Unknown parameter");
            e
        })?;
        self.set_value(id, value);
        Ok(())
    }

    pub fn normalized(&self, id: ParamId) -> f32 {
        id.spec().to_normalized(self.get_value(id))
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    fn notify(&self, id: ParamId, value: f32) {
        // Call outside the lock so listeners may re-enter the store
        let listeners: Vec<_> = self.lock_listeners().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener.parameter_value_changed(id, value);
        }
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Arc<dyn ParameterListener>)>> {
        // A panicking listener must not disable notifications for everyone else
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ParameterTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore for ParameterTree {
    fn get_value(&self, id: ParamId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Acquire))
    }

    fn add_change_listener(&self, listener: Arc<dyn ParameterListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, listener));
        id
    }

    fn remove_change_listener(&self, id: ListenerId) {
        self.lock_listeners().retain(|(existing, _)| *existing != id);
    }
}

// ============================================================================
// CHAIN SETTINGS
// ============================================================================

/// Immutable snapshot of every filter parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
    pub low_cut_bypassed: bool,
    pub high_cut_bypassed: bool,
    pub peak_bypassed: bool,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            peak_freq: ParamId::PeakFreq.spec().default,
            peak_gain_db: ParamId::PeakGain.spec().default,
            peak_quality: ParamId::PeakQuality.spec().default,
            low_cut_freq: ParamId::LowCutFreq.spec().default,
            high_cut_freq: ParamId::HighCutFreq.spec().default,
            low_cut_slope: Slope::Db12,
            high_cut_slope: Slope::Db12,
            low_cut_bypassed: false,
            high_cut_bypassed: false,
            peak_bypassed: false,
        }
    }
}

impl ChainSettings {
    /// Read the current values from the store into a validated snapshot
    pub fn from_store(store: &dyn ParameterStore) -> Result<Self> {
        let slope = |id: ParamId| Slope::try_from(store.get_value(id).round() as i64);

        let settings = Self {
            peak_freq: store.get_value(ParamId::PeakFreq),
            peak_gain_db: store.get_value(ParamId::PeakGain),
            peak_quality: store.get_value(ParamId::PeakQuality),
            low_cut_freq: store.get_value(ParamId::LowCutFreq),
            high_cut_freq: store.get_value(ParamId::HighCutFreq),
            low_cut_slope: slope(ParamId::LowCutSlope)?,
            high_cut_slope: slope(ParamId::HighCutSlope)?,
            low_cut_bypassed: store.get_bool(ParamId::LowCutBypassed),
            high_cut_bypassed: store.get_bool(ParamId::HighCutBypassed),
            peak_bypassed: store.get_bool(ParamId::PeakBypassed),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the filter designers cannot handle
    pub fn validate(&self) -> Result<()> {
        let frequencies = [
            ("Peak Freq", self.peak_freq),
            ("LowCut Freq", self.low_cut_freq),
            ("HighCut Freq", self.high_cut_freq),
        ];
        for (param, value) in frequencies {
            if !(value.is_finite() && value > 0.0) {
                return Err(AudioError::InvalidFrequency { param, value });
            }
        }
        if !(self.peak_quality.is_finite() && self.peak_quality > 0.0) {
            return Err(AudioError::InvalidConfiguration(format!(
                "Peak Quality must be positive, got {}",
                self.peak_quality
            )));
        }
        if !self.peak_gain_db.is_finite() {
            return Err(AudioError::InvalidConfiguration("Peak Gain is not finite".to_string()));
        }
        Ok(())
    }
}
