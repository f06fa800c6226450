//! Domain entities and business rules

pub mod audio;
pub mod chain;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod gc;
pub mod response;
pub mod settings;
pub mod snapshot;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{validate_sample_rate, AudioError, Channel};
pub use chain::{ChainConfig, ChainPosition, CutCascade, FilterStage, MonoChannelChain};
pub use config::{
    AnalyzerConfig, AudioConfig, ConfigError, EqConfig, FftOrder, PollingConfig, QueueConfig,
    ResponseConfig,
};
pub use dsp::{gain_to_db, BiquadCoeffs, BiquadState, CoefficientSet, CASCADE_LEN};
pub use engine::{FilterChainEngine, FilterChainProcessor};
pub use gc::gc_handle;
pub use response::{Point, Rect, ResponseCurve, ResponseCurveCache, ResponsePoint};
pub use settings::{
    ChainSettings, ListenerId, ParamId, ParamSpec, ParameterListener, ParameterStore,
    ParameterTree, Slope, PARAMETER_LAYOUT,
};
pub use snapshot::ParameterSnapshotter;
