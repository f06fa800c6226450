//! Real-time plumbing of an equalizer session
//!
//! This module provides:
//! - `slot_queue`: the lock-free SPSC queue behind every cross-thread handoff
//! - `accumulator`, `spectrum`, `path`, `analyzer`: the analysis pipeline
//! - `processor`, `polling`, `session`: the two halves of a session and the
//!   prepare step that builds them

pub mod accumulator;
pub mod analyzer;
pub mod path;
pub mod polling;
pub mod processor;
pub mod session;
pub mod slot_queue;
pub mod spectrum;

pub use accumulator::SampleBlockAccumulator;
pub use analyzer::{AnalysisStats, ChannelAnalyzer};
pub use path::{build_path, CurvePathBuilder, PathLayout, Polyline};
pub use polling::{PollingContext, TickReport};
pub use processor::{EqProcessor, SharedSampleRate};
pub use session::{EqSession, SessionError};
pub use slot_queue::{bounded_slot_queue, bounded_slot_queue_with, SlotConsumer, SlotProducer};
pub use spectrum::{blackman_harris, SpectrumEstimator};
