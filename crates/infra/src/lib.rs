//! Pareq infrastructure: lock-free queues, the spectrum analysis pipeline
//! and the real-time/polling session halves built on `pareq-core`.

pub mod audio;
