//! Parameter snapshotting: change notifications to chain updates
//!
//! Parameter changes may arrive on any thread (host automation, UI). Their
//! only effect is to raise one atomic dirty flag. The polling thread checks
//! and clears the flag in a single compare-and-swap, so a notification that
//! lands while a tick is in progress is picked up by the next tick.

use crate::domain::audio::Result;
use crate::domain::engine::FilterChainEngine;
use crate::domain::settings::{ChainSettings, ListenerId, ParamId, ParameterListener, ParameterStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Listener half: raises the flag, nothing else
struct DirtyFlag {
    dirty: AtomicBool,
}

impl ParameterListener for DirtyFlag {
    fn parameter_value_changed(&self, _id: ParamId, _value: f32) {
        self.dirty.store(true, Ordering::Release);
    }
}

/// Turns parameter store changes into published chain updates
pub struct ParameterSnapshotter {
    store: Arc<dyn ParameterStore>,
    flag: Arc<DirtyFlag>,
    listener: ListenerId,
}

impl ParameterSnapshotter {
    /// Subscribe to `store`
    ///
    /// The flag starts raised so the first tick publishes the current values.
    pub fn new(store: Arc<dyn ParameterStore>) -> Self {
        let flag = Arc::new(DirtyFlag {
            dirty: AtomicBool::new(true),
        });
        let listener = store.add_change_listener(flag.clone());
        Self {
            store,
            flag,
            listener,
        }
    }

    /// Force an update on the next tick, e.g. after a sample-rate change
    pub fn mark_dirty(&self) {
        self.flag.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.flag.dirty.load(Ordering::Acquire)
    }

    pub fn store(&self) -> &Arc<dyn ParameterStore> {
        &self.store
    }

    /// Read the store into a fresh settings snapshot
    pub fn snapshot(&self) -> Result<ChainSettings> {
        ChainSettings::from_store(self.store.as_ref())
    }

    /// One polling tick
    ///
    /// Returns the published generation, or `None` if nothing changed.
    /// Invalid settings are reported and dropped; a failed engine update
    /// re-raises the flag so the next tick retries.
    pub fn tick(&self, engine: &mut FilterChainEngine, sample_rate: f64) -> Result<Option<u64>> {
        if self
            .flag
            .dirty
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }

        let settings = self.snapshot().map_err(|e| {
            warn!(error = %e, "Ignoring invalid parameter snapshot");
            e
        })?;

        match engine.update_chain(&settings, sample_rate) {
            Ok(generation) => {
                debug!(generation, "Parameter snapshot applied");
                Ok(Some(generation))
            }
            Err(e) => {
                self.mark_dirty();
                Err(e)
            }
        }
    }
}

impl Drop for ParameterSnapshotter {
    fn drop(&mut self) {
        self.store.remove_change_listener(self.listener);
    }
}
