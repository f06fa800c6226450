//! RT-safe reclamation for swapped chain snapshots
//!
//! Chain configurations are published to the audio thread as
//! `basedrop::Shared<T>`. When the audio thread drops the last reference to a
//! stale snapshot, the memory is not freed there: the pointer is queued for
//! the collector thread owned by this module, which frees it at its own pace.
//!
//! ```ignore
//! use basedrop::Shared;
//! use pareq_core::domain::gc::gc_handle;
//!
//! let config = Shared::new(&gc_handle(), ChainConfig::passthrough(&gc_handle(), 48000.0));
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

/// How often the collector wakes to free queued snapshots
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("pareq-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives on this thread only
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            info!("Snapshot collector thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.ok().and_then(|_| rx.recv().ok()) {
        Some(handle) => handle,
        None => {
            // Without a thread, a leaked collector still hands out valid
            // handles; stale snapshots are then simply never freed.
            error!("Failed to start snapshot collector thread, reclamation disabled");
            let collector = Box::leak(Box::new(Collector::new()));
            collector.handle()
        }
    }
}

/// Handle for allocating `Shared<T>` values reclaimed off the audio thread
///
/// The collector thread is started on first use and lives for the rest of
/// the process.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
