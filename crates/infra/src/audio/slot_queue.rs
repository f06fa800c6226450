//! Lock-free bounded slot queue for cross-thread handoff
//!
//! A fixed array of preallocated slots shared by exactly one producer and
//! one consumer. Items are copied into and out of the slots with
//! `clone_from`, so queues of buffers (`Vec<f32>`, polylines) never allocate
//! after construction as long as item sizes stay the same.
//!
//! Performance characteristics:
//! - Lock-free and wait-free for both sides
//! - Cache-padded cursors to prevent false sharing
//! - Full queue drops the newest item; empty queue is a no-op

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Slots plus the two cursors
///
/// Cursors increase monotonically and are taken modulo capacity on access;
/// `write_pos - read_pos` never exceeds `capacity`.
struct SlotRing<T> {
    slots: Box<[UnsafeCell<T>]>,

    /// Advanced only by the producer
    write_pos: CachePadded<AtomicUsize>,

    /// Advanced only by the consumer
    read_pos: CachePadded<AtomicUsize>,

    /// Items rejected because the queue was full
    dropped: CachePadded<AtomicUsize>,
}

// SAFETY: a slot is only written by the producer while it is outside
// [read_pos, write_pos), and only read by the consumer while it is inside.
// The release store of a cursor publishes the slot access that preceded it.
unsafe impl<T: Send> Sync for SlotRing<T> {}

impl<T> SlotRing<T> {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn len(&self) -> usize {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        write_pos.wrapping_sub(read_pos)
    }
}

/// Create a queue of `capacity` slots, each initialized from `prototype`
///
/// Returns the producer and consumer halves. Each half is `Send` but not
/// `Clone`, so exactly one thread can push and exactly one can pull.
///
/// # Panics
///
/// Panics if `capacity` is zero. Capacities come from validated
/// configuration, so a zero here is a programming error.
pub fn bounded_slot_queue<T: Clone>(capacity: usize, prototype: &T) -> (SlotProducer<T>, SlotConsumer<T>) {
    bounded_slot_queue_with(capacity, || prototype.clone())
}

/// Like [`bounded_slot_queue`], with every slot built by `make_slot`
///
/// Use this when slots need reserved capacity that `Clone` would not keep,
/// e.g. `Vec::with_capacity`.
pub fn bounded_slot_queue_with<T, F: FnMut() -> T>(
    capacity: usize,
    mut make_slot: F,
) -> (SlotProducer<T>, SlotConsumer<T>) {
    assert!(capacity > 0, "slot queue capacity must be at least 1");

    let ring = Arc::new(SlotRing {
        slots: (0..capacity).map(|_| UnsafeCell::new(make_slot())).collect(),
        write_pos: CachePadded::new(AtomicUsize::new(0)),
        read_pos: CachePadded::new(AtomicUsize::new(0)),
        dropped: CachePadded::new(AtomicUsize::new(0)),
    });

    (
        SlotProducer { ring: Arc::clone(&ring) },
        SlotConsumer { ring },
    )
}

/// Writing half of a bounded slot queue
pub struct SlotProducer<T> {
    ring: Arc<SlotRing<T>>,
}

/// Reading half of a bounded slot queue
pub struct SlotConsumer<T> {
    ring: Arc<SlotRing<T>>,
}

impl<T: Clone> SlotProducer<T> {
    /// Copy `item` into the next free slot
    ///
    /// Returns `false` without blocking if the queue is full; the item is
    /// then dropped and counted.
    #[inline]
    pub fn push(&mut self, item: &T) -> bool {
        self.push_with(|slot| slot.clone_from(item))
    }
}

impl<T> SlotProducer<T> {
    /// Fill the next free slot in place with `fill`
    ///
    /// `fill` receives the slot's previous contents. It is not called when
    /// the queue is full.
    #[inline]
    pub fn push_with<F: FnOnce(&mut T)>(&mut self, fill: F) -> bool {
        let ring = &*self.ring;
        let write_pos = ring.write_pos.load(Ordering::Relaxed);
        let read_pos = ring.read_pos.load(Ordering::Acquire);

        if write_pos.wrapping_sub(read_pos) >= ring.capacity() {
            ring.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let slot = &ring.slots[write_pos % ring.capacity()];
        // SAFETY: the slot is outside the readable range, and this is the
        // only producer.
        fill(unsafe { &mut *slot.get() });

        ring.write_pos.store(write_pos.wrapping_add(1), Ordering::Release);
        true
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of items waiting to be pulled
    pub fn available_for_reading(&self) -> usize {
        self.ring.len()
    }

    /// Number of items dropped on a full queue since construction
    pub fn dropped_count(&self) -> usize {
        self.ring.dropped.load(Ordering::Relaxed)
    }
}

impl<T: Clone> SlotConsumer<T> {
    /// Copy the oldest item into `out`
    ///
    /// Returns `false` without blocking if the queue is empty; `out` is then
    /// left untouched.
    #[inline]
    pub fn pull(&mut self, out: &mut T) -> bool {
        self.pull_with(|item| out.clone_from(item))
    }

    /// Drain the queue, leaving the newest item in `out`
    ///
    /// Returns the number of items pulled.
    pub fn pull_latest(&mut self, out: &mut T) -> usize {
        let mut pulled = 0;
        while self.pull(out) {
            pulled += 1;
        }
        pulled
    }
}

impl<T> SlotConsumer<T> {
    /// Hand the oldest item to `read` by reference, then release its slot
    #[inline]
    pub fn pull_with<F: FnOnce(&T)>(&mut self, read: F) -> bool {
        let ring = &*self.ring;
        let read_pos = ring.read_pos.load(Ordering::Relaxed);
        let write_pos = ring.write_pos.load(Ordering::Acquire);

        if write_pos == read_pos {
            return false;
        }

        let slot = &ring.slots[read_pos % ring.capacity()];
        // SAFETY: the slot is inside the readable range, so the producer
        // will not touch it until read_pos moves past it.
        read(unsafe { &*slot.get() });

        ring.read_pos.store(read_pos.wrapping_add(1), Ordering::Release);
        true
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of items waiting to be pulled
    pub fn available_for_reading(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available_for_reading() == 0
    }

    /// Number of items dropped on a full queue since construction
    pub fn dropped_count(&self) -> usize {
        self.ring.dropped.load(Ordering::Relaxed)
    }
}
