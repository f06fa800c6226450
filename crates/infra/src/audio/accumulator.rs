//! Per-channel sample accumulation into fixed-size blocks
//!
//! The real-time thread feeds samples as they come; every time the internal
//! block fills it is copied into a bounded slot queue for the analysis side.

use crate::audio::slot_queue::{bounded_slot_queue, SlotConsumer, SlotProducer};
use pareq_core::domain::audio::Channel;
use tracing::debug;

/// Collects one channel's samples into blocks of `block_size`
pub struct SampleBlockAccumulator {
    channel: Channel,
    block: Vec<f32>,
    index: usize,
    capacity: usize,
    producer: SlotProducer<Vec<f32>>,
}

impl SampleBlockAccumulator {
    /// Create an accumulator and the consumer of its completed blocks
    ///
    /// `capacity` is the number of blocks the queue can hold before new
    /// blocks are dropped.
    pub fn new(channel: Channel, block_size: usize, capacity: usize) -> (Self, SlotConsumer<Vec<f32>>) {
        let block_size = block_size.max(1);
        let (producer, consumer) = bounded_slot_queue(capacity, &vec![0.0; block_size]);

        (
            Self {
                channel,
                block: vec![0.0; block_size],
                index: 0,
                capacity,
                producer,
            },
            consumer,
        )
    }

    /// Reconfigure for a new block size
    ///
    /// Allocates a fresh queue and returns its consumer; the previous
    /// consumer receives nothing more. Only call this while no samples are
    /// being fed, i.e. before real-time processing (re)starts.
    pub fn prepare(&mut self, block_size: usize) -> SlotConsumer<Vec<f32>> {
        let block_size = block_size.max(1);
        let (producer, consumer) = bounded_slot_queue(self.capacity, &vec![0.0; block_size]);

        self.block.clear();
        self.block.resize(block_size, 0.0);
        self.index = 0;
        self.producer = producer;

        debug!(channel = self.channel.name(), block_size, "Sample accumulator prepared");
        consumer
    }

    /// Append `samples`, pushing every block that fills up
    ///
    /// Real-time safe: copies only. Blocks pushed into a full queue are
    /// dropped and counted.
    pub fn update(&mut self, samples: &[f32]) {
        let mut remaining = samples;
        while !remaining.is_empty() {
            let space = self.block.len() - self.index;
            let take = space.min(remaining.len());

            self.block[self.index..self.index + take].copy_from_slice(&remaining[..take]);
            self.index += take;
            remaining = &remaining[take..];

            if self.index == self.block.len() {
                self.producer.push(&self.block);
                self.index = 0;
            }
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn block_size(&self) -> usize {
        self.block.len()
    }

    /// Samples accumulated towards the next block
    pub fn pending(&self) -> usize {
        self.index
    }

    /// Blocks dropped because the queue was full
    pub fn dropped_count(&self) -> usize {
        self.producer.dropped_count()
    }
}
