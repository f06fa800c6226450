//! Spectrum-to-polyline conversion for the analyzer display

use crate::audio::slot_queue::{bounded_slot_queue_with, SlotConsumer, SlotProducer};
use pareq_core::domain::response::{jmap, map_from_log10, Point, Rect, MAX_FREQUENCY, MIN_FREQUENCY};

/// Ordered points ready to be stroked
pub type Polyline = Vec<Point>;

/// Pixels below the bottom edge that the dB floor maps to
const FLOOR_MARGIN: f32 = 10.0;

/// Parameters shared by every path built for one spectrum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLayout {
    pub bounds: Rect,
    pub fft_size: usize,
    pub bin_width: f32,
    pub negative_infinity_db: f32,
    /// Bin step between consecutive points
    pub resolution: usize,
}

/// Build the polyline for `render_data` into `path`
///
/// The first point is bin 0 at the left edge. Every `resolution`-th bin after
/// that is placed on a log-frequency axis spanning 20 Hz..20 kHz. Amplitudes
/// map linearly from `[negative_infinity_db, 0]` to `[bottom + 10, top]`.
/// Points whose y is not finite are skipped.
pub fn build_path(render_data: &[f32], layout: &PathLayout, path: &mut Polyline) {
    path.clear();

    let bounds = layout.bounds;
    let top = bounds.top() as f64;
    let floor_y = (bounds.bottom() + FLOOR_MARGIN) as f64;
    let negative_infinity = layout.negative_infinity_db as f64;
    let map_y = |db: f32| jmap(db as f64, negative_infinity, 0.0, floor_y, top) as f32;

    let Some(&first) = render_data.first() else {
        return;
    };
    let y = map_y(first);
    path.push(Point {
        x: bounds.left(),
        y: if y.is_finite() { y } else { bounds.bottom() },
    });

    let bins = (layout.fft_size / 2).min(render_data.len());
    let step = layout.resolution.max(1);
    for bin in (1..bins).step_by(step) {
        let y = map_y(render_data[bin]);
        if !y.is_finite() {
            continue;
        }
        let bin_freq = bin as f64 * layout.bin_width as f64;
        let normalized_x = map_from_log10(bin_freq, MIN_FREQUENCY, MAX_FREQUENCY);
        let x = bounds.left() + (normalized_x * bounds.width as f64).floor() as f32;
        path.push(Point { x, y });
    }
}

/// Builds analyzer polylines and queues them for the renderer
pub struct CurvePathBuilder {
    producer: SlotProducer<Polyline>,
}

impl CurvePathBuilder {
    /// Create a builder and the consumer of its paths
    ///
    /// Every queue slot reserves room for `3 * width_hint` points so paths for
    /// a display up to that wide never reallocate.
    pub fn new(capacity: usize, width_hint: usize) -> (Self, SlotConsumer<Polyline>) {
        let reserve = 3 * width_hint.max(1);
        let (producer, consumer) = bounded_slot_queue_with(capacity, || Polyline::with_capacity(reserve));
        (Self { producer }, consumer)
    }

    /// Build the path for one spectrum directly into the next queue slot
    ///
    /// Returns `false` if the queue was full and the path dropped.
    pub fn generate_path(&mut self, render_data: &[f32], layout: &PathLayout) -> bool {
        let reserve = 3 * layout.bounds.width.max(1.0) as usize;
        self.producer.push_with(|path| {
            path.reserve(reserve.saturating_sub(path.len()));
            build_path(render_data, layout, path);
        })
    }

    pub fn paths_available(&self) -> usize {
        self.producer.available_for_reading()
    }

    pub fn dropped_count(&self) -> usize {
        self.producer.dropped_count()
    }
}
