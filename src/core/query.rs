//! Time-range queries over the ring buffers.
//!
//! Buffers are scanned newest to oldest so that limits keep the most recent
//! points. Exported rows are returned oldest first with times made relative
//! to the start of the segment.

use crate::collector::buffer::RingBuffer;
use crate::collector::store::DataStore;
use crate::collector::types::{DataPoint, KeyPoint, MotionPoint};
use crate::config::QueryLimits;
use serde::{Deserialize, Serialize};

/// Exported rows of every stream for one segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequences {
    pub life: Vec<Vec<f64>>,
    pub mouse: Vec<Vec<f64>>,
    pub key: Vec<Vec<f64>>,
    pub resolution: Vec<Vec<f64>>,
}

fn under_limit(count: usize, max: usize) -> bool {
    max == 0 || count < max
}

fn query_range<T: DataPoint>(buffer: &RingBuffer<T>, from: i64, to: i64, max: usize) -> Vec<T> {
    let mut points = Vec::new();
    buffer.scan_newest_first(|point| {
        let t = point.event_time();
        if t >= from && t <= to {
            points.push(point.clone());
        }
        under_limit(points.len(), max)
    });
    points
}

/// Motion points in `[from, to]`, newest first.
pub fn query_motion(
    buffer: &RingBuffer<MotionPoint>,
    from: i64,
    to: i64,
    max: usize,
) -> Vec<MotionPoint> {
    query_range(buffer, from, to, max)
}

/// Key points in `[from, to]`, newest first.
pub fn query_keys(buffer: &RingBuffer<KeyPoint>, from: i64, to: i64, max: usize) -> Vec<KeyPoint> {
    query_range(buffer, from, to, max)
}

/// Sensor-like points in `[from, to]`, newest first.
///
/// Points stamped at `0` were never recorded and are skipped, as is any point
/// similar to the previously kept one.
pub fn query_sensors<T: DataPoint>(buffer: &RingBuffer<T>, from: i64, to: i64, max: usize) -> Vec<T> {
    let mut points: Vec<T> = Vec::new();
    buffer.scan_newest_first(|point| {
        let t = point.event_time();
        if t != 0 && t >= from && t <= to {
            let repeated = points.last().map_or(false, |last| last.is_similar(point));
            if !repeated {
                points.push(point.clone());
            }
        }
        under_limit(points.len(), max)
    });
    points
}

/// Number of motion points in `[from, to]`, counting no further than `max`.
pub fn count_motion(buffer: &RingBuffer<MotionPoint>, from: i64, to: i64, max: usize) -> usize {
    let mut count = 0;
    buffer.scan_newest_first(|point| {
        let t = point.event_time();
        if t >= from && t <= to {
            count += 1;
        }
        under_limit(count, max)
    });
    count
}

/// Export newest-first points as chronological rows relative to `from`.
fn export<T: DataPoint>(points: &[T], from: i64) -> Vec<Vec<f64>> {
    points
        .iter()
        .rev()
        .map(|point| {
            let mut row = point.export_values();
            if let Some(t) = row.first_mut() {
                *t = (*t - from as f64).max(0.0);
            }
            row
        })
        .collect()
}

/// Collect the sequences of a segment spanning `[from, to]` uptime.
///
/// Motion decides the window: keys are taken from the first motion point to
/// `to`, resolution from `from` to the last motion point, and lifecycle
/// between the first and last motion points.
pub fn query_segment(store: &DataStore, from: i64, to: i64, limits: &QueryLimits) -> Sequences {
    let motion = query_motion(store.motion(), from, to, limits.motion);

    let (touch_from, touch_to) = match (motion.last(), motion.first()) {
        (Some(oldest), Some(newest)) => (oldest.event_time, newest.event_time),
        _ => (from, to),
    };

    let keys = query_keys(store.keys(), touch_from, to, limits.keys);
    let resolution = query_sensors(store.resolution(), from, touch_to, limits.resolution);
    let life = query_sensors(store.lifecycle(), touch_from, touch_to, limits.lifecycle);

    Sequences {
        life: export(&life, from),
        mouse: export(&motion, from),
        key: export(&keys, from),
        resolution: export(&resolution, from),
    }
}
