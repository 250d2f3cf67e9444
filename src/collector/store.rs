//! In-memory store of recorded input, one ring buffer per stream.

use crate::collector::buffer::RingBuffer;
use crate::collector::types::{
    BiometricType, DataPoint, KeyPoint, LifecyclePoint, MotionPoint, ResolutionPoint,
};
use crate::logging::Logger;
use crate::stats::SharedStats;

pub const LIFECYCLE_CAPACITY: usize = 100;
pub const RESOLUTION_CAPACITY: usize = 100;
pub const MOTION_CAPACITY: usize = 20_000;
pub const KEY_CAPACITY: usize = 10_000;

/// Ring buffers for motion, key, lifecycle and resolution points.
pub struct DataStore {
    motion: RingBuffer<MotionPoint>,
    keys: RingBuffer<KeyPoint>,
    lifecycle: RingBuffer<LifecyclePoint>,
    resolution: RingBuffer<ResolutionPoint>,
    stats: SharedStats,
    logger: Logger,
}

impl DataStore {
    pub fn new(stats: SharedStats, logger: &Logger) -> Self {
        Self {
            motion: RingBuffer::new("Motion", MOTION_CAPACITY),
            keys: RingBuffer::new("Keys", KEY_CAPACITY),
            lifecycle: RingBuffer::new("LifeCycle", LIFECYCLE_CAPACITY),
            resolution: RingBuffer::new("Resolution", RESOLUTION_CAPACITY),
            stats,
            logger: logger.for_component("DataStore"),
        }
    }

    pub fn record_motion(&self, event_time: i64, kind: BiometricType, x: f32, y: f32, button: i32) {
        let point = MotionPoint {
            event_time,
            kind,
            x,
            y,
            button,
        };
        self.motion.push(point);
        self.stats.record_motion_event();
        self.logger
            .verbose("record_motion", format_args!("{} {point:?}", self.motion.name()));
    }

    pub fn record_key(&self, event_time: i64, action: i32, key_code: i32) {
        let point = KeyPoint {
            event_time,
            action,
            key_code,
        };
        self.keys.push(point);
        self.stats.record_key_event();
        self.logger
            .verbose("record_key", format_args!("{} {point:?}", self.keys.name()));
    }

    pub fn record_lifecycle(&self, point: LifecyclePoint) {
        self.lifecycle.push(point);
        self.logger.verbose(
            "record_lifecycle",
            format_args!("{} {point:?}", self.lifecycle.name()),
        );
    }

    pub fn record_resolution(&self, point: ResolutionPoint) {
        self.resolution.push(point);
        self.logger.verbose(
            "record_resolution",
            format_args!("{} {point:?}", self.resolution.name()),
        );
    }

    /// Record `point` unless it matches the newest resolution point.
    pub fn record_resolution_if_changed(&self, point: ResolutionPoint) -> bool {
        let stored = self
            .resolution
            .push_if_changed(point, |last, next| last.is_similar(next));
        if stored {
            self.logger.verbose(
                "record_resolution",
                format_args!("{} {point:?}", self.resolution.name()),
            );
        }
        stored
    }

    pub fn motion(&self) -> &RingBuffer<MotionPoint> {
        &self.motion
    }

    pub fn keys(&self) -> &RingBuffer<KeyPoint> {
        &self.keys
    }

    pub fn lifecycle(&self) -> &RingBuffer<LifecyclePoint> {
        &self.lifecycle
    }

    pub fn resolution(&self) -> &RingBuffer<ResolutionPoint> {
        &self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{key_action, mouse_button, LifecycleState};
    use crate::stats::SdkStats;
    use std::sync::Arc;

    #[test]
    fn test_records_into_streams() {
        let stats = Arc::new(SdkStats::new());
        let store = DataStore::new(stats.clone(), &Logger::tracing_only());

        store.record_motion(5, BiometricType::MotionDown, 1.0, 2.0, mouse_button::LEFT);
        store.record_key(6, key_action::DOWN, 65);
        store.record_lifecycle(LifecyclePoint {
            event_time: 7,
            state: LifecycleState::Resume,
        });

        assert_eq!(store.motion().len(), 1);
        assert_eq!(store.keys().len(), 1);
        assert_eq!(store.lifecycle().len(), 1);
        assert!(store.resolution().is_empty());
        assert_eq!(store.motion().capacity(), MOTION_CAPACITY);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.motion_events, 1);
        assert_eq!(snapshot.key_events, 1);
    }
}
