//! Fixed-capacity ring buffer of data points.

use crate::collector::types::DataPoint;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Keeps the most recent `capacity` points; older ones are overwritten.
#[derive(Debug)]
pub struct RingBuffer<T> {
    name: &'static str,
    capacity: usize,
    points: Mutex<VecDeque<T>>,
}

impl<T: DataPoint> RingBuffer<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            points: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, point: T) {
        let mut points = self.lock();
        if points.len() == self.capacity {
            points.pop_front();
        }
        points.push_back(point);
    }

    /// Push `point` unless `same` holds for it and the newest point.
    /// Returns whether the point was stored.
    pub fn push_if_changed<F>(&self, point: T, same: F) -> bool
    where
        F: FnOnce(&T, &T) -> bool,
    {
        let mut points = self.lock();
        if points.back().map_or(false, |last| same(last, &point)) {
            return false;
        }
        if points.len() == self.capacity {
            points.pop_front();
        }
        points.push_back(point);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn last(&self) -> Option<T> {
        self.lock().back().cloned()
    }

    /// Copy of the contents, newest first.
    pub fn newest_first(&self) -> Vec<T> {
        self.lock().iter().rev().cloned().collect()
    }

    /// Visit points newest first until `visit` returns false.
    pub fn scan_newest_first<F>(&self, mut visit: F)
    where
        F: FnMut(&T) -> bool,
    {
        let points = self.lock();
        for point in points.iter().rev() {
            if !visit(point) {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.points.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::KeyPoint;

    fn key(t: i64) -> KeyPoint {
        KeyPoint {
            event_time: t,
            action: 1,
            key_code: 32,
        }
    }

    #[test]
    fn test_overwrites_oldest() {
        let buffer = RingBuffer::new("Keys", 3);
        assert!(buffer.is_empty());
        for t in 1..=5 {
            buffer.push(key(t));
        }
        assert_eq!(buffer.len(), 3);
        let times: Vec<i64> = buffer.newest_first().iter().map(|k| k.event_time).collect();
        assert_eq!(times, vec![5, 4, 3]);
        assert_eq!(buffer.last().map(|k| k.event_time), Some(5));
    }

    #[test]
    fn test_push_if_changed_compares_with_newest() {
        let buffer: RingBuffer<KeyPoint> = RingBuffer::new("Keys", 2);
        assert!(buffer.push_if_changed(key(1), |a, b| a.key_code == b.key_code));
        assert!(!buffer.push_if_changed(key(2), |a, b| a.key_code == b.key_code));
        assert!(buffer.push_if_changed(key(3), |_, _| false));
        assert!(buffer.push_if_changed(key(4), |_, _| false));
        let times: Vec<i64> = buffer.newest_first().iter().map(|k| k.event_time).collect();
        assert_eq!(times, vec![4, 3]);
    }

    #[test]
    fn test_scan_stops_early() {
        let buffer = RingBuffer::new("Keys", 10);
        for t in 1..=10 {
            buffer.push(key(t));
        }
        let mut visited = 0;
        buffer.scan_newest_first(|_| {
            visited += 1;
            visited < 4
        });
        assert_eq!(visited, 4);
    }
}
