//! Segments: named intervals of user activity.

use crate::collector::types::DisplayInfo;
use serde::{Deserialize, Serialize};

/// Reserved name of the segment sent right after initialization.
pub const INIT_SEGMENT_NAME: &str = "INIT";

/// Why a segment was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prompt {
    Developer = 1,
    MaxSegmentsReached = 2,
    TrackingAmount = 3,
    TrackingDuration = 4,
}

impl Prompt {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Whether the host or the tracking timer ended the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Auto = 1,
    Manual = 2,
}

impl Mode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// A segment and everything attached to it while it was active.
#[derive(Debug, Clone)]
pub struct Segment {
    /// `None` for tracking segments
    pub name: Option<String>,
    pub id: String,
    pub user_id: Option<String>,
    pub additional_id: Option<String>,
    key_values: Vec<(String, String)>,
    /// Display state when the segment was created
    pub resolution: Option<DisplayInfo>,
    pub counter: u32,
    pub time_start: i64,
    pub time_end: i64,
    pub uptime_start: i64,
    pub uptime_end: i64,
}

impl Segment {
    pub fn named(name: impl Into<String>, id: String, resolution: Option<DisplayInfo>) -> Self {
        Self::new(Some(name.into()), None, id, resolution)
    }

    pub fn tracking(user_id: Option<String>, id: String, resolution: Option<DisplayInfo>) -> Self {
        Self::new(None, user_id, id, resolution)
    }

    fn new(
        name: Option<String>,
        user_id: Option<String>,
        id: String,
        resolution: Option<DisplayInfo>,
    ) -> Self {
        Self {
            name,
            id,
            user_id,
            additional_id: None,
            key_values: Vec::new(),
            resolution,
            counter: 0,
            time_start: 0,
            time_end: 0,
            uptime_start: 0,
            uptime_end: 0,
        }
    }

    /// Successor of a rolled-over tracking segment: same name and user id.
    pub fn successor(&self, id: String, resolution: Option<DisplayInfo>) -> Self {
        Self::new(self.name.clone(), self.user_id.clone(), id, resolution)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<tracking>")
    }

    pub fn start(&mut self, time: i64, uptime: i64, counter: u32) {
        self.time_start = time;
        self.uptime_start = uptime;
        self.counter = counter;
    }

    pub fn finish(&mut self, time: i64, uptime: i64) {
        self.time_end = time;
        self.uptime_end = uptime;
    }

    /// Set a key/value pair. A repeated key keeps its position.
    pub fn set_key_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.key_values.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.key_values.push((key, value)),
        }
    }

    pub fn key_values(&self) -> &[(String, String)] {
        &self.key_values
    }

    pub fn key_value_pairs(&self) -> Vec<[String; 2]> {
        self.key_values
            .iter()
            .map(|(k, v)| [k.clone(), v.clone()])
            .collect()
    }
}
