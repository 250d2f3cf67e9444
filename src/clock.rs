//! Wall-clock and uptime sources.

use chrono::Utc;
use std::time::Instant;

/// Uptime is measured from the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds since the clock started.
    pub fn uptime_millis(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}
