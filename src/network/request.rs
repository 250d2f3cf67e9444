//! A queued outbound request and its retry state.

use crate::network::NetworkSettings;
use std::time::{Duration, Instant};

/// Header carrying the retry number on repeated attempts.
pub const RETRY_HEADER: &str = "X-Retry-Num";

/// JSON POST request with exponential backoff bookkeeping.
#[derive(Debug, Clone)]
pub struct Request {
    body: String,
    headers: Vec<(String, String)>,
    retry_interval: Duration,
    randomized_interval: Duration,
    retries: u32,
    started_at: Option<Instant>,
}

impl Request {
    pub fn json(body: impl Into<String>, settings: &NetworkSettings) -> Self {
        Self {
            body: body.into(),
            headers: Vec::new(),
            retry_interval: settings.initial_interval,
            randomized_interval: Duration::ZERO,
            retries: 0,
            started_at: None,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((key.to_string(), value)),
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Wait before the next attempt, valid after [`Request::prepare_retry`].
    pub fn randomized_interval(&self) -> Duration {
        self.randomized_interval
    }

    /// Start the deadline clock. Called on the first attempt.
    pub fn start_timer(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Compute the jittered wait for this retry and grow the interval.
    pub fn prepare_retry(&mut self, settings: &NetworkSettings) {
        self.randomized_interval = self.retry_interval.mul_f64(settings.random_factor());
        self.retries += 1;
        self.retry_interval = self
            .retry_interval
            .mul_f64(settings.multiplier.max(1.0))
            .min(settings.max_backoff);
    }

    pub fn is_past_deadline(&self, settings: &NetworkSettings) -> bool {
        match self.started_at {
            Some(start) => start.elapsed() >= settings.deadline,
            None => false,
        }
    }

    /// Start over as if the request had never been sent.
    pub fn reset(&mut self, settings: &NetworkSettings) {
        self.retries = 0;
        self.started_at = None;
        self.randomized_interval = Duration::ZERO;
        self.retry_interval = settings.initial_interval;
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(RETRY_HEADER));
    }
}
