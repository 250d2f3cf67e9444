//! Transport and backoff settings for segment delivery.

use crate::config::duration_serde;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default collection endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.quago.io/v1/record";

/// Exponential backoff and queue parameters for the network module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub url: String,
    #[serde(with = "duration_serde")]
    pub initial_interval: Duration,
    #[serde(with = "duration_serde")]
    pub max_backoff: Duration,
    /// Requests still failing this long after their first attempt are dropped
    #[serde(with = "duration_serde")]
    pub deadline: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
    pub max_cached_messages: usize,
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            initial_interval: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10 * 60),
            deadline: Duration::from_secs(90 * 60),
            multiplier: 1.5,
            randomization_factor: 0.4,
            max_cached_messages: 10,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl NetworkSettings {
    pub fn builder() -> NetworkSettingsBuilder {
        NetworkSettingsBuilder::default()
    }

    /// A uniformly random factor in `[1 - randomization, 1 + randomization]`.
    pub fn random_factor(&self) -> f64 {
        let spread = self.randomization_factor.clamp(0.0, 1.0);
        if spread == 0.0 {
            return 1.0;
        }
        rand::rng().random_range((1.0 - spread)..=(1.0 + spread))
    }
}

/// Builder for [`NetworkSettings`].
#[derive(Debug, Clone, Default)]
pub struct NetworkSettingsBuilder {
    settings: NetworkSettings,
}

impl NetworkSettingsBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.settings.url = url.into();
        self
    }

    pub fn initial_interval(mut self, interval: Duration) -> Self {
        self.settings.initial_interval = interval;
        self
    }

    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.settings.max_backoff = max;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.settings.deadline = deadline;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.settings.multiplier = multiplier;
        self
    }

    pub fn randomization_factor(mut self, factor: f64) -> Self {
        self.settings.randomization_factor = factor;
        self
    }

    pub fn max_cached_messages(mut self, max: usize) -> Self {
        self.settings.max_cached_messages = max;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.settings.request_timeout = timeout;
        self
    }

    pub fn build(self) -> NetworkSettings {
        self.settings
    }
}
