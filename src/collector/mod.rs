//! Input collection for the Quago SDK.
//!
//! Hosts feed input either through the manual dispatch calls on
//! [`crate::Sdk`] or through the [`EventCollector`] channel, which engine
//! capture hooks write into. Both end up in the [`DataStore`].

pub mod buffer;
pub mod capture;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use buffer::RingBuffer;
pub use capture::{CollectorConfig, CollectorError, EventCollector};
pub use store::DataStore;
pub use types::{
    key_action, mouse_button, BiometricType, DataPoint, DisplayInfo, KeyPoint, LifecyclePoint,
    LifecycleState, MotionPoint, ResolutionPoint, SensorEvent,
};
