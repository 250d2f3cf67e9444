//! Quago SDK - behavioral segment tracking for desktop game engines.
//!
//! The host engine reports mouse, key, lifecycle and display input. The SDK
//! keeps the recent input in ring buffers and, whenever a segment ends,
//! snapshots the input recorded during that segment into a JSON document.
//! Segments are delivered to a host callback or posted to the collection
//! endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Quago SDK                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  host / C ABI ──▶ Sdk ──▶ DataStore ◀── EventCollector (capture) │
//! │                    │                                             │
//! │                    ▼                                             │
//! │            SegmentManager (worker) ──▶ query ──▶ DataSegment     │
//! │                                                     │            │
//! │                              ┌──────────────────────┴─────┐      │
//! │                              ▼                            ▼      │
//! │                        JSON callback              NetworkModule  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use quago_sdk::{BiometricType, Flavor, Sdk, Settings};
//!
//! let settings = Settings::builder("app-token", Flavor::Development)
//!     .manual_motion_dispatcher(true)
//!     .callback(|headers, payload| println!("{headers}\n{payload}"))
//!     .build()
//!     .expect("valid settings");
//! let sdk = Sdk::new(settings).expect("SDK started");
//!
//! sdk.begin_segment("level-1");
//! sdk.dispatch_motion(BiometricType::MotionDown, 10.0, 20.0, 1);
//! sdk.end_segment();
//! ```

pub mod clock;
pub mod collector;
pub mod config;
pub mod core;
pub mod ffi;
pub mod id;
pub mod keymap;
pub mod logging;
pub mod network;
pub mod sdk;
pub mod stats;
pub mod worker;

// Re-export key types at crate root for convenience
pub use collector::{
    key_action, mouse_button, BiometricType, CollectorConfig, CollectorError, DisplayInfo,
    EventCollector, SensorEvent,
};
pub use config::{
    AppInfo, ConfigError, Flavor, LogLevel, QueryLimits, RuntimeConfig, Settings,
    SettingsBuilder, SettingsError, TrackingConfig,
};
pub use core::{DataSegment, Headers, Mode, Prompt, ServerEnvelope, INIT_SEGMENT_NAME};
pub use logging::Logger;
pub use network::{NetworkSettings, Transport};
pub use sdk::{Sdk, SdkError};
pub use stats::{SdkStats, SharedStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version name reported in every payload.
pub const SDK_VERSION_NAME: &str = "1.3.1";

/// Version code of this SDK release.
pub const SDK_VERSION_CODE: i32 = 7;

/// Platform code of desktop builds.
pub const PLATFORM: i32 = 3;
