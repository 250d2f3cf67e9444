//! Core functionality of the Quago SDK.
//!
//! This module contains:
//! - Segment model, prompts and modes
//! - Time-range queries over the recorded streams
//! - Payload building and encoding
//! - The segment state machine

pub mod manager;
pub mod payload;
pub mod query;
pub mod segment;

// Re-export commonly used types
pub use manager::{Command, Delivery, ManagerContext, SegmentManager};
pub use payload::{
    gunzip, gzip, DataSegment, DesktopResolution, Headers, MetaInformation, PayloadBuilder,
    PayloadError, SegmentTimes, ServerEnvelope,
};
pub use query::{count_motion, query_keys, query_motion, query_segment, query_sensors, Sequences};
pub use segment::{Mode, Prompt, Segment, INIT_SEGMENT_NAME};
