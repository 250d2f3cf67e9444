//! Segment payloads as delivered to the host callback or the collection
//! endpoint.
//!
//! Field names are part of the wire format and must not change.

use crate::config::{AppInfo, Flavor};
use crate::core::query::Sequences;
use crate::core::segment::{Mode, Prompt, Segment};
use crate::{PLATFORM, SDK_VERSION_NAME};
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::sync::OnceLock;
use uuid::Uuid;

// ============================================================================
// Wire types
// ============================================================================

/// Wall-clock and uptime boundaries of a segment, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentTimes {
    pub ts_start: i64,
    pub ts_end: i64,
    pub uptime_start: i64,
    pub uptime_end: i64,
    pub ts_sdk_init: i64,
    pub uptime_sdk_init: i64,
}

/// Window placement details of the display snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DesktopResolution {
    pub window_pos_x: i32,
    pub window_pos_y: i32,
    pub refresh_rate: i32,
    pub dpi: f32,
    pub is_full_screen: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMeta {
    pub package_name: Option<String>,
    pub version_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub operating_system: String,
    pub os_family: String,
    pub arch: String,
    pub hostname: String,
    pub processor_count: usize,
    pub instance_id: String,
}

/// Application and host description attached to every segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInformation {
    pub application: ApplicationMeta,
    pub system_info: SystemInfo,
}

static INSTANCE_ID: OnceLock<Uuid> = OnceLock::new();

impl MetaInformation {
    /// Describe the running host.
    pub fn collect(app: &AppInfo) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let processor_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            application: ApplicationMeta {
                package_name: app.package_name.clone(),
                version_name: app.version_name.clone(),
            },
            system_info: SystemInfo {
                operating_system: std::env::consts::OS.to_string(),
                os_family: std::env::consts::FAMILY.to_string(),
                arch: std::env::consts::ARCH.to_string(),
                hostname,
                processor_count,
                instance_id: INSTANCE_ID.get_or_init(Uuid::new_v4).to_string(),
            },
        }
    }
}

/// A delivered segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSegment {
    pub app_token: String,
    pub user_id: Option<String>,
    pub additional_id: Option<String>,
    pub platform: i32,
    pub wrapper: i32,
    pub wrapper_version: Option<String>,
    pub seg_name: Option<String>,
    pub seg_id: String,
    pub session_id: String,
    pub app_package_name: Option<String>,
    pub app_version_name: Option<String>,
    pub sdk_version_name: String,
    pub seg_count: u32,
    pub mode: i32,
    pub flavor: i32,
    pub meta_unity_desktop: MetaInformation,
    pub times: SegmentTimes,
    pub screen_width: i32,
    pub screen_height: i32,
    pub app_width: i32,
    pub app_height: i32,
    pub resolution_unity_desktop: DesktopResolution,
    pub key_values: Vec<[String; 2]>,
    pub key_bindings: Vec<[String; 2]>,
    pub prompt: i32,
    pub seq_life: Vec<Vec<f64>>,
    pub seq_mouse: Vec<Vec<f64>>,
    pub seq_key: Vec<Vec<f64>>,
    pub seq_resolution: Vec<Vec<f64>>,
}

/// Summary passed next to the payload to JSON callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    pub app_token: String,
    pub platform: i32,
    pub seg_name: Option<String>,
    pub seg_count: u32,
    pub user_id: Option<String>,
    pub additional_id: Option<String>,
    pub sdk_version_name: String,
    pub mode: i32,
}

impl From<&DataSegment> for Headers {
    fn from(data: &DataSegment) -> Self {
        Self {
            app_token: data.app_token.clone(),
            platform: data.platform,
            seg_name: data.seg_name.clone(),
            seg_count: data.seg_count,
            user_id: data.user_id.clone(),
            additional_id: data.additional_id.clone(),
            sdk_version_name: data.sdk_version_name.clone(),
            mode: data.mode,
        }
    }
}

/// Request body posted to the collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    pub app_token: String,
    pub env: String,
    pub sdk_version: String,
    /// `base64(gzip(json(DataSegment)))`
    pub payload: String,
}

impl ServerEnvelope {
    pub fn seal(data: &DataSegment, flavor: Flavor) -> Result<Self, PayloadError> {
        let json = serde_json::to_vec(data)?;
        let compressed = gzip(&json)?;
        Ok(Self {
            app_token: data.app_token.clone(),
            env: flavor.env().to_string(),
            sdk_version: data.sdk_version_name.clone(),
            payload: base64::engine::general_purpose::STANDARD.encode(compressed),
        })
    }

    /// Decode the payload back into a segment.
    pub fn open(&self) -> Result<DataSegment, PayloadError> {
        let compressed = base64::engine::general_purpose::STANDARD
            .decode(&self.payload)
            .map_err(|e| PayloadError::Encoding(e.to_string()))?;
        let json = gunzip(&compressed)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum PayloadError {
    Serialize(serde_json::Error),
    Compression(std::io::Error),
    Encoding(String),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Serialize(e) => write!(f, "Failed to serialize payload: {e}"),
            PayloadError::Compression(e) => write!(f, "Failed to compress payload: {e}"),
            PayloadError::Encoding(e) => write!(f, "Invalid payload encoding: {e}"),
        }
    }
}

impl std::error::Error for PayloadError {}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        PayloadError::Serialize(err)
    }
}

impl From<std::io::Error> for PayloadError {
    fn from(err: std::io::Error) -> Self {
        PayloadError::Compression(err)
    }
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>, PayloadError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>, PayloadError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

// ============================================================================
// Builder
// ============================================================================

/// Per-instance values stamped onto every [`DataSegment`].
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    pub app_token: String,
    pub session_id: String,
    pub flavor: Flavor,
    pub wrapper: i32,
    pub wrapper_version: Option<String>,
    pub meta: MetaInformation,
    pub sdk_init_time: i64,
    pub sdk_init_uptime: i64,
}

impl PayloadBuilder {
    /// Assemble the payload of a finished segment.
    pub fn build(
        &self,
        segment: &Segment,
        sequences: Sequences,
        prompt: Prompt,
        mode: Mode,
        key_bindings: Vec<[String; 2]>,
    ) -> DataSegment {
        let display = segment.resolution.unwrap_or_default();

        DataSegment {
            app_token: self.app_token.clone(),
            user_id: segment.user_id.clone(),
            additional_id: segment.additional_id.clone(),
            platform: PLATFORM,
            wrapper: self.wrapper,
            wrapper_version: self.wrapper_version.clone(),
            seg_name: segment.name.clone(),
            seg_id: segment.id.clone(),
            session_id: self.session_id.clone(),
            app_package_name: self.meta.application.package_name.clone(),
            app_version_name: self.meta.application.version_name.clone(),
            sdk_version_name: SDK_VERSION_NAME.to_string(),
            seg_count: segment.counter,
            mode: mode.code(),
            flavor: self.flavor.code(),
            meta_unity_desktop: self.meta.clone(),
            times: SegmentTimes {
                ts_start: segment.time_start,
                ts_end: segment.time_end,
                uptime_start: segment.uptime_start,
                uptime_end: segment.uptime_end,
                ts_sdk_init: self.sdk_init_time,
                uptime_sdk_init: self.sdk_init_uptime,
            },
            screen_width: display.screen_width,
            screen_height: display.screen_height,
            app_width: display.app_width,
            app_height: display.app_height,
            resolution_unity_desktop: DesktopResolution {
                window_pos_x: display.window_x,
                window_pos_y: display.window_y,
                refresh_rate: display.refresh_rate,
                dpi: display.dpi,
                is_full_screen: display.full_screen,
            },
            key_values: segment.key_value_pairs(),
            key_bindings,
            prompt: prompt.code(),
            seq_life: sequences.life,
            seq_mouse: sequences.mouse,
            seq_key: sequences.key,
            seq_resolution: sequences.resolution,
        }
    }
}
