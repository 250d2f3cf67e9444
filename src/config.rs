//! Configuration for the Quago SDK.
//!
//! [`Settings`] is the immutable value the host builds once and hands to the
//! SDK at initialization. [`RuntimeConfig`] is an optional JSON file that lets
//! hosts initializing through the C ABI tune transport and tracking behavior.

use crate::logging::LogCallback;
use crate::network::NetworkSettings;
use crate::{SDK_VERSION_CODE, SDK_VERSION_NAME};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Host JSON sink: `(headers_json, payload_json)`.
pub type JsonCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

// ============================================================================
// Enumerations
// ============================================================================

/// Log verbosity. Messages below the configured level are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Verbose = 2,
    Debug = 3,
    Info = 4,
    Warning = 5,
    Error = 6,
    Disabled = 10,
}

impl LogLevel {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl TryFrom<i32> for LogLevel {
    type Error = SettingsError;

    fn try_from(code: i32) -> Result<Self, SettingsError> {
        match code {
            2 => Ok(LogLevel::Verbose),
            3 => Ok(LogLevel::Debug),
            4 => Ok(LogLevel::Info),
            5 => Ok(LogLevel::Warning),
            6 => Ok(LogLevel::Error),
            10 => Ok(LogLevel::Disabled),
            other => Err(SettingsError::UnknownLogLevel(other)),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "verbose" => Ok(LogLevel::Verbose),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "disabled" | "off" => Ok(LogLevel::Disabled),
            _ => Err(SettingsError::UnknownName(s.to_string())),
        }
    }
}

/// Build/deployment variant of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Authentic = 0,
    Unauthentic = 1,
    Production = 2,
    Development = 3,
}

impl Flavor {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Collection environment this flavor reports to.
    pub fn env(self) -> &'static str {
        match self {
            Flavor::Production => "prod",
            _ => "stage",
        }
    }
}

impl TryFrom<i32> for Flavor {
    type Error = SettingsError;

    fn try_from(code: i32) -> Result<Self, SettingsError> {
        match code {
            0 => Ok(Flavor::Authentic),
            1 => Ok(Flavor::Unauthentic),
            2 => Ok(Flavor::Production),
            3 => Ok(Flavor::Development),
            other => Err(SettingsError::UnknownFlavor(other)),
        }
    }
}

impl std::str::FromStr for Flavor {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "authentic" => Ok(Flavor::Authentic),
            "unauthentic" => Ok(Flavor::Unauthentic),
            "production" | "prod" => Ok(Flavor::Production),
            "development" | "dev" => Ok(Flavor::Development),
            _ => Err(SettingsError::UnknownName(s.to_string())),
        }
    }
}

// ============================================================================
// Settings components
// ============================================================================

/// Shortest interval between two rollover checks.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Thresholds that roll an auto-tracking segment over to a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Motion events that complete a segment
    pub motion_amount: u32,
    /// Maximum lifetime of a single tracking segment
    #[serde(with = "duration_serde")]
    pub max_duration: Duration,
    /// How often the rollover conditions are evaluated
    #[serde(with = "duration_serde")]
    pub check_interval: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            motion_amount: 100,
            max_duration: Duration::from_secs(5 * 60),
            check_interval: Duration::from_secs(30),
        }
    }
}

impl TrackingConfig {
    /// Check interval used by the scheduler, never below [`MIN_CHECK_INTERVAL`].
    pub fn effective_check_interval(&self) -> Duration {
        self.check_interval.max(MIN_CHECK_INTERVAL)
    }
}

/// Maximum exported events per stream. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimits {
    pub motion: usize,
    pub keys: usize,
    pub resolution: usize,
    pub lifecycle: usize,
}

/// Host application identity reported with each segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub package_name: Option<String>,
    pub version_name: Option<String>,
}

// ============================================================================
// Settings
// ============================================================================

/// Immutable SDK settings, produced by [`SettingsBuilder`].
#[derive(Clone)]
pub struct Settings {
    app_token: String,
    flavor: Flavor,
    log_level: LogLevel,
    manual_motion_dispatcher: bool,
    manual_keys_dispatcher: bool,
    init_segment_disabled: bool,
    wrapper: i32,
    wrapper_version: Option<String>,
    max_segments: Option<u32>,
    tracking: TrackingConfig,
    query_limits: QueryLimits,
    app_info: AppInfo,
    network: NetworkSettings,
    logger: Option<LogCallback>,
    callback: Option<JsonCallback>,
}

impl Settings {
    pub fn builder(app_token: impl Into<String>, flavor: Flavor) -> SettingsBuilder {
        SettingsBuilder::new(app_token, flavor)
    }

    pub fn app_token(&self) -> &str {
        &self.app_token
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn manual_motion_dispatcher(&self) -> bool {
        self.manual_motion_dispatcher
    }

    pub fn manual_keys_dispatcher(&self) -> bool {
        self.manual_keys_dispatcher
    }

    pub fn init_segment_disabled(&self) -> bool {
        self.init_segment_disabled
    }

    pub fn wrapper(&self) -> i32 {
        self.wrapper
    }

    pub fn wrapper_version(&self) -> Option<&str> {
        self.wrapper_version.as_deref()
    }

    /// `None` means unlimited.
    pub fn max_segments(&self) -> Option<u32> {
        self.max_segments
    }

    pub fn tracking(&self) -> &TrackingConfig {
        &self.tracking
    }

    pub fn query_limits(&self) -> QueryLimits {
        self.query_limits
    }

    pub fn app_info(&self) -> &AppInfo {
        &self.app_info
    }

    pub fn network(&self) -> &NetworkSettings {
        &self.network
    }

    pub fn logger(&self) -> Option<&LogCallback> {
        self.logger.as_ref()
    }

    pub fn callback(&self) -> Option<&JsonCallback> {
        self.callback.as_ref()
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token: String = self.app_token.chars().take(4).collect();
        writeln!(f, "sdkVersion = {SDK_VERSION_NAME} ({SDK_VERSION_CODE})")?;
        writeln!(f, "appToken = {token}****")?;
        writeln!(f, "flavor = {:?}", self.flavor)?;
        writeln!(f, "logLevel = {:?}", self.log_level)?;
        writeln!(f, "manualMotionDispatcher = {}", self.manual_motion_dispatcher)?;
        writeln!(f, "manualKeysDispatcher = {}", self.manual_keys_dispatcher)?;
        writeln!(f, "initSegmentDisabled = {}", self.init_segment_disabled)?;
        writeln!(
            f,
            "wrapper = {} ({})",
            self.wrapper,
            self.wrapper_version.as_deref().unwrap_or("native")
        )?;
        match self.max_segments {
            Some(max) => writeln!(f, "maxSegments = {max}")?,
            None => writeln!(f, "maxSegments = unlimited")?,
        }
        writeln!(f, "jsonCallback = {}", self.callback.is_some())?;
        write!(f, "loggerCallback = {}", self.logger.is_some())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("flavor", &self.flavor)
            .field("log_level", &self.log_level)
            .field("manual_motion_dispatcher", &self.manual_motion_dispatcher)
            .field("manual_keys_dispatcher", &self.manual_keys_dispatcher)
            .field("init_segment_disabled", &self.init_segment_disabled)
            .field("wrapper", &self.wrapper)
            .field("wrapper_version", &self.wrapper_version)
            .field("max_segments", &self.max_segments)
            .field("tracking", &self.tracking)
            .field("query_limits", &self.query_limits)
            .field("app_info", &self.app_info)
            .field("network", &self.network)
            .field("logger", &self.logger.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Accumulates settings before freezing them into [`Settings`].
#[derive(Clone)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn new(app_token: impl Into<String>, flavor: Flavor) -> Self {
        Self {
            settings: Settings {
                app_token: app_token.into(),
                flavor,
                log_level: LogLevel::default(),
                manual_motion_dispatcher: false,
                manual_keys_dispatcher: false,
                init_segment_disabled: false,
                wrapper: 0,
                wrapper_version: None,
                max_segments: None,
                tracking: TrackingConfig::default(),
                query_limits: QueryLimits::default(),
                app_info: AppInfo::default(),
                network: NetworkSettings::default(),
                logger: None,
                callback: None,
            },
        }
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.settings.log_level = level;
        self
    }

    pub fn manual_motion_dispatcher(mut self, enabled: bool) -> Self {
        self.settings.manual_motion_dispatcher = enabled;
        self
    }

    pub fn manual_keys_dispatcher(mut self, enabled: bool) -> Self {
        self.settings.manual_keys_dispatcher = enabled;
        self
    }

    pub fn disable_init_segment(mut self, disabled: bool) -> Self {
        self.settings.init_segment_disabled = disabled;
        self
    }

    pub fn wrapper(mut self, wrapper: i32, version: Option<String>) -> Self {
        self.settings.wrapper = wrapper;
        self.settings.wrapper_version = version;
        self
    }

    pub fn max_segments(mut self, max: Option<u32>) -> Self {
        self.settings.max_segments = max;
        self
    }

    pub fn tracking(mut self, tracking: TrackingConfig) -> Self {
        self.settings.tracking = tracking;
        self
    }

    pub fn query_limits(mut self, limits: QueryLimits) -> Self {
        self.settings.query_limits = limits;
        self
    }

    pub fn app_info(mut self, info: AppInfo) -> Self {
        self.settings.app_info = info;
        self
    }

    pub fn network(mut self, network: NetworkSettings) -> Self {
        self.settings.network = network;
        self
    }

    pub fn logger<F>(mut self, callback: F) -> Self
    where
        F: Fn(LogLevel, &str, &str) + Send + Sync + 'static,
    {
        self.settings.logger = Some(Arc::new(callback));
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.settings.callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<Settings, SettingsError> {
        if self.settings.app_token.trim().is_empty() {
            return Err(SettingsError::EmptyAppToken);
        }
        Ok(self.settings)
    }
}

/// Settings validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    EmptyAppToken,
    UnknownFlavor(i32),
    UnknownLogLevel(i32),
    UnknownName(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::EmptyAppToken => write!(f, "App token must not be empty"),
            SettingsError::UnknownFlavor(code) => write!(f, "Unknown flavor code: {code}"),
            SettingsError::UnknownLogLevel(code) => write!(f, "Unknown log level code: {code}"),
            SettingsError::UnknownName(name) => write!(f, "Unknown value: {name}"),
        }
    }
}

impl std::error::Error for SettingsError {}

// ============================================================================
// Runtime config file
// ============================================================================

/// Host-local overrides read from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl RuntimeConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quago-sdk")
            .join("config.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, stored as milliseconds.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
