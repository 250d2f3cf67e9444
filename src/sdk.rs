//! SDK facade and the process-wide instance used by the C ABI.
//!
//! [`Sdk`] wires the data store, the segment manager worker and delivery
//! together. Everything that changes segment state is forwarded to the
//! manager thread; input dispatch writes straight into the ring buffers.

use crate::clock::Clock;
use crate::collector::{
    BiometricType, CollectorConfig, CollectorError, DataPoint, DataStore, DisplayInfo,
    EventCollector, LifecyclePoint, LifecycleState, ResolutionPoint, SensorEvent,
};
use crate::config::{Settings, SettingsError};
use crate::core::manager::current_display;
use crate::core::{
    Command, Delivery, ManagerContext, MetaInformation, PayloadBuilder, Segment, SegmentManager,
    INIT_SEGMENT_NAME,
};
use crate::id::{generate_id, process_session_id};
use crate::keymap::KeyBindings;
use crate::logging::Logger;
use crate::network::{default_transport, NetworkError, NetworkModule};
use crate::stats::{SdkStats, SharedStats};
use crate::worker::Worker;
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum SdkError {
    Settings(SettingsError),
    AlreadyInitialized,
    NotInitialized,
    Network(NetworkError),
    Spawn(String),
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkError::Settings(e) => write!(f, "Invalid settings: {e}"),
            SdkError::AlreadyInitialized => write!(f, "SDK is already initialized"),
            SdkError::NotInitialized => write!(f, "SDK is not initialized"),
            SdkError::Network(e) => write!(f, "Failed to set up delivery: {e}"),
            SdkError::Spawn(e) => write!(f, "Failed to start SDK thread: {e}"),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<SettingsError> for SdkError {
    fn from(err: SettingsError) -> Self {
        SdkError::Settings(err)
    }
}

impl From<NetworkError> for SdkError {
    fn from(err: NetworkError) -> Self {
        SdkError::Network(err)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Sdk
// ============================================================================

/// A running SDK instance.
pub struct Sdk {
    settings: Settings,
    session_id: String,
    clock: Clock,
    store: Arc<DataStore>,
    bindings: Arc<KeyBindings>,
    stats: SharedStats,
    manager: Mutex<Option<Worker<Command>>>,
    collector: Mutex<Option<EventCollector>>,
    logger: Logger,
}

impl Sdk {
    /// Start an instance with a fresh session id.
    pub fn new(settings: Settings) -> Result<Self, SdkError> {
        Self::with_session_id(settings, generate_id())
    }

    fn with_session_id(settings: Settings, session_id: String) -> Result<Self, SdkError> {
        let clock = Clock::start();
        let sdk_init_time = clock.timestamp_millis();
        let sdk_init_uptime = clock.uptime_millis();

        let logger = Logger::new(settings.log_level(), settings.logger().cloned());
        let stats: SharedStats = Arc::new(SdkStats::new());
        let store = Arc::new(DataStore::new(stats.clone(), &logger));
        let bindings = Arc::new(KeyBindings::new());

        let delivery = match settings.callback() {
            Some(callback) => Delivery::Callback(callback.clone()),
            None => {
                let transport = default_transport(settings.network())?;
                let network = NetworkModule::new(
                    settings.network().clone(),
                    transport,
                    stats.clone(),
                    &logger,
                )
                .map_err(|e| SdkError::Spawn(e.to_string()))?;
                Delivery::Network(network)
            }
        };

        let ctx = ManagerContext {
            store: store.clone(),
            bindings: bindings.clone(),
            clock,
            payload: PayloadBuilder {
                app_token: settings.app_token().to_string(),
                session_id: session_id.clone(),
                flavor: settings.flavor(),
                wrapper: settings.wrapper(),
                wrapper_version: settings.wrapper_version().map(str::to_string),
                meta: MetaInformation::collect(settings.app_info()),
                sdk_init_time,
                sdk_init_uptime,
            },
            delivery,
            max_segments: settings.max_segments(),
            tracking: settings.tracking().clone(),
            query_limits: settings.query_limits(),
            stats: stats.clone(),
            logger: logger.clone(),
        };

        let manager = Worker::spawn("quago-manager", logger.clone(), |handle| {
            SegmentManager::new(ctx, handle)
        })
        .map_err(|e| SdkError::Spawn(e.to_string()))?;

        let sdk = Self {
            session_id,
            clock,
            store,
            bindings,
            stats,
            manager: Mutex::new(Some(manager)),
            collector: Mutex::new(None),
            logger: logger.for_component("Sdk"),
            settings,
        };

        sdk.logger
            .debug("new", format_args!("Settings:\n{}", sdk.settings));
        sdk.send("new", Command::Init);
        if !sdk.settings.init_segment_disabled() {
            sdk.send(
                "new",
                Command::SegmentBegin(sdk.new_segment(INIT_SEGMENT_NAME)),
            );
            sdk.send("new", Command::SegmentEnd);
        }

        Ok(sdk)
    }

    fn new_segment(&self, name: &str) -> Segment {
        Segment::named(name, generate_id(), current_display(&self.store))
    }

    fn send(&self, method: &str, command: Command) {
        let manager = lock(&self.manager);
        let sent = manager.as_ref().map_or(false, |worker| worker.send(command));
        if !sent {
            self.logger
                .warn(method, "SDK was released, ignoring call");
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    /// Milliseconds since this instance started.
    pub fn uptime_millis(&self) -> i64 {
        self.clock.uptime_millis()
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Segments
    // ------------------------------------------------------------------------

    /// Begin a named segment, ending the active one.
    pub fn begin_segment(&self, name: &str) {
        if name == INIT_SEGMENT_NAME {
            self.logger.error(
                "begin_segment",
                format_args!("Can't use {INIT_SEGMENT_NAME} as a segment name"),
            );
            return;
        }
        self.send("begin_segment", Command::SegmentBegin(self.new_segment(name)));
    }

    pub fn end_segment(&self) {
        self.send("end_segment", Command::SegmentEnd);
    }

    /// Begin an automatically rolling tracking segment.
    pub fn begin_tracking(&self, user_id: Option<&str>) {
        let segment = Segment::tracking(
            user_id.map(str::to_string),
            generate_id(),
            current_display(&self.store),
        );
        self.send("begin_tracking", Command::TrackingBegin(segment));
    }

    pub fn end_tracking(&self) {
        self.send("end_tracking", Command::TrackingEnd);
    }

    pub fn set_key_value(&self, key: &str, value: &str) {
        self.send(
            "set_key_value",
            Command::SetKeyValue(key.to_string(), value.to_string()),
        );
    }

    pub fn set_user_id(&self, user_id: &str) {
        self.send("set_user_id", Command::SetUserId(user_id.to_string()));
    }

    pub fn set_additional_id(&self, additional_id: &str) {
        self.send(
            "set_additional_id",
            Command::SetAdditionalId(additional_id.to_string()),
        );
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    /// Record a mouse event stamped with the current uptime.
    pub fn dispatch_motion(&self, kind: BiometricType, x: f32, y: f32, button: i32) {
        self.dispatch_motion_at(self.clock.uptime_millis(), kind, x, y, button);
    }

    pub fn dispatch_motion_at(&self, event_time: i64, kind: BiometricType, x: f32, y: f32, button: i32) {
        if !self.settings.manual_motion_dispatcher() {
            self.logger.verbose(
                "dispatch_motion",
                "Manual motion dispatcher is disabled, ignoring",
            );
            return;
        }
        self.store.record_motion(event_time, kind, x, y, button);
    }

    /// Record a key transition stamped with the current uptime.
    pub fn dispatch_key(&self, action: i32, key_code: i32) {
        self.dispatch_key_at(self.clock.uptime_millis(), action, key_code);
    }

    pub fn dispatch_key_at(&self, event_time: i64, action: i32, key_code: i32) {
        if !self.settings.manual_keys_dispatcher() {
            self.logger
                .verbose("dispatch_key", "Manual keys dispatcher is disabled, ignoring");
            return;
        }
        self.store.record_key(event_time, action, key_code);
    }

    /// Start the automatic capture pump and return the sender for engine hooks.
    ///
    /// Streams with a manual dispatcher are not captured.
    pub fn start_capture(&self) -> Result<Sender<SensorEvent>, CollectorError> {
        let mut slot = lock(&self.collector);
        if let Some(collector) = slot.as_ref() {
            if collector.is_running() {
                return Err(CollectorError::AlreadyRunning);
            }
        }

        let config = CollectorConfig {
            capture_motion: !self.settings.manual_motion_dispatcher(),
            capture_keys: !self.settings.manual_keys_dispatcher(),
        };
        if !config.any_enabled() {
            self.logger.warn(
                "start_capture",
                "Both streams use manual dispatch, capture will record nothing",
            );
        }

        let mut collector = EventCollector::new(
            config,
            self.store.clone(),
            self.bindings.clone(),
            self.clock,
        );
        collector.start()?;
        let sender = collector.sender();
        *slot = Some(collector);
        Ok(sender)
    }

    pub fn stop_capture(&self) {
        if let Some(mut collector) = lock(&self.collector).take() {
            collector.stop();
        }
    }

    pub fn capture_sender(&self) -> Option<Sender<SensorEvent>> {
        lock(&self.collector).as_ref().map(EventCollector::sender)
    }

    // ------------------------------------------------------------------------
    // Lifecycle and display
    // ------------------------------------------------------------------------

    fn record_lifecycle(&self, method: &str, state: LifecycleState) {
        self.logger.info(method, "Called");
        self.store.record_lifecycle(LifecyclePoint {
            event_time: self.clock.uptime_millis(),
            state,
        });
    }

    pub fn on_resume(&self) {
        self.record_lifecycle("on_resume", LifecycleState::Resume);
    }

    pub fn on_pause(&self) {
        self.record_lifecycle("on_pause", LifecycleState::Pause);
    }

    pub fn on_stop(&self) {
        self.record_lifecycle("on_stop", LifecycleState::Stop);
    }

    /// Focus gained maps to resume, focus lost to pause.
    pub fn on_focus(&self, has_focus: bool) {
        if has_focus {
            self.on_resume();
        } else {
            self.on_pause();
        }
    }

    /// Record the display state when it differs from the last one.
    pub fn update_display(&self, display: DisplayInfo) {
        let point = ResolutionPoint::new(self.clock.uptime_millis(), display);
        self.logger
            .debug("update_display", format_args!("{display:?}"));
        self.store.record_resolution_if_changed(point);
    }

    /// Bind `key_code` to `name`; `None` removes the binding of the key.
    pub fn bind_key(&self, name: Option<&str>, key_code: i32) {
        self.bindings.bind(name, key_code);
    }

    pub fn key_bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Stop capture, the manager thread and the network module.
    pub fn release(&self) {
        self.stop_capture();
        let manager = lock(&self.manager).take();
        if let Some(manager) = manager {
            manager.send(Command::Release);
            manager.quit_safely();
            self.logger.info("release", "Released");
        }
    }
}

impl Drop for Sdk {
    fn drop(&mut self) {
        self.release();
    }
}

// ============================================================================
// Process-wide instance
// ============================================================================

static INSTANCE: OnceLock<Sdk> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize the process-wide SDK. Only the first call takes effect.
pub fn initialize(settings: Settings) -> Result<&'static Sdk, SdkError> {
    let _guard = lock(&INIT_LOCK);
    if INSTANCE.get().is_some() {
        tracing::warn!("SDK already initialized, ignoring initialize()");
        return Err(SdkError::AlreadyInitialized);
    }

    let sdk = Sdk::with_session_id(settings, process_session_id().to_string())?;
    Ok(INSTANCE.get_or_init(|| sdk))
}

pub fn instance() -> Option<&'static Sdk> {
    INSTANCE.get()
}

/// The process-wide SDK, or `NotInitialized`.
pub fn require_instance() -> Result<&'static Sdk, SdkError> {
    INSTANCE.get().ok_or(SdkError::NotInitialized)
}

/// Session id of the process-wide SDK, available before initialization.
pub fn session_id() -> &'static str {
    process_session_id()
}

fn with_instance(method: &str, f: impl FnOnce(&Sdk)) {
    match require_instance() {
        Ok(sdk) => f(sdk),
        Err(e) => tracing::warn!(method, error = %e, "Ignoring call"),
    }
}

pub fn begin_segment(name: &str) {
    with_instance("begin_segment", |sdk| sdk.begin_segment(name));
}

pub fn end_segment() {
    with_instance("end_segment", Sdk::end_segment);
}

pub fn begin_tracking(user_id: Option<&str>) {
    with_instance("begin_tracking", |sdk| sdk.begin_tracking(user_id));
}

pub fn end_tracking() {
    with_instance("end_tracking", Sdk::end_tracking);
}

pub fn set_key_value(key: &str, value: &str) {
    with_instance("set_key_value", |sdk| sdk.set_key_value(key, value));
}

pub fn set_user_id(user_id: &str) {
    with_instance("set_user_id", |sdk| sdk.set_user_id(user_id));
}

pub fn set_additional_id(additional_id: &str) {
    with_instance("set_additional_id", |sdk| {
        sdk.set_additional_id(additional_id)
    });
}

pub fn dispatch_motion(kind: BiometricType, x: f32, y: f32, button: i32) {
    with_instance("dispatch_motion", |sdk| {
        sdk.dispatch_motion(kind, x, y, button)
    });
}

pub fn dispatch_key(action: i32, key_code: i32) {
    with_instance("dispatch_key", |sdk| sdk.dispatch_key(action, key_code));
}

pub fn on_focus(has_focus: bool) {
    with_instance("on_focus", |sdk| sdk.on_focus(has_focus));
}

pub fn on_stop() {
    with_instance("on_stop", Sdk::on_stop);
}

pub fn update_display(display: DisplayInfo) {
    with_instance("update_display", |sdk| sdk.update_display(display));
}

pub fn bind_key(name: Option<&str>, key_code: i32) {
    with_instance("bind_key", |sdk| sdk.bind_key(name, key_code));
}
