//! Automatic capture path.
//!
//! Engine-side input hooks push [`SensorEvent`]s into a bounded channel; a
//! pump thread stamps them with SDK uptime and records them in the
//! [`DataStore`]. Streams the host dispatches manually are skipped here, and
//! key events are recorded only for keys that have a binding.

use crate::clock::Clock;
use crate::collector::store::DataStore;
use crate::collector::types::SensorEvent;
use crate::keymap::KeyBindings;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Channel capacity between capture hooks and the pump thread.
pub const CAPTURE_QUEUE_SIZE: usize = 10_000;

/// Which streams the pump records.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub capture_motion: bool,
    pub capture_keys: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            capture_motion: true,
            capture_keys: true,
        }
    }
}

impl CollectorConfig {
    pub fn any_enabled(&self) -> bool {
        self.capture_motion || self.capture_keys
    }
}

/// Errors that can occur during event collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    Spawn(String),
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::Spawn(e) => write!(f, "Failed to start capture thread: {e}"),
        }
    }
}

impl std::error::Error for CollectorError {}

/// Drains hook-submitted events into the data store.
pub struct EventCollector {
    config: CollectorConfig,
    sender: Sender<SensorEvent>,
    receiver: Receiver<SensorEvent>,
    running: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
    store: Arc<DataStore>,
    bindings: Arc<KeyBindings>,
    clock: Clock,
}

impl EventCollector {
    pub fn new(
        config: CollectorConfig,
        store: Arc<DataStore>,
        bindings: Arc<KeyBindings>,
        clock: Clock,
    ) -> Self {
        let (sender, receiver) = bounded(CAPTURE_QUEUE_SIZE);
        Self {
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            pump: None,
            store,
            bindings,
            clock,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Start the pump thread.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        let running = self.running.clone();
        let receiver = self.receiver.clone();
        let store = self.store.clone();
        let bindings = self.bindings.clone();
        let clock = self.clock;
        let config = self.config.clone();

        let pump = thread::Builder::new()
            .name("quago-capture".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    match receiver.recv_timeout(Duration::from_millis(100)) {
                        Ok(event) => {
                            record(&store, &bindings, &config, clock.uptime_millis(), event)
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CollectorError::Spawn(e.to_string())
            })?;

        self.pump = Some(pump);
        Ok(())
    }

    /// Stop the pump thread. Events still queued stay in the channel.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sender for engine capture hooks.
    pub fn sender(&self) -> Sender<SensorEvent> {
        self.sender.clone()
    }

    /// Submit without blocking. Returns false when the queue is full or closed.
    pub fn submit(&self, event: SensorEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl Drop for EventCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn record(
    store: &DataStore,
    bindings: &KeyBindings,
    config: &CollectorConfig,
    now: i64,
    event: SensorEvent,
) {
    match event {
        SensorEvent::Motion { kind, x, y, button } if config.capture_motion => {
            store.record_motion(now, kind, x, y, button);
        }
        SensorEvent::Key { action, key_code }
            if config.capture_keys && bindings.is_bound(key_code) =>
        {
            store.record_key(now, action, key_code);
        }
        _ => {}
    }
}
