//! Leveled logger that routes SDK output to the host or to `tracing`.
//!
//! Hosts embedding the SDK through the C ABI usually want log lines inside
//! their own console, so a registered callback takes precedence over the
//! `tracing` subscriber.

use crate::config::LogLevel;
use std::fmt;
use std::sync::Arc;

/// Tag passed to host log callbacks.
pub const LOG_TAG: &str = "QUAGO-SDK";

/// Host log sink: `(level, tag, message)`.
pub type LogCallback = Arc<dyn Fn(LogLevel, &str, &str) + Send + Sync>;

/// A cheap, cloneable logger bound to a component name.
#[derive(Clone)]
pub struct Logger {
    level: LogLevel,
    callback: Option<LogCallback>,
    component: &'static str,
}

impl Logger {
    pub fn new(level: LogLevel, callback: Option<LogCallback>) -> Self {
        Self {
            level,
            callback,
            component: "Sdk",
        }
    }

    /// A logger that forwards everything to `tracing` at `Info` and above.
    pub fn tracing_only() -> Self {
        Self::new(LogLevel::Info, None)
    }

    /// Same sink and level, different component name.
    pub fn for_component(&self, component: &'static str) -> Self {
        Self {
            level: self.level,
            callback: self.callback.clone(),
            component,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether a message at `level` would be emitted.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Disabled && level.code() >= self.level.code()
    }

    pub fn log(&self, level: LogLevel, method: &str, message: impl fmt::Display) {
        if !self.enabled(level) {
            return;
        }

        if let Some(callback) = &self.callback {
            let line = format!("{} -> {}() : {}", self.component, method, message);
            callback(level, LOG_TAG, &line);
            return;
        }

        let component = self.component;
        match level {
            LogLevel::Verbose => tracing::trace!(component, method, "{message}"),
            LogLevel::Debug => tracing::debug!(component, method, "{message}"),
            LogLevel::Info => tracing::info!(component, method, "{message}"),
            LogLevel::Warning => tracing::warn!(component, method, "{message}"),
            LogLevel::Error => tracing::error!(component, method, "{message}"),
            LogLevel::Disabled => {}
        }
    }

    pub fn verbose(&self, method: &str, message: impl fmt::Display) {
        self.log(LogLevel::Verbose, method, message);
    }

    pub fn debug(&self, method: &str, message: impl fmt::Display) {
        self.log(LogLevel::Debug, method, message);
    }

    pub fn info(&self, method: &str, message: impl fmt::Display) {
        self.log(LogLevel::Info, method, message);
    }

    pub fn warn(&self, method: &str, message: impl fmt::Display) {
        self.log(LogLevel::Warning, method, message);
    }

    pub fn error(&self, method: &str, message: impl fmt::Display) {
        self.log(LogLevel::Error, method, message);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("callback", &self.callback.is_some())
            .field("component", &self.component)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn capture(level: LogLevel) -> (Logger, Arc<Mutex<Vec<(LogLevel, String, String)>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let callback: LogCallback = Arc::new(move |level: LogLevel, tag: &str, msg: &str| {
            sink.lock()
                .unwrap()
                .push((level, tag.to_string(), msg.to_string()));
        });
        (Logger::new(level, Some(callback)), lines)
    }

    #[test]
    fn test_level_gate() {
        let logger = Logger::new(LogLevel::Warning, None);
        assert!(!logger.enabled(LogLevel::Info));
        assert!(logger.enabled(LogLevel::Warning));
        assert!(logger.enabled(LogLevel::Error));
        assert!(!logger.enabled(LogLevel::Disabled));

        let disabled = Logger::new(LogLevel::Disabled, None);
        assert!(!disabled.enabled(LogLevel::Error));
    }

    #[test]
    fn test_callback_receives_formatted_line() {
        let (logger, lines) = capture(LogLevel::Debug);
        let logger = logger.for_component("SegmentManager");

        logger.verbose("handle", "dropped");
        logger.info("handle", format_args!("Segment begin name = {}", "Level1"));

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, LogLevel::Info);
        assert_eq!(lines[0].1, LOG_TAG);
        assert_eq!(
            lines[0].2,
            "SegmentManager -> handle() : Segment begin name = Level1"
        );
    }
}
