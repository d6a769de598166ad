// Feature logger: the user-facing logger stored on the feature context.
//
// Messages are level-filtered, prefixed with `[Better Feature]:` and either
// handed to a custom `LogHandler` or forwarded to `tracing`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub const LOG_PREFIX: &str = "[Better Feature]:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Success = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" => Self::Debug,
            "info" => Self::Info,
            "success" => Self::Success,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Warn,
        }
    }
}

/// Receives every published log line instead of `tracing`.
pub trait LogHandler: Send + Sync + fmt::Debug {
    fn handle(&self, level: LogLevel, message: &str);
}

/// Logger configuration, built from `FeatureOptions::logger`.
#[derive(Clone)]
pub struct LoggerConfig {
    pub disabled: bool,
    /// Minimum level to publish.
    pub level: LogLevel,
    pub handler: Option<Arc<dyn LogHandler>>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            level: LogLevel::Warn,
            handler: None,
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("disabled", &self.disabled)
            .field("level", &self.level)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct FeatureLogger {
    config: LoggerConfig,
}

impl fmt::Debug for FeatureLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureLogger")
            .field("level", &self.config.level)
            .field("disabled", &self.config.disabled)
            .finish()
    }
}

impl FeatureLogger {
    pub fn new(config: LoggerConfig) -> Self {
        Self { config }
    }

    pub fn level(&self) -> LogLevel {
        self.config.level
    }

    pub fn should_publish(&self, level: LogLevel) -> bool {
        !self.config.disabled && level >= self.config.level
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if !self.should_publish(level) {
            return;
        }

        if let Some(handler) = &self.config.handler {
            // Handlers only know the four standard levels.
            let level = if level == LogLevel::Success {
                LogLevel::Info
            } else {
                level
            };
            handler.handle(level, message);
            return;
        }

        let line = format_line(level, message);
        match level {
            LogLevel::Debug => tracing::debug!("{}", line),
            LogLevel::Info | LogLevel::Success => tracing::info!("{}", line),
            LogLevel::Warn => tracing::warn!("{}", line),
            LogLevel::Error => tracing::error!("{}", line),
        }
    }
}

/// `<rfc3339 timestamp> <LEVEL> [Better Feature]: <message>`
pub fn format_line(level: LogLevel, message: &str) -> String {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    format!("{} {} {} {}", timestamp, level.as_str(), LOG_PREFIX, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Capture {
        lines: Mutex<Vec<(LogLevel, String)>>,
    }

    impl LogHandler for Capture {
        fn handle(&self, level: LogLevel, message: &str) {
            self.lines.lock().unwrap().push((level, message.to_string()));
        }
    }

    fn logger_with(level: LogLevel, capture: Arc<Capture>) -> FeatureLogger {
        FeatureLogger::new(LoggerConfig {
            level,
            handler: Some(capture),
            ..Default::default()
        })
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Success);
        assert!(LogLevel::Success < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_level_filtering() {
        let capture = Arc::new(Capture::default());
        let logger = logger_with(LogLevel::Warn, capture.clone());
        logger.debug("hidden");
        logger.info("hidden");
        logger.warn("shown");
        logger.error("shown too");
        assert_eq!(capture.lines.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_success_is_reported_as_info() {
        let capture = Arc::new(Capture::default());
        let logger = logger_with(LogLevel::Debug, capture.clone());
        logger.success("done");
        let lines = capture.lines.lock().unwrap();
        assert_eq!(lines[0], (LogLevel::Info, "done".to_string()));
    }

    #[test]
    fn test_disabled_logger_publishes_nothing() {
        let logger = FeatureLogger::new(LoggerConfig {
            disabled: true,
            ..Default::default()
        });
        assert!(!logger.should_publish(LogLevel::Error));
    }

    #[test]
    fn test_format_line() {
        let line = format_line(LogLevel::Error, "something failed");
        assert!(line.contains("ERROR [Better Feature]: something failed"));
    }

    #[test]
    fn test_level_from_str_and_serde() {
        assert_eq!(LogLevel::from("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from("nonsense"), LogLevel::Warn);
        let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(level, LogLevel::Debug);
    }
}
