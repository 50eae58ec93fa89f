//! Pipeline logs, printed and streamed via Server-Sent Events (SSE).
//!
//! Loader and server progress goes through a broadcast channel so the
//! presentation layer can follow fetches and cache activity live.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::sync::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered entries per slow subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 100;

/// Log level for frontend display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Reporting year the entry is about, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            year: None,
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl LogBroadcaster {
    /// Broadcaster printing to stderr, so CLI output on stdout stays clean.
    pub fn new() -> Self {
        Self::with_output(io::stderr())
    }

    /// Broadcaster printing to another writer.
    pub fn with_output(output: impl Write + Send + 'static) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Print an entry and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        {
            let mut out = self.output.lock().unwrap_or_else(|e| e.into_inner());
            let _ = match entry.year {
                Some(ref year) => writeln!(out, "{} [{}] {}", prefix, year, entry.message),
                None => writeln!(out, "{} {}", prefix, entry.message),
            };
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

/// Log an entry tagged with a reporting year.
pub fn log_year(level: LogLevel, year: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(level, msg).with_year(year));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_receive_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.log(LogEntry::success("loaded").with_year("2023"));

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Success);
        assert_eq!(entry.year.as_deref(), Some("2023"));
    }

    /// Writer whose bytes the test can read back.
    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lines_go_to_configured_output() {
        let captured = Captured::default();
        let broadcaster = LogBroadcaster::with_output(captured.clone());

        broadcaster.log(LogEntry::info("Fetching source x").with_year("2023"));
        broadcaster.log(LogEntry::warning("cache cleared"));

        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "    [2023] Fetching source x\n   ⚠️ cache cleared\n");
    }

    #[test]
    fn test_entry_json_shape() {
        let json = serde_json::to_value(LogEntry::warning("cache miss")).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "cache miss");
        assert!(json.get("year").is_none());
        assert!(json.get("timestamp").is_some());
    }
}
