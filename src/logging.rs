//! Diagnostics for mftpath
//!
//! Components never reach for a global logger. Each one is handed an
//! `Arc<dyn Diagnostics>` and writes `[timestamp] [LEVEL] [MODULE] message`
//! entries through it. Sinks decide where those entries end up.

use console::style;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // pad() so the file format's {:5} column width applies
        f.pad(match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

/// Sink for diagnostics emitted by the decoder, pipeline and resolver
pub trait Diagnostics: Send + Sync {
    /// Write a single entry
    fn log(&self, level: LogLevel, module: &str, message: &str);

    fn debug(&self, module: &str, message: &str) {
        self.log(LogLevel::Debug, module, message);
    }

    fn info(&self, module: &str, message: &str) {
        self.log(LogLevel::Info, module, message);
    }

    fn warn(&self, module: &str, message: &str) {
        self.log(LogLevel::Warn, module, message);
    }

    fn error(&self, module: &str, message: &str) {
        self.log(LogLevel::Error, module, message);
    }

    /// Write a separator line for readability
    fn separator(&self, label: &str) {
        self.info("---", &format!("========== {} ==========", label));
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn format_entry(level: LogLevel, module: &str, message: &str) -> String {
    format!("[{:013}] [{:5}] [{}] {}\n", now_millis(), level, module, message)
}

// ============================================================================
// File sink
// ============================================================================

/// Appends entries to a log file
pub struct FileLogger {
    file: Mutex<File>,
    min_level: LogLevel,
}

impl FileLogger {
    /// Create (truncating) the log file at `path`
    pub fn create(path: impl AsRef<Path>, min_level: LogLevel) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            min_level,
        })
    }

    /// Flush buffered entries to disk
    pub fn flush(&self) {
        let _ = self.file.lock().flush();
    }
}

impl Diagnostics for FileLogger {
    fn log(&self, level: LogLevel, module: &str, message: &str) {
        if level < self.min_level {
            return;
        }
        let entry = format_entry(level, module, message);
        let mut file = self.file.lock();
        let _ = file.write_all(entry.as_bytes());
    }
}

// ============================================================================
// Console sink
// ============================================================================

/// Writes warnings and errors to stderr with coloured level tags
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Diagnostics for ConsoleLogger {
    fn log(&self, level: LogLevel, module: &str, message: &str) {
        if level < self.min_level {
            return;
        }
        let tag = match level {
            LogLevel::Debug => style(level.to_string()).dim(),
            LogLevel::Info => style(level.to_string()).cyan(),
            LogLevel::Warn => style(level.to_string()).yellow(),
            LogLevel::Error => style(level.to_string()).red().bold(),
        };
        eprintln!("[{}] [{}] {}", tag, module, message);
    }
}

// ============================================================================
// In-memory and no-op sinks
// ============================================================================

/// A captured diagnostics entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: String,
    pub message: String,
}

/// Keeps every entry in memory
#[derive(Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Number of entries at or above `level`
    pub fn count_at_least(&self, level: LogLevel) -> usize {
        self.entries.lock().iter().filter(|e| e.level >= level).count()
    }
}

impl Diagnostics for MemoryLogger {
    fn log(&self, level: LogLevel, module: &str, message: &str) {
        self.entries.lock().push(LogEntry {
            level,
            module: module.to_string(),
            message: message.to_string(),
        });
    }
}

/// Discards everything
pub struct NullLogger;

impl Diagnostics for NullLogger {
    fn log(&self, _level: LogLevel, _module: &str, _message: &str) {}
}

/// Shared no-op diagnostics handle
pub fn null() -> Arc<dyn Diagnostics> {
    Arc::new(NullLogger)
}
