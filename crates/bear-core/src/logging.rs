//! Per-session log files.
//!
//! A [`SessionLog`] is created explicitly by whoever owns the session and
//! handed to the components that write to it. There is no global logger in
//! this crate; ambient diagnostics go through the `log` facade and whatever
//! backend the binary installs.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

/// Severity of a session log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Thread-safe handle to an append-only session log file.
///
/// Cloning is cheap; all clones write to the same file. A disabled handle
/// accepts writes and drops them.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    file: Arc<Mutex<Option<File>>>,
    path: Option<PathBuf>,
}

impl SessionLog {
    /// Open (or create) `{log_dir}/bear-{session_id}.log`.
    ///
    /// Never fails: if the file cannot be opened the handle is disabled and a
    /// warning is emitted through the `log` facade.
    pub fn open(log_dir: &Path, session_id: &str) -> Self {
        let path = log_dir.join(format!("bear-{}.log", session_id));
        let file = std::fs::create_dir_all(log_dir).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
        });

        match file {
            Ok(file) => Self {
                file: Arc::new(Mutex::new(Some(file))),
                path: Some(path),
            },
            Err(e) => {
                log::warn!("Failed to open session log {}: {}", path.display(), e);
                Self::disabled()
            }
        }
    }

    /// A handle that writes nowhere.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.file.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Write a timestamped line: `[ts] LEVEL tag: message`.
    pub fn write(&self, level: LogLevel, tag: &str, message: &str) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(ref mut file) = *guard {
                let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                let _ = writeln!(file, "[{}] {} {}: {}", ts, level.as_str(), tag, message);
                let _ = file.flush();
            }
        }
    }

    pub fn debug(&self, tag: &str, message: &str) {
        self.write(LogLevel::Debug, tag, message);
    }

    pub fn info(&self, tag: &str, message: &str) {
        self.write(LogLevel::Info, tag, message);
    }

    pub fn warn(&self, tag: &str, message: &str) {
        self.write(LogLevel::Warning, tag, message);
    }

    pub fn error(&self, tag: &str, message: &str) {
        self.write(LogLevel::Error, tag, message);
    }

    /// Flush and release the file. Later writes through any clone are dropped.
    pub fn close(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(mut file) = guard.take() {
                let _ = file.flush();
            }
        }
    }
}
