//! Human-readable trace output for forwards
//!
//! The supervisor writes start command lines, child output, errors and
//! reconnect notices to a [`LogSink`]. Writes never fail from the caller's
//! point of view; sinks swallow their own I/O errors.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Append-only line writer
pub trait LogSink: Send + Sync {
    /// Append one line
    fn append_line(&self, line: &str);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn append_line(&self, line: &str) {
        (**self).append_line(line);
    }
}

/// Sink that re-emits every line as a `tracing` event under target `forward`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append_line(&self, line: &str) {
        tracing::info!(target: "forward", "{}", line);
    }
}

/// Sink that appends lines to a file
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogSink {
    /// Open (or create) `path` for appending
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn append_line(&self, line: &str) {
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::debug!("Failed to write to log file {:?}: {}", self.path, e);
        }
    }
}

/// Sink that keeps every line in memory
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemoryLogSink {
    fn append_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Sink that writes every line to each of its inner sinks
pub struct TeeLogSink {
    sinks: Vec<Box<dyn LogSink>>,
}

impl TeeLogSink {
    /// Combine several sinks
    pub fn new(sinks: Vec<Box<dyn LogSink>>) -> Self {
        Self { sinks }
    }
}

impl LogSink for TeeLogSink {
    fn append_line(&self, line: &str) {
        for sink in &self.sinks {
            sink.append_line(line);
        }
    }
}
