//! Bounded, durable record of access decisions.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Entries kept on disk; the oldest are dropped beyond this.
pub const MAX_ENTRIES: usize = 1000;

#[derive(Error, Debug)]
pub enum AccessLogError {
    #[error("access log I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("access log encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessStatus {
    #[serde(rename = "PERMITIDO")]
    Granted,
    #[serde(rename = "NEGADO")]
    Denied,
}

impl AccessStatus {
    pub fn from_granted(granted: bool) -> Self {
        if granted {
            Self::Granted
        } else {
            Self::Denied
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "PERMITIDO",
            Self::Denied => "NEGADO",
        }
    }
}

impl std::fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub timestamp: NaiveDateTime,
    pub name: String,
    pub status: AccessStatus,
    pub confidence: Option<f32>,
}

impl AccessLogEntry {
    /// Entry stamped with the current local time.
    pub fn now(name: impl Into<String>, status: AccessStatus, confidence: Option<f32>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            name: name.into(),
            status,
            confidence,
        }
    }
}

/// JSON-array log file, rewritten whole on every append.
#[derive(Debug, Clone)]
pub struct AccessLog {
    path: PathBuf,
    capacity: usize,
}

impl AccessLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, MAX_ENTRIES)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a decision stamped with the current local time.
    pub fn append(
        &self,
        name: &str,
        status: AccessStatus,
        confidence: Option<f32>,
    ) -> Result<AccessLogEntry, AccessLogError> {
        let entry = AccessLogEntry::now(name, status, confidence);
        self.append_entry(entry.clone())?;
        Ok(entry)
    }

    pub fn append_entry(&self, entry: AccessLogEntry) -> Result<(), AccessLogError> {
        let mut entries = self.list();
        entries.push(entry);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&entries)?)?;
        Ok(())
    }

    /// All entries, oldest first. A missing or unreadable log reads as empty.
    pub fn list(&self) -> Vec<AccessLogEntry> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read access log");
                return Vec::new();
            }
        };
        serde_json::from_slice(&data).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "corrupt access log; treating as empty");
            Vec::new()
        })
    }

    /// Delete the log file. Succeeds when there is nothing to delete.
    pub fn clear(&self) -> Result<(), AccessLogError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "access log cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
