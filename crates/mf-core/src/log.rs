//! The externally observable build-job log.
//!
//! A map build runs to completion on a background worker; the only window
//! the enclosing task-queue layer has into a running job is this log, which
//! it polls through a cloned [`BuildLog`] handle. Entries are appended in
//! call order and become part of the returned job result.

use std::sync::{Arc, Mutex};

use chrono::Utc;

// ── Severity ──────────────────────────────────────────────────────────────────

/// Severity of one log entry.
#[derive(Copy, Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

// ── LogEntry ──────────────────────────────────────────────────────────────────

/// One timestamped message in the job log.
#[derive(Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp taken when the entry was appended.
    pub timestamp: String,
    pub message: String,
    pub severity: Severity,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            message: message.into(),
            severity,
        }
    }
}

// ── BuildLog ──────────────────────────────────────────────────────────────────

/// Shared append-only log handle.
///
/// Cloning is cheap (an `Arc` bump); every clone appends to the same list.
/// A host polling `snapshot()` mid-job sees every entry appended so far —
/// at-least-once visibility, appended in call order.
#[derive(Clone, Default)]
pub struct BuildLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, severity: Severity, message: impl Into<String>) {
        self.push_entry(LogEntry::new(severity, message));
    }

    /// Append an already-stamped entry, keeping its original timestamp.
    /// Use this to forward entries produced elsewhere (e.g. parse-time
    /// warnings) into the job log.
    pub fn push_entry(&self, entry: LogEntry) {
        // A poisoned mutex means another writer panicked mid-push; the list
        // itself is still a valid Vec, so keep appending.
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Copy of every entry appended so far.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
