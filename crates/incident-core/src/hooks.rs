//! Boundaries to the outside world: notification dispatch, status page
//! publication and session persistence.
//!
//! Sessions call notifiers and status pages only after a transition has been
//! committed, and a failing hook never fails the transition (see
//! [`crate::session`]). Persistence is driven by [`crate::desk::IncidentDesk`].

use crate::error::{IncidentError, Result};
use crate::incident::Incident;
use crate::io;
use crate::types::{Severity, Status};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

pub trait Notifier: Send + Sync {
    fn notify(&self, incident_id: &str, severity: Severity, message: &str) -> Result<()>;
}

pub trait StatusPage: Send + Sync {
    fn publish_status(&self, incident_id: &str, phase: Status) -> Result<()>;
}

pub trait SessionStore: Send + Sync {
    fn persist(&self, incident: &Incident) -> Result<()>;
    fn load(&self, incident_id: &str) -> Result<Incident>;
    fn list_ids(&self) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Notifiers
// ---------------------------------------------------------------------------

/// Emits notifications as structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, incident_id: &str, severity: Severity, message: &str) -> Result<()> {
        tracing::info!(incident = incident_id, %severity, "{message}");
        Ok(())
    }
}

/// Appends one line per notification to a journal file.
#[derive(Debug, Clone)]
pub struct JournalNotifier {
    path: PathBuf,
}

impl JournalNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Notifier for JournalNotifier {
    fn notify(&self, incident_id: &str, severity: Severity, message: &str) -> Result<()> {
        let line = format!(
            "{} {incident_id} {severity} {message}",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        );
        io::append_line(&self.path, &line)
    }
}

/// Sends every notification to each inner notifier; the first error is
/// returned after all of them have been tried.
#[derive(Default)]
pub struct FanOut {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }
}

impl Notifier for FanOut {
    fn notify(&self, incident_id: &str, severity: Severity, message: &str) -> Result<()> {
        let mut first_err = None;
        for n in &self.notifiers {
            if let Err(e) = n.notify(incident_id, severity, message) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Status pages
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatusPage;

impl StatusPage for NullStatusPage {
    fn publish_status(&self, _incident_id: &str, _phase: Status) -> Result<()> {
        Ok(())
    }
}

/// Keeps `incident id -> phase` in a YAML file, rewritten atomically.
#[derive(Debug)]
pub struct StatusFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn read(&self) -> Result<BTreeMap<String, Status>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_yaml::from_str(&content)?)
    }
}

impl StatusPage for StatusFile {
    fn publish_status(&self, incident_id: &str, phase: Status) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| IncidentError::Dispatch("status file lock poisoned".to_string()))?;
        let mut phases = self.read()?;
        phases.insert(incident_id.to_string(), phase);
        let content = serde_yaml::to_string(&phases)?;
        io::atomic_write(&self.path, content.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
