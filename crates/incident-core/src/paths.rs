use crate::error::{IncidentError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const INCIDENT_DIR: &str = ".incident";
pub const INCIDENTS_DIR: &str = ".incident/incidents";

pub const CONFIG_FILE: &str = ".incident/config.yaml";
pub const STATUS_FILE: &str = ".incident/status.yaml";
pub const NOTIFICATIONS_LOG: &str = ".incident/notifications.log";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn incident_dir(root: &Path) -> PathBuf {
    root.join(INCIDENT_DIR)
}

pub fn incidents_dir(root: &Path) -> PathBuf {
    root.join(INCIDENTS_DIR)
}

pub fn incident_manifest(root: &Path, id: &str) -> PathBuf {
    incidents_dir(root).join(format!("{id}.yaml"))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn status_path(root: &Path) -> PathBuf {
    root.join(STATUS_FILE)
}

pub fn notifications_path(root: &Path) -> PathBuf {
    root.join(NOTIFICATIONS_LOG)
}

// ---------------------------------------------------------------------------
// Identifier validation
// ---------------------------------------------------------------------------

static INCIDENT_ID_RE: OnceLock<Regex> = OnceLock::new();
static RUNBOOK_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn incident_id_re() -> &'static Regex {
    INCIDENT_ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").unwrap())
}

fn runbook_key_re() -> &'static Regex {
    RUNBOOK_KEY_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_]*$").unwrap())
}

/// Incident ids double as file names, so they are restricted to a safe charset.
pub fn validate_incident_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !incident_id_re().is_match(id) {
        return Err(IncidentError::InvalidIncidentId(id.to_string()));
    }
    Ok(())
}

pub fn is_valid_runbook_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 64 && runbook_key_re().is_match(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
