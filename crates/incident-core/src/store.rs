//! File-backed [`SessionStore`]: one YAML manifest per incident under
//! `.incident/incidents/`.

use crate::error::{IncidentError, Result};
use crate::hooks::SessionStore;
use crate::incident::Incident;
use crate::io;
use crate::paths;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct YamlStore {
    root: PathBuf,
}

impl YamlStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SessionStore for YamlStore {
    fn persist(&self, incident: &Incident) -> Result<()> {
        paths::validate_incident_id(&incident.id)?;
        let manifest = paths::incident_manifest(&self.root, &incident.id);
        let data = serde_yaml::to_string(incident)?;
        io::atomic_write(&manifest, data.as_bytes())
    }

    fn load(&self, incident_id: &str) -> Result<Incident> {
        paths::validate_incident_id(incident_id)?;
        let manifest = paths::incident_manifest(&self.root, incident_id);
        if !manifest.exists() {
            return Err(IncidentError::IncidentNotFound(incident_id.to_string()));
        }
        let data = std::fs::read_to_string(&manifest)?;
        let incident: Incident = serde_yaml::from_str(&data)?;
        Ok(incident)
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        let dir = paths::incidents_dir(&self.root);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if paths::validate_incident_id(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
