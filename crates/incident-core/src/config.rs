use crate::error::{IncidentError, Result};
use crate::hooks::{FanOut, JournalNotifier, LogNotifier, NullStatusPage, StatusFile};
use crate::paths;
use crate::runbook::{Runbook, RunbookRegistry};
use crate::session::Services;
use crate::severity::{check_target, SeverityCatalog, SeverityOverride};
use crate::types::Severity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RunbookConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunbookConfig {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub steps: Vec<String>,
}

impl RunbookConfig {
    pub fn to_runbook(&self) -> Result<Runbook> {
        let title = self.title.clone().unwrap_or_else(|| self.key.replace('_', " "));
        Runbook::new(&self.key, title, self.steps.iter().cloned())
    }
}

// ---------------------------------------------------------------------------
// NotificationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Append notifications to `.incident/notifications.log`.
    #[serde(default = "default_true")]
    pub journal: bool,
    /// Mirror incident phases into `.incident/status.yaml`.
    #[serde(default = "default_true")]
    pub status_file: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            journal: true,
            status_file: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_actor")]
    pub default_actor: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub severities: BTreeMap<String, SeverityOverride>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runbooks: Vec<RunbookConfig>,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn default_version() -> u32 {
    1
}

fn default_actor() -> String {
    "incident-commander".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_actor: default_actor(),
            severities: BTreeMap::new(),
            runbooks: Vec::new(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(IncidentError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn catalog(&self) -> Result<SeverityCatalog> {
        SeverityCatalog::with_overrides(&self.severities)
    }

    /// Built-in runbooks with the configured ones registered on top.
    pub fn registry(&self) -> Result<RunbookRegistry> {
        let mut registry = RunbookRegistry::builtin();
        for rb in &self.runbooks {
            registry.register(rb.to_runbook()?);
        }
        Ok(registry)
    }

    /// Assemble the shared services for a project rooted at `root`.
    pub fn services(&self, root: &Path) -> Result<Services> {
        let mut services = Services::new(self.catalog()?, self.registry()?);

        let mut fan = FanOut::new().with(LogNotifier);
        if self.notifications.journal {
            fan = fan.with(JournalNotifier::new(paths::notifications_path(root)));
        }
        services = services.with_notifier(fan);

        services = if self.notifications.status_file {
            services.with_status_page(StatusFile::new(paths::status_path(root)))
        } else {
            services.with_status_page(NullStatusPage)
        };
        Ok(services)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let defaults = SeverityCatalog::default();

        // 1. Severity overrides: known keys, positive durations, response before escalation
        for (key, ov) in &self.severities {
            let severity: Severity = match key.parse() {
                Ok(s) => s,
                Err(_) => {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!("unknown severity '{key}' in severities"),
                    });
                    continue;
                }
            };

            for (name, value) in [
                ("response_minutes", ov.response_minutes),
                ("escalation_minutes", ov.escalation_minutes),
                ("update_interval_minutes", ov.update_interval_minutes),
            ] {
                if let Some(v) = value {
                    if let Err(e) = check_target(severity, name, v) {
                        warnings.push(ConfigWarning {
                            level: WarnLevel::Error,
                            message: format!("{key}: {e}"),
                        });
                    }
                }
            }

            let base = defaults.level(severity);
            let response = ov.response_minutes.unwrap_or(base.response_minutes);
            let escalation = ov.escalation_minutes.unwrap_or(base.escalation_minutes);
            if response >= escalation {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "{key}: response time ({response}m) is not shorter than escalation time ({escalation}m)"
                    ),
                });
            }

            if ov.stakeholders.as_ref().is_some_and(|s| s.is_empty()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{key}: stakeholder list is empty"),
                });
            }
        }

        // 2. Runbooks: valid keys and steps, no duplicates within the file
        let mut seen = BTreeSet::new();
        for rb in &self.runbooks {
            if let Err(e) = rb.to_runbook() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: e.to_string(),
                });
            }
            if !seen.insert(rb.key.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("runbook '{}' is defined more than once", rb.key),
                });
            }
        }

        // 3. Blank default actor
        if self.default_actor.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "default_actor is empty; events will be attributed to 'system'".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
