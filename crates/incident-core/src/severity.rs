//! Severity catalog: the fixed table of response/escalation SLAs and
//! stakeholder sets for each severity level.
//!
//! The catalog is built once (defaults, optionally overlaid with config
//! overrides) and then only read. Sessions share it through `Arc`.

use crate::error::{IncidentError, Result};
use crate::types::Severity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// SeverityLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityLevel {
    pub severity: Severity,
    pub response_minutes: i64,
    pub escalation_minutes: i64,
    pub update_interval_minutes: i64,
    pub stakeholders: BTreeSet<String>,
}

impl SeverityLevel {
    fn new(
        severity: Severity,
        response_minutes: i64,
        escalation_minutes: i64,
        update_interval_minutes: i64,
        stakeholders: &[&str],
    ) -> Self {
        Self {
            severity,
            response_minutes,
            escalation_minutes,
            update_interval_minutes,
            stakeholders: stakeholders.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn response_time(&self) -> Duration {
        minutes(self.response_minutes)
    }

    pub fn escalation_time(&self) -> Duration {
        minutes(self.escalation_minutes)
    }

    pub fn update_interval(&self) -> Duration {
        minutes(self.update_interval_minutes)
    }
}

/// Upper bound for any configured target: ten years.
pub const MAX_TARGET_MINUTES: i64 = 10 * 365 * 24 * 60;

/// Saturates instead of panicking on values `Duration` cannot hold.
fn minutes(m: i64) -> Duration {
    Duration::try_minutes(m).unwrap_or(if m < 0 { Duration::MIN } else { Duration::MAX })
}

/// Reject targets outside `1..=MAX_TARGET_MINUTES`.
pub fn check_target(severity: Severity, field: &str, value: i64) -> Result<i64> {
    if value <= 0 || value > MAX_TARGET_MINUTES {
        return Err(IncidentError::InvalidSeverityLevel {
            severity: severity.to_string(),
            reason: format!("{field} must be between 1 and {MAX_TARGET_MINUTES} (got {value})"),
        });
    }
    Ok(value)
}

fn deadline(start: DateTime<Utc>, after: Duration) -> DateTime<Utc> {
    start
        .checked_add_signed(after)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ---------------------------------------------------------------------------
// SeverityOverride
// ---------------------------------------------------------------------------

/// Partial replacement for one catalog row, as read from config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakeholders: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// SeverityCatalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityCatalog {
    levels: [SeverityLevel; 4],
}

impl Default for SeverityCatalog {
    fn default() -> Self {
        Self {
            levels: [
                SeverityLevel::new(
                    Severity::Sev1,
                    5,
                    15,
                    15,
                    &[
                        "cto",
                        "vp_engineering",
                        "on_call_engineer",
                        "incident_commander",
                        "customer_support",
                    ],
                ),
                SeverityLevel::new(
                    Severity::Sev2,
                    15,
                    30,
                    30,
                    &["engineering_manager", "on_call_engineer", "incident_commander"],
                ),
                SeverityLevel::new(Severity::Sev3, 60, 240, 120, &["team_lead", "on_call_engineer"]),
                SeverityLevel::new(Severity::Sev4, 1440, 4320, 1440, &["on_call_engineer"]),
            ],
        }
    }
}

impl SeverityCatalog {
    /// Default catalog with `overrides` applied. Keys are severity names
    /// (`sev1`..`sev4`); any other key fails with `UnknownSeverity`, and a
    /// target outside `1..=MAX_TARGET_MINUTES` with `InvalidSeverityLevel`.
    pub fn with_overrides(overrides: &BTreeMap<String, SeverityOverride>) -> Result<Self> {
        let mut catalog = Self::default();
        for (key, ov) in overrides {
            let severity: Severity = key.parse()?;
            let level = &mut catalog.levels[severity as usize];
            if let Some(m) = ov.response_minutes {
                level.response_minutes = check_target(severity, "response_minutes", m)?;
            }
            if let Some(m) = ov.escalation_minutes {
                level.escalation_minutes = check_target(severity, "escalation_minutes", m)?;
            }
            if let Some(m) = ov.update_interval_minutes {
                level.update_interval_minutes =
                    check_target(severity, "update_interval_minutes", m)?;
            }
            if let Some(people) = &ov.stakeholders {
                level.stakeholders = people.iter().cloned().collect();
            }
        }
        Ok(catalog)
    }

    /// Look up a level by its textual name.
    pub fn get(&self, level: &str) -> Result<&SeverityLevel> {
        let severity: Severity = level
            .parse()
            .map_err(|_| IncidentError::UnknownSeverity(level.to_string()))?;
        Ok(self.level(severity))
    }

    pub fn level(&self, severity: Severity) -> &SeverityLevel {
        &self.levels[severity as usize]
    }

    pub fn levels(&self) -> &[SeverityLevel] {
        &self.levels
    }

    pub fn response_deadline(&self, severity: Severity, created_at: DateTime<Utc>) -> DateTime<Utc> {
        deadline(created_at, self.level(severity).response_time())
    }

    pub fn escalation_deadline(
        &self,
        severity: Severity,
        created_at: DateTime<Utc>,
    ) -> DateTime<Utc> {
        deadline(created_at, self.level(severity).escalation_time())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
