//! Runbook registry: named, ordered remediation procedures keyed by incident
//! category.
//!
//! Selection is always by an explicit category key supplied by the caller;
//! nothing here tries to match incident text against runbooks.

use crate::error::{IncidentError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// RunbookKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunbookKey(String);

impl RunbookKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if !paths::is_valid_runbook_key(&key) {
            return Err(IncidentError::InvalidRunbook {
                key,
                reason: "key must be lowercase alphanumeric with underscores".to_string(),
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunbookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RunbookKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunbookKey {
    type Error = IncidentError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RunbookKey> for String {
    fn from(key: RunbookKey) -> Self {
        key.0
    }
}

// ---------------------------------------------------------------------------
// Runbook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Runbook {
    pub key: RunbookKey,
    pub title: String,
    pub steps: Vec<String>,
}

impl Runbook {
    pub fn new<I, S>(key: &str, title: impl Into<String>, steps: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = RunbookKey::new(key)?;
        let steps: Vec<String> = steps
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .collect();
        if steps.is_empty() {
            return Err(IncidentError::InvalidRunbook {
                key: key.to_string(),
                reason: "runbook has no steps".to_string(),
            });
        }
        if let Some(pos) = steps.iter().position(|s| s.is_empty()) {
            return Err(IncidentError::InvalidRunbook {
                key: key.to_string(),
                reason: format!("step {} is blank", pos + 1),
            });
        }
        Ok(Self {
            key,
            title: title.into(),
            steps,
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RunbookRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RunbookRegistry {
    runbooks: BTreeMap<RunbookKey, Runbook>,
}

impl RunbookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the standard procedures.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for runbook in builtin_runbooks() {
            registry.register(runbook);
        }
        registry
    }

    /// Insert `runbook`, replacing any runbook already registered under the
    /// same key. Returns the replaced runbook.
    pub fn register(&mut self, runbook: Runbook) -> Option<Runbook> {
        let key = runbook.key.clone();
        let previous = self.runbooks.insert(key.clone(), runbook);
        if let Some(old) = &previous {
            tracing::warn!(
                category = %key,
                previous_steps = old.steps.len(),
                "runbook replaced"
            );
        }
        previous
    }

    pub fn lookup(&self, category: &str) -> Result<&Runbook> {
        self.runbooks
            .get(category)
            .ok_or_else(|| IncidentError::UnknownRunbook(category.to_string()))
    }

    pub fn contains(&self, category: &str) -> bool {
        self.lookup(category).is_ok()
    }

    pub fn categories(&self) -> impl Iterator<Item = &RunbookKey> {
        self.runbooks.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Runbook> {
        self.runbooks.values()
    }

    pub fn len(&self) -> usize {
        self.runbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runbooks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Built-in procedures
// ---------------------------------------------------------------------------

fn builtin(key: &str, title: &str, steps: &[&str]) -> Runbook {
    Runbook {
        key: RunbookKey(key.to_string()),
        title: title.to_string(),
        steps: steps.iter().map(|s| s.to_string()).collect(),
    }
}

fn builtin_runbooks() -> Vec<Runbook> {
    vec![
        builtin(
            "database_outage",
            "Database outage",
            &[
                "Check database health checks and connection error rates",
                "Inspect replication lag and primary/replica status",
                "Review recent schema migrations and deploys",
                "Fail over to a healthy replica if the primary is unresponsive",
                "Pause non-critical background jobs",
                "Verify application connection pools have recovered",
                "Confirm error rates are back to baseline",
            ],
        ),
        builtin(
            "high_latency",
            "High latency",
            &[
                "Identify affected endpoints from latency dashboards",
                "Compare current traffic against baseline",
                "Check downstream dependency latency",
                "Scale out the affected service",
                "Confirm p99 latency is back under target",
            ],
        ),
        builtin(
            "service_outage",
            "Service outage",
            &[
                "Confirm the outage from health checks and synthetic probes",
                "Identify the most recent deploy or config change",
                "Roll back the most recent change if it correlates",
                "Restart unhealthy instances",
                "Verify traffic is being served",
                "Post a status page update",
            ],
        ),
        builtin(
            "security_breach",
            "Security breach",
            &[
                "Isolate affected systems from the network",
                "Preserve logs and forensic evidence",
                "Rotate exposed credentials and keys",
                "Notify the security lead and legal",
                "Assess the scope of data exposure",
                "Restore systems from known-good images",
            ],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
