//! The incident record and its state machine.
//!
//! ```text
//! OPEN ──mitigate──▶ MITIGATED ──resolve──▶ RESOLVED
//!   ▲                    │
//!   └──────reopen────────┘
//! ```
//!
//! Every mutation validates first and only then appends to the timeline, so a
//! failed call leaves status, severity and timeline exactly as they were.
//! Severity and status changes are always recorded as timeline events; the
//! full history can be rebuilt from the timeline alone.

use crate::error::{IncidentError, Result};
use crate::paths;
use crate::runbook::RunbookRegistry;
use crate::severity::SeverityCatalog;
use crate::timeline::{EventKind, NewEvent, Timeline, TimelineEvent};
use crate::types::{Severity, SlaStatus, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RunbookExecution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMarker {
    pub index: usize,
    pub step: String,
    pub completed_at: DateTime<Utc>,
    /// Sequence number of the timeline event recording this step.
    pub event_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunbookExecution {
    pub category: String,
    pub started_at: DateTime<Utc>,
    pub started_by: String,
    pub steps: Vec<StepMarker>,
}

// ---------------------------------------------------------------------------
// Incident
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub severity: Severity,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub timeline: Timeline,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runbooks: Vec<RunbookExecution>,
}

impl Incident {
    /// Open a new incident and record its detection.
    pub fn detect(
        id: impl Into<String>,
        severity: Severity,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<Self> {
        let id = id.into();
        paths::validate_incident_id(&id)?;

        let mut timeline = Timeline::new();
        timeline.append(
            NewEvent::new(
                EventKind::Detected { severity },
                format!("Incident {id} detected at {severity}"),
            )
            .at(at)
            .by(actor),
        )?;

        Ok(Self {
            id,
            severity,
            status: Status::Open,
            created_at: at,
            updated_at: at,
            timeline,
            runbooks: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Change severity (escalation or de-escalation).
    pub fn escalate(&mut self, to: Severity, actor: &str, at: DateTime<Utc>) -> Result<()> {
        let from = self.severity;
        if self.status.is_terminal() {
            return Err(IncidentError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
                reason: format!("incident {} is resolved", self.id),
            });
        }
        if from == to {
            return Err(IncidentError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
                reason: format!("incident {} is already {to}", self.id),
            });
        }

        let verb = if from.is_raised_by(to) {
            "escalated"
        } else {
            "de-escalated"
        };
        self.record(
            NewEvent::new(
                EventKind::SeverityChanged { from, to },
                format!("Severity {verb} from {from} to {to}"),
            )
            .at(at)
            .by(actor),
        )?;
        self.severity = to;
        Ok(())
    }

    /// Record that a responder has picked up the incident.
    pub fn acknowledge(&mut self, actor: &str, at: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.transition_error(self.status, "incident is resolved"));
        }
        self.record(
            NewEvent::new(EventKind::Acknowledged, format!("Acknowledged by {actor}"))
                .at(at)
                .by(actor),
        )?;
        Ok(())
    }

    /// Walk every step of the `category` runbook in declared order, recording
    /// one timeline event per step. Earlier executions are kept.
    pub fn execute_runbook(
        &mut self,
        registry: &RunbookRegistry,
        category: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<&RunbookExecution> {
        let runbook = registry.lookup(category)?;
        if self.status.is_terminal() {
            return Err(IncidentError::InvalidTransition {
                from: self.status.to_string(),
                to: self.status.to_string(),
                reason: format!("cannot run runbook '{category}' on a resolved incident"),
            });
        }

        let total = runbook.steps.len();
        let mut markers = Vec::with_capacity(total);
        for (index, step) in runbook.steps.iter().enumerate() {
            let event = self.timeline.append(
                NewEvent::new(
                    EventKind::RunbookStep {
                        category: runbook.key.to_string(),
                        index,
                    },
                    format!("[{}] step {}/{}: {step}", runbook.key, index + 1, total),
                )
                .at(at)
                .by(actor)
                .tagged([runbook.key.to_string()]),
            )?;
            markers.push(StepMarker {
                index,
                step: step.clone(),
                completed_at: event.timestamp,
                event_seq: event.seq,
            });
        }

        tracing::debug!(incident = %self.id, category, steps = total, "runbook executed");
        self.updated_at = at;
        self.runbooks.push(RunbookExecution {
            category: runbook.key.to_string(),
            started_at: at,
            started_by: actor.to_string(),
            steps: markers,
        });
        Ok(&self.runbooks[self.runbooks.len() - 1])
    }

    /// OPEN → MITIGATED.
    pub fn mitigate(&mut self, actor: &str, at: DateTime<Utc>) -> Result<()> {
        self.change_status(Status::Open, Status::Mitigated, actor, at)
    }

    /// MITIGATED → RESOLVED. Resolution always requires a recorded mitigation.
    pub fn resolve(&mut self, actor: &str, at: DateTime<Utc>) -> Result<()> {
        self.change_status(Status::Mitigated, Status::Resolved, actor, at)
    }

    /// MITIGATED → OPEN. Resolved incidents cannot be reopened.
    pub fn reopen(&mut self, actor: &str, at: DateTime<Utc>) -> Result<()> {
        self.change_status(Status::Mitigated, Status::Open, actor, at)
    }

    /// Append a free-form note. Allowed in every status.
    pub fn note(&mut self, event: NewEvent) -> Result<&TimelineEvent> {
        let event = NewEvent {
            kind: EventKind::Note,
            ..event
        };
        let at = event.timestamp;
        let appended = self.timeline.append(event)?;
        if let Some(at) = at {
            if at > self.updated_at {
                self.updated_at = at;
            }
        }
        Ok(appended)
    }

    fn change_status(
        &mut self,
        required: Status,
        to: Status,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let from = self.status;
        if from != required {
            return Err(IncidentError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
                reason: format!("only allowed from {required}"),
            });
        }
        self.record(
            NewEvent::new(
                EventKind::StatusChanged { from, to },
                format!("Status changed from {from} to {to}"),
            )
            .at(at)
            .by(actor),
        )?;
        self.status = to;
        tracing::debug!(incident = %self.id, %from, %to, "status changed");
        Ok(())
    }

    fn record(&mut self, event: NewEvent) -> Result<()> {
        let at = event.timestamp;
        self.timeline.append(event)?;
        if let Some(at) = at {
            self.updated_at = at;
        }
        Ok(())
    }

    fn transition_error(&self, to: Status, reason: &str) -> IncidentError {
        IncidentError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Timestamp of the first responder action, if any.
    pub fn responded_at(&self) -> Option<DateTime<Utc>> {
        self.timeline
            .iter()
            .find(|e| e.kind.is_response())
            .map(|e| e.timestamp)
    }

    /// Compare `now` against the response and escalation deadlines of the
    /// current severity. Resolved incidents never report a breach; the
    /// escalation clock stops once the incident is mitigated.
    pub fn sla_status(&self, catalog: &SeverityCatalog, now: DateTime<Utc>) -> SlaStatus {
        if self.status.is_terminal() {
            return SlaStatus::WithinSla;
        }

        let escalation_deadline = catalog.escalation_deadline(self.severity, self.created_at);
        if self.status == Status::Open && now > escalation_deadline {
            return SlaStatus::EscalationBreached;
        }

        let response_deadline = catalog.response_deadline(self.severity, self.created_at);
        let responded_in_time = self
            .responded_at()
            .is_some_and(|t| t <= response_deadline);
        if now > response_deadline && !responded_in_time {
            return SlaStatus::ResponseBreached;
        }

        SlaStatus::WithinSla
    }

    /// When the next stakeholder update is due, based on the last timeline
    /// event and the severity's update interval.
    pub fn next_update_due(&self, catalog: &SeverityCatalog) -> Option<DateTime<Utc>> {
        if self.status.is_terminal() {
            return None;
        }
        let last = self.timeline.last()?.timestamp;
        Some(last + catalog.level(self.severity).update_interval())
    }

    /// Severity over time, rebuilt from the timeline.
    pub fn severity_history(&self) -> Vec<(DateTime<Utc>, Severity)> {
        self.timeline
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Detected { severity } => Some((e.timestamp, *severity)),
                EventKind::SeverityChanged { to, .. } => Some((e.timestamp, *to)),
                _ => None,
            })
            .collect()
    }

    /// Status over time, rebuilt from the timeline.
    pub fn status_history(&self) -> Vec<(DateTime<Utc>, Status)> {
        self.timeline
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Detected { .. } => Some((e.timestamp, Status::Open)),
                EventKind::StatusChanged { to, .. } => Some((e.timestamp, *to)),
                _ => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
