use crate::cmd::{actor, open_desk};
use crate::output::{print_json, print_table, timestamp, truncate};
use anyhow::Context;
use chrono::{DateTime, Utc};
use incident_core::{Incident, IncidentSession, Severity, SlaStatus, Status};
use serde::Serialize;
use std::path::Path;

/// A state-machine step addressed by incident id.
#[derive(Debug, Clone, Copy)]
pub enum Transition {
    Acknowledge,
    Mitigate,
    Resolve,
    Reopen,
}

impl Transition {
    fn verb(self) -> &'static str {
        match self {
            Transition::Acknowledge => "acknowledged",
            Transition::Mitigate => "mitigated",
            Transition::Resolve => "resolved",
            Transition::Reopen => "reopened",
        }
    }
}

// ---------------------------------------------------------------------------
// open / escalate / transitions / note
// ---------------------------------------------------------------------------

pub fn open(
    root: &Path,
    id: &str,
    severity: &str,
    actor_flag: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let severity: Severity = severity.parse()?;
    let (config, desk) = open_desk(root)?;
    let who = actor(actor_flag, &config);
    let session = desk.create(id, severity, &who)?;
    report(&session, "opened", json)
}

pub fn escalate(
    root: &Path,
    id: &str,
    severity: &str,
    actor_flag: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let severity: Severity = severity.parse()?;
    let (config, desk) = open_desk(root)?;
    let who = actor(actor_flag, &config);
    let before = desk.get(id)?.severity();
    let session = desk
        .escalate(id, severity, &who)
        .with_context(|| format!("failed to change severity of {id}"))?;
    let verb = if before.is_raised_by(severity) {
        "escalated"
    } else {
        "de-escalated"
    };
    report(&session, verb, json)
}

pub fn transition(
    root: &Path,
    id: &str,
    step: Transition,
    actor_flag: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let (config, desk) = open_desk(root)?;
    let who = actor(actor_flag, &config);
    let session = match step {
        Transition::Acknowledge => desk.acknowledge(id, &who),
        Transition::Mitigate => desk.mitigate(id, &who),
        Transition::Resolve => desk.resolve(id, &who),
        Transition::Reopen => desk.reopen(id, &who),
    }
    .with_context(|| format!("failed to mark {id} as {}", step.verb()))?;
    report(&session, step.verb(), json)
}

pub fn note(
    root: &Path,
    id: &str,
    text: &str,
    tags: Vec<String>,
    actor_flag: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let (config, desk) = open_desk(root)?;
    let who = actor(actor_flag, &config);
    let event = desk.note(id, &who, text, tags)?;
    if json {
        print_json(&event)
    } else {
        println!("added note #{} to {id}", event.seq);
        Ok(())
    }
}

fn report(session: &IncidentSession, verb: &str, json: bool) -> anyhow::Result<()> {
    let incident = session.incident();
    if json {
        return print_json(&incident);
    }
    println!(
        "{verb} {} [{} {}]",
        incident.id, incident.severity, incident.status
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// show / list
// ---------------------------------------------------------------------------

pub fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let (_, desk) = open_desk(root)?;
    let session = desk.get(id)?;
    let incident = session.incident();
    if json {
        return print_json(&incident);
    }

    let sla = session.sla_status(Utc::now());
    println!("ID:       {}", incident.id);
    println!(
        "Severity: {} ({})",
        incident.severity,
        incident.severity.label()
    );
    println!("Status:   {}", incident.status);
    println!("SLA:      {sla}");
    println!("Opened:   {}", timestamp(incident.created_at));
    println!("Updated:  {}", timestamp(incident.updated_at));
    if let Some(due) = session.next_update_due() {
        println!("Next update due: {}", timestamp(due));
    }
    println!();
    print_table(
        &["#", "TIME", "KIND", "ACTOR", "DESCRIPTION"],
        incident
            .timeline
            .iter()
            .map(|e| {
                vec![
                    e.seq.to_string(),
                    timestamp(e.timestamp),
                    e.kind.as_str().to_string(),
                    e.actor.clone(),
                    truncate(&e.description, 70),
                ]
            })
            .collect(),
    );
    Ok(())
}

pub fn list(root: &Path, status: &str, json: bool) -> anyhow::Result<()> {
    let (_, desk) = open_desk(root)?;
    desk.load_all()?;

    let filter = StatusFilter::parse(status)?;
    let now = Utc::now();
    let incidents: Vec<Incident> = desk
        .list()
        .into_iter()
        .filter(|i| filter.matches(i.status))
        .collect();

    if json {
        return print_json(&incidents);
    }
    if incidents.is_empty() {
        println!("no incidents (status: {status})");
        return Ok(());
    }

    let catalog = &desk.services().catalog;
    print_table(
        &["ID", "SEVERITY", "STATUS", "SLA", "OPENED", "EVENTS"],
        incidents
            .iter()
            .map(|i| {
                vec![
                    i.id.clone(),
                    i.severity.to_string(),
                    i.status.to_string(),
                    i.sla_status(catalog, now).to_string(),
                    timestamp(i.created_at),
                    i.timeline.len().to_string(),
                ]
            })
            .collect(),
    );
    Ok(())
}

enum StatusFilter {
    Active,
    All,
    Only(Status),
}

impl StatusFilter {
    fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "active" => StatusFilter::Active,
            "all" => StatusFilter::All,
            "open" => StatusFilter::Only(Status::Open),
            "mitigated" => StatusFilter::Only(Status::Mitigated),
            "resolved" => StatusFilter::Only(Status::Resolved),
            other => anyhow::bail!(
                "unknown status filter '{other}': use active, all, open, mitigated, or resolved"
            ),
        })
    }

    fn matches(&self, status: Status) -> bool {
        match self {
            StatusFilter::Active => !status.is_terminal(),
            StatusFilter::All => true,
            StatusFilter::Only(s) => *s == status,
        }
    }
}

// ---------------------------------------------------------------------------
// sla
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SlaReport {
    id: String,
    severity: Severity,
    status: Status,
    sla: SlaStatus,
    checked_at: DateTime<Utc>,
    response_deadline: DateTime<Utc>,
    escalation_deadline: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    responded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_update_due: Option<DateTime<Utc>>,
}

pub fn sla(root: &Path, id: &str, at: Option<&str>, json: bool) -> anyhow::Result<()> {
    let now = match at {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --at timestamp '{s}' (expected RFC 3339)"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let (_, desk) = open_desk(root)?;
    let session = desk.get(id)?;
    let incident = session.incident();
    let catalog = &session.services().catalog;

    let report = SlaReport {
        id: incident.id.clone(),
        severity: incident.severity,
        status: incident.status,
        sla: session.sla_status(now),
        checked_at: now,
        response_deadline: catalog.response_deadline(incident.severity, incident.created_at),
        escalation_deadline: catalog.escalation_deadline(incident.severity, incident.created_at),
        responded_at: incident.responded_at(),
        next_update_due: session.next_update_due(),
    };

    if json {
        return print_json(&report);
    }
    println!("{}: {}", report.id, report.sla);
    println!("  severity:            {}", report.severity);
    println!("  status:              {}", report.status);
    println!("  response deadline:   {}", timestamp(report.response_deadline));
    println!("  escalation deadline: {}", timestamp(report.escalation_deadline));
    match report.responded_at {
        Some(t) => println!("  first response:      {}", timestamp(t)),
        None => println!("  first response:      none yet"),
    }
    Ok(())
}
