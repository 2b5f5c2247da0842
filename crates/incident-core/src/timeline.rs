//! Append-only incident timeline.
//!
//! Events are stored in append order and never edited or removed. The backing
//! vector sits behind an `Arc` so that [`Timeline::snapshot`] is a cheap,
//! immutable view: a later append copies the vector only while an older
//! snapshot is still alive, and the snapshot keeps showing what it saw.

use crate::error::{IncidentError, Result};
use crate::types::{Severity, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::ops::Deref;
use std::sync::Arc;

pub const DEFAULT_ACTOR: &str = "system";

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Detected { severity: Severity },
    Acknowledged,
    SeverityChanged { from: Severity, to: Severity },
    RunbookStep { category: String, index: usize },
    StatusChanged { from: Status, to: Status },
    Note,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Detected { .. } => "detected",
            EventKind::Acknowledged => "acknowledged",
            EventKind::SeverityChanged { .. } => "severity_changed",
            EventKind::RunbookStep { .. } => "runbook_step",
            EventKind::StatusChanged { .. } => "status_changed",
            EventKind::Note => "note",
        }
    }

    /// Whether this event counts as a responder acting on the incident.
    pub fn is_response(&self) -> bool {
        !matches!(self, EventKind::Detected { .. } | EventKind::Note)
    }
}

// ---------------------------------------------------------------------------
// TimelineEvent / NewEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub actor: String,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TimelineEvent {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Input to [`Timeline::append`]. The log assigns `seq`; everything else is
/// supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub timestamp: Option<DateTime<Utc>>,
    pub description: String,
    pub actor: Option<String>,
    pub kind: EventKind,
    pub tags: Vec<String>,
}

impl NewEvent {
    pub fn new(kind: EventKind, description: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            description: description.into(),
            actor: None,
            kind,
            tags: Vec::new(),
        }
    }

    pub fn note(description: impl Into<String>) -> Self {
        Self::new(EventKind::Note, description)
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn tagged<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    fn validate(&self) -> Result<DateTime<Utc>> {
        let timestamp = self
            .timestamp
            .ok_or_else(|| IncidentError::InvalidEvent("missing timestamp".to_string()))?;
        if self.description.trim().is_empty() {
            return Err(IncidentError::InvalidEvent(
                "missing description".to_string(),
            ));
        }
        Ok(timestamp)
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<TimelineEvent>", into = "Vec<TimelineEvent>")]
pub struct Timeline {
    events: Arc<Vec<TimelineEvent>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `event` and push it at the end of the log.
    ///
    /// Timestamps earlier than the current tail are accepted as-is (the log
    /// never reorders) and reported at warn level for the caller to resolve.
    pub fn append(&mut self, event: NewEvent) -> Result<&TimelineEvent> {
        let timestamp = event.validate()?;

        if let Some(last) = self.events.last() {
            if timestamp < last.timestamp {
                tracing::warn!(
                    seq = last.seq + 1,
                    previous = %last.timestamp,
                    timestamp = %timestamp,
                    "timeline event appended out of timestamp order"
                );
            }
        }

        let actor = event
            .actor
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR.to_string());

        let events = Arc::make_mut(&mut self.events);
        let seq = events.len() as u64 + 1;
        events.push(TimelineEvent {
            seq,
            timestamp,
            description: event.description.trim().to_string(),
            actor,
            kind: event.kind,
            tags: event.tags,
        });
        Ok(&events[events.len() - 1])
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            events: Arc::clone(&self.events),
        }
    }

    /// Lazily filter a snapshot of the log taken now.
    pub fn filter<P>(&self, predicate: P) -> Filtered<P>
    where
        P: Fn(&TimelineEvent) -> bool,
    {
        self.snapshot().filter(predicate)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimelineEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first(&self) -> Option<&TimelineEvent> {
        self.events.first()
    }

    pub fn last(&self) -> Option<&TimelineEvent> {
        self.events.last()
    }
}

impl TryFrom<Vec<TimelineEvent>> for Timeline {
    type Error = IncidentError;

    fn try_from(events: Vec<TimelineEvent>) -> Result<Self> {
        for (i, event) in events.iter().enumerate() {
            let expected = i as u64 + 1;
            if event.seq != expected {
                return Err(IncidentError::InvalidEvent(format!(
                    "timeline sequence gap: expected seq {expected}, found {}",
                    event.seq
                )));
            }
            if event.description.trim().is_empty() {
                return Err(IncidentError::InvalidEvent(format!(
                    "event {} has no description",
                    event.seq
                )));
            }
        }
        Ok(Self {
            events: Arc::new(events),
        })
    }
}

impl From<Timeline> for Vec<TimelineEvent> {
    fn from(timeline: Timeline) -> Self {
        Arc::try_unwrap(timeline.events).unwrap_or_else(|shared| (*shared).clone())
    }
}

// ---------------------------------------------------------------------------
// Snapshot / Filtered
// ---------------------------------------------------------------------------

/// Point-in-time, read-only view of a timeline. Iterating it any number of
/// times yields the same events.
#[derive(Debug, Clone)]
pub struct Snapshot {
    events: Arc<Vec<TimelineEvent>>,
}

impl Snapshot {
    pub fn filter<P>(self, predicate: P) -> Filtered<P>
    where
        P: Fn(&TimelineEvent) -> bool,
    {
        Filtered {
            snapshot: self,
            predicate,
        }
    }

    pub fn to_vec(&self) -> Vec<TimelineEvent> {
        self.events.as_ref().clone()
    }
}

impl Deref for Snapshot {
    type Target = [TimelineEvent];

    fn deref(&self) -> &Self::Target {
        self.events.as_slice()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a TimelineEvent;
    type IntoIter = std::slice::Iter<'a, TimelineEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.events.iter())
    }
}

/// Events of a snapshot matching a predicate. Each call to [`Filtered::iter`]
/// rescans the snapshot from the start.
pub struct Filtered<P> {
    snapshot: Snapshot,
    predicate: P,
}

impl<P> Filtered<P>
where
    P: Fn(&TimelineEvent) -> bool,
{
    pub fn iter(&self) -> impl Iterator<Item = &TimelineEvent> + '_ {
        self.snapshot.iter().filter(move |e| (self.predicate)(e))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn to_vec(&self) -> Vec<TimelineEvent> {
        self.iter().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
