//! Shared, lock-guarded incident session.
//!
//! One writer at a time per session (the incident commander); any number of
//! concurrent readers. Readers only ever see whole events because every
//! mutation happens under the write lock.
//!
//! Mutations run against a draft of the record. With a store attached, the
//! draft is saved while the write lock is still held and only replaces the
//! live record once the save succeeded, so a failed save leaves the session
//! untouched and concurrent writers can never store an older record over a
//! newer one. Notifications and status page updates are sent after the lock
//! is released and their failures are only logged.

use crate::error::Result;
use crate::hooks::{LogNotifier, Notifier, NullStatusPage, SessionStore, StatusPage};
use crate::incident::{Incident, RunbookExecution};
use crate::runbook::RunbookRegistry;
use crate::severity::SeverityCatalog;
use crate::timeline::{NewEvent, Snapshot, TimelineEvent};
use crate::types::{Severity, SlaStatus, Status};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Read-only collaborators shared by every session.
pub struct Services {
    pub catalog: SeverityCatalog,
    pub registry: RunbookRegistry,
    pub notifier: Box<dyn Notifier>,
    pub status_page: Box<dyn StatusPage>,
}

impl Services {
    pub fn new(catalog: SeverityCatalog, registry: RunbookRegistry) -> Self {
        Self {
            catalog,
            registry,
            notifier: Box::new(LogNotifier),
            status_page: Box::new(NullStatusPage),
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_status_page(mut self, status_page: impl StatusPage + 'static) -> Self {
        self.status_page = Box::new(status_page);
        self
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new(SeverityCatalog::default(), RunbookRegistry::builtin())
    }
}

// ---------------------------------------------------------------------------
// IncidentSession
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct IncidentSession {
    incident: Arc<RwLock<Incident>>,
    services: Arc<Services>,
    store: Option<Arc<dyn SessionStore>>,
}

impl fmt::Debug for IncidentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inc = self.read();
        f.debug_struct("IncidentSession")
            .field("id", &inc.id)
            .field("severity", &inc.severity)
            .field("status", &inc.status)
            .field("events", &inc.timeline.len())
            .field("persisted", &self.store.is_some())
            .finish()
    }
}

/// What hooks need to know about a committed change.
struct Committed {
    id: String,
    severity: Severity,
    status: Status,
}

impl IncidentSession {
    /// Open a new incident now and announce it.
    pub fn create(
        id: &str,
        severity: Severity,
        actor: &str,
        services: Arc<Services>,
    ) -> Result<Self> {
        Self::create_in(id, severity, actor, services, None)
    }

    /// Like [`IncidentSession::create`], saving the new record to `store`
    /// before anyone is notified.
    pub fn create_in(
        id: &str,
        severity: Severity,
        actor: &str,
        services: Arc<Services>,
        store: Option<Arc<dyn SessionStore>>,
    ) -> Result<Self> {
        let incident = Incident::detect(id, severity, actor, Utc::now())?;
        if let Some(store) = &store {
            store.persist(&incident)?;
        }
        let mut session = Self::from_incident(incident, services);
        session.store = store;

        let stakeholders = session
            .services
            .catalog
            .level(severity)
            .stakeholders
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        session.dispatch(
            &Committed {
                id: id.to_string(),
                severity,
                status: Status::Open,
            },
            &format!("{id} opened at {severity} (stakeholders: {stakeholders})"),
            true,
        );
        Ok(session)
    }

    /// Wrap an existing record, e.g. one loaded from a store.
    pub fn from_incident(incident: Incident, services: Arc<Services>) -> Self {
        Self {
            incident: Arc::new(RwLock::new(incident)),
            services,
            store: None,
        }
    }

    /// Save every committed change to `store`.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Owned copy of the current record, suitable for persistence.
    pub fn incident(&self) -> Incident {
        self.read().clone()
    }

    pub fn id(&self) -> String {
        self.read().id.clone()
    }

    pub fn status(&self) -> Status {
        self.read().status
    }

    pub fn severity(&self) -> Severity {
        self.read().severity
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read().timeline.snapshot()
    }

    pub fn sla_status(&self, now: DateTime<Utc>) -> SlaStatus {
        self.read().sla_status(&self.services.catalog, now)
    }

    pub fn next_update_due(&self) -> Option<DateTime<Utc>> {
        self.read().next_update_due(&self.services.catalog)
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    pub fn escalate(&self, to: Severity, actor: &str) -> Result<()> {
        let (from, committed) = self.mutate(|inc, _| {
            let from = inc.severity;
            inc.escalate(to, actor, Utc::now())?;
            Ok(from)
        })?;
        let stakeholders = self
            .services
            .catalog
            .level(to)
            .stakeholders
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        self.dispatch(
            &committed,
            &format!(
                "{} severity changed {from} -> {to} by {actor} (stakeholders: {stakeholders})",
                committed.id
            ),
            false,
        );
        Ok(())
    }

    pub fn acknowledge(&self, actor: &str) -> Result<()> {
        self.mutate(|inc, _| inc.acknowledge(actor, Utc::now()))?;
        Ok(())
    }

    pub fn execute_runbook(&self, category: &str, actor: &str) -> Result<RunbookExecution> {
        let (execution, _) = self.mutate(|inc, services| {
            inc.execute_runbook(&services.registry, category, actor, Utc::now())
                .cloned()
        })?;
        Ok(execution)
    }

    pub fn mitigate(&self, actor: &str) -> Result<()> {
        let ((), committed) = self.mutate(|inc, _| inc.mitigate(actor, Utc::now()))?;
        self.dispatch(
            &committed,
            &format!("{} mitigated by {actor}", committed.id),
            true,
        );
        Ok(())
    }

    pub fn resolve(&self, actor: &str) -> Result<()> {
        let ((), committed) = self.mutate(|inc, _| inc.resolve(actor, Utc::now()))?;
        self.dispatch(
            &committed,
            &format!("{} resolved by {actor}", committed.id),
            true,
        );
        Ok(())
    }

    pub fn reopen(&self, actor: &str) -> Result<()> {
        let ((), committed) = self.mutate(|inc, _| inc.reopen(actor, Utc::now()))?;
        self.dispatch(
            &committed,
            &format!("{} reopened by {actor}", committed.id),
            true,
        );
        Ok(())
    }

    pub fn note(&self, actor: &str, text: &str, tags: Vec<String>) -> Result<TimelineEvent> {
        let (event, _) = self.mutate(|inc, _| {
            inc.note(NewEvent::note(text).at(Utc::now()).by(actor).tagged(tags))
                .cloned()
        })?;
        Ok(event)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn read(&self) -> RwLockReadGuard<'_, Incident> {
        self.incident.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Incident> {
        self.incident.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on a draft under the write lock, save the draft, then swap it
    /// in. The lock is dropped before returning so callers can dispatch hooks
    /// without holding it.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Incident, &Services) -> Result<T>,
    ) -> Result<(T, Committed)> {
        let mut guard = self.write();
        let mut draft = guard.clone();
        let value = f(&mut draft, self.services.as_ref())?;
        if let Some(store) = &self.store {
            store.persist(&draft)?;
        }
        let committed = Committed {
            id: draft.id.clone(),
            severity: draft.severity,
            status: draft.status,
        };
        *guard = draft;
        Ok((value, committed))
    }

    fn dispatch(&self, committed: &Committed, message: &str, publish: bool) {
        if let Err(e) = self
            .services
            .notifier
            .notify(&committed.id, committed.severity, message)
        {
            tracing::warn!(incident = %committed.id, error = %e, "notification failed");
        }
        if publish {
            if let Err(e) = self
                .services
                .status_page
                .publish_status(&committed.id, committed.status)
            {
                tracing::warn!(incident = %committed.id, error = %e, "status page update failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
