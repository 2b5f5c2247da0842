//! The incident desk: tracks sessions by id and hands its store to every
//! session, which saves each transition before it becomes visible.
//!
//! An id is "active" while its session is not resolved. Opening an incident
//! under an active id fails with `DuplicateIncident`; a resolved session with
//! the same id is replaced (its record stays in the store until then).

use crate::error::{IncidentError, Result};
use crate::hooks::SessionStore;
use crate::incident::{Incident, RunbookExecution};
use crate::session::{IncidentSession, Services};
use crate::timeline::TimelineEvent;
use crate::types::{Severity, Status};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

pub struct IncidentDesk {
    services: Arc<Services>,
    store: Option<Arc<dyn SessionStore>>,
    sessions: RwLock<BTreeMap<String, IncidentSession>>,
}

impl IncidentDesk {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            store: None,
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_store(mut self, store: impl SessionStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Adopt every incident the store knows about. Returns how many were loaded.
    pub fn load_all(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let mut loaded = 0;
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        for id in store.list_ids()? {
            if sessions.contains_key(&id) {
                continue;
            }
            let incident = store.load(&id)?;
            sessions.insert(id, self.adopt(incident));
            loaded += 1;
        }
        tracing::debug!(loaded, "incidents loaded from store");
        Ok(loaded)
    }

    pub fn create(&self, id: &str, severity: Severity, actor: &str) -> Result<IncidentSession> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        let existing = match sessions.get(id) {
            Some(s) => Some(s.status()),
            None => self.stored(id)?.map(|inc| inc.status),
        };
        if let Some(status) = existing {
            if status != Status::Resolved {
                return Err(IncidentError::DuplicateIncident(id.to_string()));
            }
            tracing::info!(incident = id, "replacing resolved incident with a new one");
        }

        let session = IncidentSession::create_in(
            id,
            severity,
            actor,
            Arc::clone(&self.services),
            self.store.clone(),
        )?;
        sessions.insert(id.to_string(), session.clone());
        Ok(session)
    }

    /// Tracked session for `id`, loading it from the store on first use.
    pub fn get(&self, id: &str) -> Result<IncidentSession> {
        if let Some(s) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            return Ok(s.clone());
        }

        let incident = self
            .stored(id)?
            .ok_or_else(|| IncidentError::IncidentNotFound(id.to_string()))?;
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| self.adopt(incident));
        Ok(session.clone())
    }

    /// Current records of every tracked session, oldest first.
    pub fn list(&self) -> Vec<Incident> {
        let mut incidents: Vec<Incident> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(IncidentSession::incident)
            .collect();
        incidents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        incidents
    }

    // -----------------------------------------------------------------------
    // Transitions by id
    // -----------------------------------------------------------------------

    pub fn escalate(&self, id: &str, to: Severity, actor: &str) -> Result<IncidentSession> {
        self.apply(id, |s| s.escalate(to, actor))
    }

    pub fn acknowledge(&self, id: &str, actor: &str) -> Result<IncidentSession> {
        self.apply(id, |s| s.acknowledge(actor))
    }

    pub fn execute_runbook(
        &self,
        id: &str,
        category: &str,
        actor: &str,
    ) -> Result<RunbookExecution> {
        self.get(id)?.execute_runbook(category, actor)
    }

    pub fn mitigate(&self, id: &str, actor: &str) -> Result<IncidentSession> {
        self.apply(id, |s| s.mitigate(actor))
    }

    pub fn resolve(&self, id: &str, actor: &str) -> Result<IncidentSession> {
        self.apply(id, |s| s.resolve(actor))
    }

    pub fn reopen(&self, id: &str, actor: &str) -> Result<IncidentSession> {
        self.apply(id, |s| s.reopen(actor))
    }

    pub fn note(
        &self,
        id: &str,
        actor: &str,
        text: &str,
        tags: Vec<String>,
    ) -> Result<TimelineEvent> {
        self.get(id)?.note(actor, text, tags)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn apply(
        &self,
        id: &str,
        f: impl FnOnce(&IncidentSession) -> Result<()>,
    ) -> Result<IncidentSession> {
        let session = self.get(id)?;
        f(&session)?;
        Ok(session)
    }

    fn stored(&self, id: &str) -> Result<Option<Incident>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match store.load(id) {
            Ok(inc) => Ok(Some(inc)),
            Err(IncidentError::IncidentNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn adopt(&self, incident: Incident) -> IncidentSession {
        let session = IncidentSession::from_incident(incident, Arc::clone(&self.services));
        match &self.store {
            Some(store) => session.with_store(Arc::clone(store)),
            None => session,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::YamlStore;
    use crate::types::SlaStatus;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn desk() -> IncidentDesk {
        IncidentDesk::new(Arc::new(Services::default()))
    }

    #[test]
    fn create_rejects_active_duplicate() {
        let desk = desk();
        desk.create("INC-1", Severity::Sev2, "pager").unwrap();
        let err = desk.create("INC-1", Severity::Sev1, "pager").unwrap_err();
        assert!(matches!(err, IncidentError::DuplicateIncident(id) if id == "INC-1"));

        desk.mitigate("INC-1", "alice").unwrap();
        assert!(matches!(
            desk.create("INC-1", Severity::Sev1, "pager"),
            Err(IncidentError::DuplicateIncident(_))
        ));
    }

    #[test]
    fn create_replaces_resolved_incident() {
        let desk = desk();
        desk.create("INC-2", Severity::Sev3, "pager").unwrap();
        desk.mitigate("INC-2", "alice").unwrap();
        desk.resolve("INC-2", "alice").unwrap();

        let fresh = desk.create("INC-2", Severity::Sev1, "pager").unwrap();
        assert_eq!(fresh.status(), Status::Open);
        assert_eq!(fresh.severity(), Severity::Sev1);
        assert_eq!(fresh.snapshot().len(), 1);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let desk = desk();
        assert!(matches!(
            desk.get("INC-404"),
            Err(IncidentError::IncidentNotFound(_))
        ));
    }

    #[test]
    fn scenario_inc_42() {
        let desk = desk();
        let session = desk.create("INC-42", Severity::Sev2, "pager").unwrap();
        desk.mitigate("INC-42", "alice").unwrap();
        desk.resolve("INC-42", "alice").unwrap();
        assert_eq!(
            session.sla_status(Utc::now() + Duration::hours(3)),
            SlaStatus::WithinSla
        );
    }

    #[test]
    fn transitions_persist_to_store() {
        let dir = TempDir::new().unwrap();
        let desk = desk().with_store(YamlStore::new(dir.path()));
        desk.create("INC-3", Severity::Sev1, "pager").unwrap();
        desk.execute_runbook("INC-3", "database_outage", "alice")
            .unwrap();
        desk.mitigate("INC-3", "alice").unwrap();

        let reloaded = IncidentDesk::new(Arc::new(Services::default()))
            .with_store(YamlStore::new(dir.path()));
        let session = reloaded.get("INC-3").unwrap();
        assert_eq!(session.status(), Status::Mitigated);
        assert_eq!(session.snapshot().len(), 1 + 7 + 1);
        assert_eq!(session.incident().runbooks.len(), 1);
    }

    #[test]
    fn failed_transition_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let desk = desk().with_store(YamlStore::new(dir.path()));
        desk.create("INC-4", Severity::Sev2, "pager").unwrap();
        assert!(desk.resolve("INC-4", "alice").is_err());
        assert!(desk.execute_runbook("INC-4", "nope", "alice").is_err());

        let stored = YamlStore::new(dir.path()).load("INC-4").unwrap();
        assert_eq!(stored.timeline.len(), 1);
        assert_eq!(stored.status, Status::Open);
    }

    #[test]
    fn duplicate_check_consults_store() {
        let dir = TempDir::new().unwrap();
        desk()
            .with_store(YamlStore::new(dir.path()))
            .create("INC-5", Severity::Sev2, "pager")
            .unwrap();

        let second = desk().with_store(YamlStore::new(dir.path()));
        assert!(matches!(
            second.create("INC-5", Severity::Sev2, "pager"),
            Err(IncidentError::DuplicateIncident(_))
        ));
    }

    #[test]
    fn load_all_and_list() {
        let dir = TempDir::new().unwrap();
        let first = desk().with_store(YamlStore::new(dir.path()));
        first.create("INC-6", Severity::Sev3, "pager").unwrap();
        first.create("INC-7", Severity::Sev4, "pager").unwrap();

        let second = desk().with_store(YamlStore::new(dir.path()));
        assert_eq!(second.load_all().unwrap(), 2);
        assert_eq!(second.load_all().unwrap(), 0);
        let ids: Vec<String> = second.list().into_iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"INC-6".to_string()));
    }

    #[test]
    fn note_by_id() {
        let desk = desk();
        desk.create("INC-8", Severity::Sev3, "pager").unwrap();
        let event = desk
            .note("INC-8", "bob", "customer reports recovered", Vec::new())
            .unwrap();
        assert_eq!(event.seq, 2);
        assert_eq!(event.actor, "bob");
    }

    #[test]
    fn failed_save_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let desk = desk().with_store(YamlStore::new(dir.path()));
        desk.create("INC-9", Severity::Sev2, "pager").unwrap();

        let incidents = dir.path().join(".incident/incidents");
        std::fs::remove_dir_all(&incidents).unwrap();
        std::fs::write(&incidents, "not a directory").unwrap();

        assert!(desk.mitigate("INC-9", "alice").is_err());
        assert!(desk.note("INC-9", "alice", "checking", Vec::new()).is_err());
        let session = desk.get("INC-9").unwrap();
        assert_eq!(session.status(), Status::Open);
        assert_eq!(session.snapshot().len(), 1);

        assert!(desk.create("INC-10", Severity::Sev3, "pager").is_err());
        assert!(matches!(
            desk.get("INC-10"),
            Err(IncidentError::Io(_)) | Err(IncidentError::IncidentNotFound(_))
        ));
    }

    #[test]
    fn concurrent_transitions_store_latest_record() {
        let dir = TempDir::new().unwrap();
        let desk = Arc::new(desk().with_store(YamlStore::new(dir.path())));
        desk.create("INC-11", Severity::Sev2, "pager").unwrap();

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let desk = Arc::clone(&desk);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let actor = format!("writer-{w}");
                        desk.note("INC-11", &actor, &format!("update {i}"), Vec::new())
                            .unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        desk.mitigate("INC-11", "alice").unwrap();

        let stored = YamlStore::new(dir.path()).load("INC-11").unwrap();
        assert_eq!(stored.timeline.len(), 1 + 40 + 1);
        assert_eq!(stored.status, Status::Mitigated);
        assert_eq!(
            stored.timeline.len(),
            desk.get("INC-11").unwrap().snapshot().len()
        );
    }
}
