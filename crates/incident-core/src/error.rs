use thiserror::Error;

#[derive(Debug, Error)]
pub enum IncidentError {
    #[error("not initialized: run 'incident init'")]
    NotInitialized,

    #[error("unknown severity '{0}': must be sev1, sev2, sev3, or sev4")]
    UnknownSeverity(String),

    #[error("invalid {severity} targets: {reason}")]
    InvalidSeverityLevel { severity: String, reason: String },

    #[error("invalid timeline event: {0}")]
    InvalidEvent(String),

    #[error("incident already active: {0}")]
    DuplicateIncident(String),

    #[error("incident not found: {0}")]
    IncidentNotFound(String),

    #[error("invalid incident id '{0}': must be alphanumeric with '-' or '_'")]
    InvalidIncidentId(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("unknown runbook: {0}")]
    UnknownRunbook(String),

    #[error("invalid runbook '{key}': {reason}")]
    InvalidRunbook { key: String, reason: String },

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IncidentError>;
