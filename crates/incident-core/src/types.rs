use crate::error::IncidentError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Incident severity. `Sev1` is the most severe; ordering follows urgency,
/// so `Sev1 < Sev4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Sev1,
    Sev2,
    Sev3,
    Sev4,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[Severity::Sev1, Severity::Sev2, Severity::Sev3, Severity::Sev4]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Sev1 => "sev1",
            Severity::Sev2 => "sev2",
            Severity::Sev3 => "sev3",
            Severity::Sev4 => "sev4",
        }
    }

    /// Human description of the impact class.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Sev1 => "critical",
            Severity::Sev2 => "major",
            Severity::Sev3 => "minor",
            Severity::Sev4 => "low",
        }
    }

    /// True when moving from `self` to `other` raises urgency.
    pub fn is_raised_by(self, other: Severity) -> bool {
        other < self
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Sev1 => "SEV1",
            Severity::Sev2 => "SEV2",
            Severity::Sev3 => "SEV3",
            Severity::Sev4 => "SEV4",
        })
    }
}

impl std::str::FromStr for Severity {
    type Err = IncidentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sev1" | "1" => Ok(Severity::Sev1),
            "sev2" | "2" => Ok(Severity::Sev2),
            "sev3" | "3" => Ok(Severity::Sev3),
            "sev4" | "4" => Ok(Severity::Sev4),
            _ => Err(IncidentError::UnknownSeverity(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    Mitigated,
    Resolved,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::Mitigated => "mitigated",
            Status::Resolved => "resolved",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Status::Resolved
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SlaStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    WithinSla,
    ResponseBreached,
    EscalationBreached,
}

impl SlaStatus {
    pub fn is_breached(self) -> bool {
        self != SlaStatus::WithinSla
    }
}

impl fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlaStatus::WithinSla => "within_sla",
            SlaStatus::ResponseBreached => "response_breached",
            SlaStatus::EscalationBreached => "escalation_breached",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn severity_ordering_follows_urgency() {
        assert!(Severity::Sev1 < Severity::Sev2);
        assert!(Severity::Sev3 < Severity::Sev4);
        assert!(Severity::Sev3.is_raised_by(Severity::Sev1));
        assert!(!Severity::Sev1.is_raised_by(Severity::Sev2));
    }

    #[test]
    fn severity_parse_is_case_insensitive() {
        assert_eq!(Severity::from_str("SEV1").unwrap(), Severity::Sev1);
        assert_eq!(Severity::from_str("sev3").unwrap(), Severity::Sev3);
        assert_eq!(Severity::from_str(" Sev2 ").unwrap(), Severity::Sev2);
    }

    #[test]
    fn severity_parse_rejects_unknown() {
        let err = Severity::from_str("sev5").unwrap_err();
        assert!(matches!(err, IncidentError::UnknownSeverity(s) if s == "sev5"));
        assert!(Severity::from_str("").is_err());
    }

    #[test]
    fn severity_serde_uses_snake_case() {
        let yaml = serde_yaml::to_string(&Severity::Sev2).unwrap();
        assert_eq!(yaml.trim(), "sev2");
        assert_eq!(Severity::Sev2.to_string(), "SEV2");
        assert_eq!(Severity::Sev2.label(), "major");
    }

    #[test]
    fn status_terminal() {
        assert!(Status::Resolved.is_terminal());
        assert!(!Status::Mitigated.is_terminal());
    }

    #[test]
    fn sla_status_display() {
        assert_eq!(SlaStatus::ResponseBreached.to_string(), "response_breached");
        assert!(SlaStatus::EscalationBreached.is_breached());
        assert!(!SlaStatus::WithinSla.is_breached());
    }
}
