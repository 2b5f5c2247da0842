#![allow(deprecated)]
use assert_cmd::Command;
use chrono::{DateTime, Duration, Utc};
use predicates::prelude::*;
use tempfile::TempDir;

fn incident(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("incident").unwrap();
    cmd.current_dir(dir.path())
        .env("INCIDENT_ROOT", dir.path())
        .env("INCIDENT_ACTOR", "alice")
        .env_remove("RUST_LOG");
    cmd
}

fn init_project(dir: &TempDir) {
    incident(dir).arg("init").assert().success();
}

fn show_json(dir: &TempDir, id: &str) -> serde_json::Value {
    let out = incident(dir)
        .args(["--json", "show", id])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).unwrap()
}

// ---------------------------------------------------------------------------
// incident init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_directory_tree() {
    let dir = TempDir::new().unwrap();
    incident(&dir).arg("init").assert().success();

    assert!(dir.path().join(".incident").is_dir());
    assert!(dir.path().join(".incident/incidents").is_dir());
    assert!(dir.path().join(".incident/config.yaml").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    incident(&dir).arg("init").assert().success();
    incident(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists"));
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    incident(&dir)
        .args(["open", "INC-1", "--severity", "sev2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("incident init"));
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn open_mitigate_resolve() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    incident(&dir)
        .args(["open", "INC-42", "--severity", "sev2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("opened INC-42"));
    incident(&dir).args(["mitigate", "INC-42"]).assert().success();
    incident(&dir).args(["resolve", "INC-42"]).assert().success();

    let json = show_json(&dir, "INC-42");
    assert_eq!(json["status"], "resolved");
    assert_eq!(json["severity"], "sev2");
    let events = json["timeline"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1]["actor"], "alice");
    assert!(dir.path().join(".incident/incidents/INC-42.yaml").exists());
}

#[test]
fn duplicate_open_exits_4() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-1", "--severity", "sev3"])
        .assert()
        .success();
    incident(&dir)
        .args(["open", "INC-1", "--severity", "sev1"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("already active"));
}

#[test]
fn unknown_severity_exits_2() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-1", "--severity", "sev9"])
        .assert()
        .code(2);
    assert!(!dir.path().join(".incident/incidents/INC-1.yaml").exists());
}

#[test]
fn resolve_before_mitigate_exits_5() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-2", "--severity", "sev2"])
        .assert()
        .success();
    incident(&dir)
        .args(["resolve", "INC-2"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("invalid transition"));

    let json = show_json(&dir, "INC-2");
    assert_eq!(json["status"], "open");
    assert_eq!(json["timeline"].as_array().unwrap().len(), 1);
}

#[test]
fn escalate_after_resolve_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-3", "--severity", "sev3"])
        .assert()
        .success();
    incident(&dir)
        .args(["escalate", "INC-3", "--severity", "sev1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("escalated INC-3"));
    incident(&dir).args(["mitigate", "INC-3"]).assert().success();
    incident(&dir).args(["resolve", "INC-3"]).assert().success();
    incident(&dir)
        .args(["escalate", "INC-3", "--severity", "sev2"])
        .assert()
        .code(5);

    let json = show_json(&dir, "INC-3");
    assert_eq!(json["severity"], "sev1");
    assert_eq!(json["timeline"].as_array().unwrap().len(), 4);
}

#[test]
fn reopen_returns_to_open() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-4", "--severity", "sev4"])
        .assert()
        .success();
    incident(&dir).args(["mitigate", "INC-4"]).assert().success();
    incident(&dir)
        .args(["reopen", "INC-4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reopened INC-4 [SEV4 open]"));
}

#[test]
fn missing_incident_exits_7() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["mitigate", "INC-404"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn note_with_tags_and_actor_flag() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-5", "--severity", "sev3"])
        .assert()
        .success();
    incident(&dir)
        .args([
            "note",
            "INC-5",
            "customer reports recovery",
            "--tag",
            "customer",
            "--tag",
            "update",
            "--actor",
            "bob",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("added note #2"));

    let json = show_json(&dir, "INC-5");
    let note = &json["timeline"][1];
    assert_eq!(note["actor"], "bob");
    assert_eq!(note["kind"]["type"], "note");
    assert_eq!(note["tags"], serde_json::json!(["customer", "update"]));
}

#[test]
fn blank_note_exits_3() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-12", "--severity", "sev4"])
        .assert()
        .success();
    incident(&dir)
        .args(["note", "INC-12", "   "])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("invalid timeline event"));
}

// ---------------------------------------------------------------------------
// Runbooks
// ---------------------------------------------------------------------------

#[test]
fn runbook_list_shows_builtins() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["runbook", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("database_outage"))
        .stdout(predicate::str::contains("security_breach"));
}

#[test]
fn runbook_run_records_every_step() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-6", "--severity", "sev1"])
        .assert()
        .success();
    incident(&dir)
        .args(["runbook", "run", "INC-6", "database_outage"])
        .assert()
        .success()
        .stdout(predicate::str::contains("7 steps"));

    let json = show_json(&dir, "INC-6");
    let events = json["timeline"].as_array().unwrap();
    assert_eq!(events.len(), 8);
    for (i, event) in events[1..].iter().enumerate() {
        assert_eq!(event["kind"]["type"], "runbook_step");
        assert_eq!(event["kind"]["index"], i);
    }
}

#[test]
fn unknown_runbook_exits_6() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-7", "--severity", "sev2"])
        .assert()
        .success();
    incident(&dir)
        .args(["runbook", "run", "INC-7", "alien_invasion"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("unknown runbook"));

    let json = show_json(&dir, "INC-7");
    assert_eq!(json["timeline"].as_array().unwrap().len(), 1);
}

#[test]
fn configured_runbook_is_available() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".incident/config.yaml"),
        "version: 1\nrunbooks:\n  - key: dns_failure\n    steps:\n      - Check resolvers\n      - Flush caches\n",
    )
    .unwrap();
    incident(&dir)
        .args(["runbook", "show", "dns_failure"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2. Flush caches"));
}

// ---------------------------------------------------------------------------
// SLA / severity / list
// ---------------------------------------------------------------------------

fn sla_at(dir: &TempDir, id: &str, at: DateTime<Utc>) -> serde_json::Value {
    let out = incident(dir)
        .args(["--json", "sla", id, "--at", &at.to_rfc3339()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).unwrap()
}

#[test]
fn sev1_response_breach() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-8", "--severity", "sev1"])
        .assert()
        .success();
    let created: DateTime<Utc> = show_json(&dir, "INC-8")["created_at"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let early = sla_at(&dir, "INC-8", created + Duration::minutes(4));
    assert_eq!(early["sla"], "within_sla");
    let late = sla_at(&dir, "INC-8", created + Duration::minutes(6));
    assert_eq!(late["sla"], "response_breached");
}

#[test]
fn sla_rejects_bad_timestamp() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-9", "--severity", "sev2"])
        .assert()
        .success();
    incident(&dir)
        .args(["sla", "INC-9", "--at", "yesterday"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("RFC 3339"));
}

#[test]
fn severity_list_shows_catalog() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["severity", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SEV1"))
        .stdout(predicate::str::contains("5m"));
}

#[test]
fn list_filters_by_status() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    for id in ["INC-10", "INC-11"] {
        incident(&dir)
            .args(["open", id, "--severity", "sev3"])
            .assert()
            .success();
    }
    incident(&dir).args(["mitigate", "INC-11"]).assert().success();
    incident(&dir).args(["resolve", "INC-11"]).assert().success();

    incident(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("INC-10"))
        .stdout(predicate::str::contains("INC-11").not());

    let out = incident(&dir)
        .args(["--json", "list", "--status", "all"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let all: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(all.as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// config validate
// ---------------------------------------------------------------------------

#[test]
fn config_validate_default_is_clean() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

#[test]
fn config_validate_reports_errors() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    std::fs::write(
        dir.path().join(".incident/config.yaml"),
        "version: 1\nseverities:\n  sev9:\n    response_minutes: 1\n",
    )
    .unwrap();
    incident(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown severity 'sev9'"));
}

#[test]
fn oversized_sla_target_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-13", "--severity", "sev1"])
        .assert()
        .success();
    std::fs::write(
        dir.path().join(".incident/config.yaml"),
        "version: 1\nseverities:\n  sev1:\n    response_minutes: 10000000000000\n",
    )
    .unwrap();

    incident(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] sev1"));
    for args in [vec!["sla", "INC-13"], vec!["show", "INC-13"], vec!["list"]] {
        incident(&dir)
            .args(&args)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("response_minutes must be between 1 and"));
    }
}

#[test]
fn show_prints_severity_label() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-14", "--severity", "sev2"])
        .assert()
        .success();
    incident(&dir)
        .args(["show", "INC-14"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Severity: SEV2 (major)"));
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[test]
fn rust_log_raises_verbosity() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    incident(&dir)
        .args(["open", "INC-15", "--severity", "sev2"])
        .assert()
        .success();

    incident(&dir)
        .args(["runbook", "run", "INC-15", "high_latency"])
        .assert()
        .success()
        .stderr(predicate::str::contains("runbook executed").not());
    incident(&dir)
        .env("RUST_LOG", "debug")
        .args(["runbook", "run", "INC-15", "high_latency"])
        .assert()
        .success()
        .stderr(predicate::str::contains("runbook executed"));
}
