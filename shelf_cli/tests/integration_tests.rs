//! Integration tests for the shelf binary.
//!
//! These tests verify end-to-end behavior including:
//! - Provisioning and cold restart
//! - Report ingestion (one-shot and streaming)
//! - Dashboard, history and CSV export output
//! - Configuration overrides

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const OCCUPIED: &str = r#"{"system1": {"presenceSignal": "occupied", "authorized": true, "weight": 1.5}}"#;
const LIFTED: &str = r#"{"system1": {"presenceSignal": "empty", "authorized": true, "weight": 0.0}}"#;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("shelf"))
}

/// Write a config file pointing at `data_dir`, with optional extra TOML
fn write_config(temp_dir: &TempDir, extra: &str) -> PathBuf {
    let data_dir = temp_dir.path().join("data");
    let path = temp_dir.path().join("config.toml");
    let contents = format!(
        "[data]\ndata_dir = {:?}\n\n{}",
        data_dir.to_string_lossy(),
        extra
    );
    fs::write(&path, contents).expect("Failed to write config");
    path
}

fn ingest(config: &Path, payload: &str) -> assert_cmd::assert::Assert {
    cli()
        .arg("ingest")
        .arg("--config")
        .arg(config)
        .write_stdin(payload)
        .assert()
}

fn json_stdout(config: &Path, command: &str) -> Value {
    let output = cli()
        .arg(command)
        .arg("--config")
        .arg(config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("stdout is not JSON")
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Smart tool shelf lending tracker"));
}

#[test]
fn test_init_creates_database() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");

    cli()
        .arg("init")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 slot(s) waiting"));

    assert!(temp_dir.path().join("data/smart_factory.db").exists());
}

#[test]
fn test_data_dir_override() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");
    let other = temp_dir.path().join("elsewhere");

    cli()
        .arg("init")
        .arg("--config")
        .arg(&config)
        .arg("--data-dir")
        .arg(&other)
        .assert()
        .success();

    assert!(other.join("smart_factory.db").exists());
    assert!(!temp_dir.path().join("data/smart_factory.db").exists());
}

#[test]
fn test_fresh_dashboard_shows_waiting_slots() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");

    let dashboard = json_stdout(&config, "dashboard");
    let slots = dashboard.as_array().unwrap();
    assert_eq!(slots.len(), 2);
    for slot in slots {
        assert_eq!(slot["display_status"], "Waiting");
        assert_eq!(slot["led_color"], "grey");
        assert_eq!(slot["authorized_status"], "Connecting");
    }
    assert_eq!(slots[0]["name"], "Precision Screwdriver Set");
}

#[test]
fn test_borrow_flow_through_ingest() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");

    cli().arg("init").arg("--config").arg(&config).assert().success();

    // First contact: no loan event
    ingest(&config, OCCUPIED)
        .success()
        .stdout(predicate::str::contains(r#""processed":[]"#));

    ingest(&config, LIFTED)
        .success()
        .stdout(predicate::str::contains("Slot 1 [TAKEN]"));

    // Retransmission is a no-op
    ingest(&config, LIFTED)
        .success()
        .stdout(predicate::str::contains(r#""processed":[]"#));

    let dashboard = json_stdout(&config, "dashboard");
    assert_eq!(dashboard[0]["display_status"], "Borrowed");
    assert_eq!(dashboard[0]["authorized_status"], "True");
    assert_eq!(dashboard[0]["usage_count"], 1);
    assert_eq!(dashboard[1]["display_status"], "Waiting");

    let history = json_stdout(&config, "history");
    let events = history.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], "Borrowed");
    assert_eq!(events[0]["slot_id"], 1);
}

#[test]
fn test_ingest_from_file() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");
    let report = temp_dir.path().join("report.json");
    fs::write(&report, OCCUPIED).unwrap();

    cli()
        .arg("ingest")
        .arg("--config")
        .arg(&config)
        .arg("--file")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("success"));

    let dashboard = json_stdout(&config, "dashboard");
    assert_eq!(dashboard[0]["display_status"], "Available");
    assert_eq!(dashboard[0]["authorized_status"], "-");
}

#[test]
fn test_empty_payload_rejected() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");

    ingest(&config, "{}")
        .failure()
        .stdout(predicate::str::contains("Empty payload"));

    ingest(&config, "not json at all")
        .failure()
        .stdout(predicate::str::contains(r#""status":"error""#));
}

#[test]
fn test_run_streams_reports_and_survives_bad_lines() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");

    let input = [OCCUPIED, LIFTED, "garbage", "", OCCUPIED].join("\n");
    let output = cli()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .write_stdin(input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<Value> = String::from_utf8_lossy(&output)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["status"], "success");
    assert!(lines[1]["processed"][0].as_str().unwrap().contains("[TAKEN]"));
    assert_eq!(lines[2]["status"], "error");
    assert_eq!(lines[2]["retryable"], false);
    assert!(lines[3]["processed"][0].as_str().unwrap().contains("[RETURNED]"));
}

#[test]
fn test_run_survives_non_utf8_line() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");

    let mut input = Vec::new();
    input.extend_from_slice(OCCUPIED.as_bytes());
    input.extend_from_slice(b"\n{\"system1\": \xff\xfe}\n");
    input.extend_from_slice(LIFTED.as_bytes());
    input.push(b'\n');

    let output = cli()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .write_stdin(input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<Value> = String::from_utf8_lossy(&output)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["status"], "success");
    assert_eq!(lines[1]["status"], "error");
    assert_eq!(lines[1]["retryable"], false);
    assert!(lines[2]["processed"][0].as_str().unwrap().contains("[TAKEN]"));
}

#[test]
fn test_restart_resets_slots_but_keeps_history() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");

    ingest(&config, OCCUPIED).success();
    ingest(&config, LIFTED).success();

    cli().arg("init").arg("--config").arg(&config).assert().success();

    let dashboard = json_stdout(&config, "dashboard");
    assert_eq!(dashboard[0]["display_status"], "Waiting");
    assert_eq!(dashboard[0]["weight"], 0.0);
    assert_eq!(dashboard[0]["usage_count"], 1);

    let history = json_stdout(&config, "history");
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[test]
fn test_export_writes_bom_csv() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");

    ingest(&config, OCCUPIED).success();
    ingest(&config, LIFTED).success();
    ingest(&config, OCCUPIED).success();

    let out = temp_dir.path().join("report.csv");
    cli()
        .arg("export")
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 events"));

    let bytes = fs::read(&out).unwrap();
    assert!(bytes.starts_with("\u{feff}".as_bytes()));
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<_> = text.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(lines[0], "Log ID,Slot ID,Action,Authorized,Timestamp");
    assert!(lines[1].starts_with("2,1,Returned,,"));
    assert!(lines[2].starts_with("1,1,Borrowed,True,"));
}

#[test]
fn test_export_default_path_and_stdout() {
    let temp_dir = setup_test_dir();
    let config = write_config(&temp_dir, "");

    cli()
        .arg("export")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();
    assert!(temp_dir.path().join("data/tools_report.csv").exists());

    cli()
        .arg("export")
        .arg("--config")
        .arg(&config)
        .arg("--stdout")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("\u{feff}Log ID,Slot ID"));
}

#[test]
fn test_custom_layout_and_thresholds() {
    let temp_dir = setup_test_dir();
    let config = write_config(
        &temp_dir,
        r#"
[alerts]
maintenance_threshold = 1

[[slots]]
key = "bay_a"
slot_id = 10
name = "Cordless Drill"

[[slots]]
key = "bay_b"
slot_id = 11
name = "Heat Gun"

[[slots]]
key = "bay_c"
slot_id = 12
name = "Multimeter"
"#,
    );

    ingest(&config, r#"{"bay_c": {"presenceSignal": "occupied"}, "system1": {"presenceSignal": "empty"}}"#)
        .success();
    ingest(&config, r#"{"bay_c": {"led_status": "red", "authorized": false}}"#)
        .success()
        .stdout(predicate::str::contains("Slot 12 [TAKEN] | Auth: False"));

    let dashboard = json_stdout(&config, "dashboard");
    let slots = dashboard.as_array().unwrap();
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[2]["slot_id"], 12);
    assert_eq!(slots[2]["alert_maintenance"], true);
    assert_eq!(slots[0]["alert_maintenance"], false);
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = setup_test_dir();
    let config = write_config(
        &temp_dir,
        r#"
[[slots]]
key = "same"
slot_id = 1
name = "One"

[[slots]]
key = "same"
slot_id = 2
name = "Two"
"#,
    );

    cli()
        .arg("dashboard")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate slot key"));
}
