use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ldes() -> Command {
    let mut cmd: Command = cargo_bin_cmd!("ldes").into();
    cmd.env_remove("LDES_LLM_API_KEY");
    cmd.env("RUST_LOG", "off");
    cmd
}

fn write_doc(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn reports(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

const ALPHA: &str = "Project Alpha, developed by Form Energy, is a 100 MW iron-air battery \
                     that can discharge for 4 hours. It is located in Cambridge, Minnesota.";

// --- Binary startup ---

#[test]
fn binary_runs() {
    ldes()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ldes"));
}

// --- Extract ---

#[test]
fn extract_accepted_document() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(tmp.path(), "alpha.txt", ALPHA);

    let output = ldes().arg("extract").arg(&doc).assert().success();
    let reports = reports(&output.get_output().stdout);

    assert_eq!(reports.len(), 1);
    let outcome = &reports[0]["outcome"];
    assert_eq!(outcome["status"], "accepted");
    assert_eq!(outcome["record"]["project_name"], "Project Alpha");
    assert_eq!(outcome["record"]["capacity_mwh"]["value"], 400.0);
    assert_eq!(outcome["record"]["capacity_mwh"]["origin"], "derived");
    assert_eq!(outcome["record"]["developer"]["canonical"]["name"], "Form Energy Inc.");
}

#[test]
fn extract_reports_each_document_in_order() {
    let tmp = TempDir::new().unwrap();
    let alpha = write_doc(tmp.path(), "alpha.txt", ALPHA);
    let empty = write_doc(tmp.path(), "empty.txt", "Quarterly newsletter, nothing to report.");
    let timeline = write_doc(
        tmp.path(),
        "beta.txt",
        "Project name: Beta Storage\nRated at 100 MW\nAnnounced: 2023\nOperational: 2025\nPermitted: 2026\n",
    );

    let output = ldes()
        .arg("extract")
        .args([&alpha, &empty, &timeline])
        .arg("--summary")
        .assert()
        .success()
        .stderr(predicate::str::contains("Rejected: 1"));
    let reports = reports(&output.get_output().stdout);

    let statuses: Vec<&str> = reports
        .iter()
        .map(|r| r["outcome"]["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["accepted", "rejected", "flagged"]);
    assert_eq!(
        reports[1]["outcome"]["error"]["missing"],
        serde_json::json!(["project_name", "capacity"])
    );
    assert!(reports[2]["issues"]
        .as_array()
        .unwrap()
        .iter()
        .any(|i| i["kind"] == "timeline_conflict"));
}

#[test]
fn extract_with_custom_rules() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(
        tmp.path(),
        "gamma.txt",
        "Codename Kestrel is a 50 MW / 200 MWh system.",
    );
    let rules = write_doc(
        tmp.path(),
        "rules.json",
        r#"[{"field": "project_name", "pattern": "Codename (\\w+)"}]"#,
    );

    let output = ldes()
        .arg("extract")
        .arg(&doc)
        .arg("--rules")
        .arg(&rules)
        .assert()
        .success();
    let reports = reports(&output.get_output().stdout);
    assert_eq!(reports[0]["outcome"]["record"]["project_name"], "Kestrel");
}

#[test]
fn extract_with_unreachable_recognizer_degrades() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(tmp.path(), "alpha.txt", ALPHA);

    let output = ldes()
        .arg("extract")
        .arg(&doc)
        .args(["--recognizer-url", "http://127.0.0.1:9/predict"])
        .assert()
        .success();
    let reports = reports(&output.get_output().stdout);

    assert_eq!(reports[0]["outcome"]["status"], "accepted");
    assert_eq!(reports[0]["issues"][0]["kind"], "recognizer_unavailable");
}

#[test]
fn extract_missing_file_fails() {
    ldes()
        .args(["extract", "/nonexistent/doc.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading /nonexistent/doc.txt"));
}

#[test]
fn extract_rejects_unknown_sector() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(tmp.path(), "alpha.txt", ALPHA);
    ldes()
        .arg("extract")
        .arg(&doc)
        .args(["--sector", "nuclear"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid sector"));
}

#[test]
fn extract_rejects_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(tmp.path(), "alpha.txt", ALPHA);
    let config = write_doc(tmp.path(), "ldes.toml", "capacity_tolerance = 2.0\n");
    ldes()
        .arg("extract")
        .arg(&doc)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("capacity_tolerance"));
}

#[test]
fn extract_rejects_non_numeric_temperature() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(tmp.path(), "alpha.txt", ALPHA);
    ldes()
        .arg("extract")
        .arg(&doc)
        .args(["--llm-temperature", "warm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--llm-temperature"));
}

#[test]
fn extract_prefers_labelled_project_name() {
    let tmp = TempDir::new().unwrap();
    let doc = write_doc(
        tmp.path(),
        "beta.txt",
        "Project name: Beta Storage\nThe Beta Storage Project is a 100 MW battery.\n",
    );

    let output = ldes().arg("extract").arg(&doc).assert().success();
    let reports = reports(&output.get_output().stdout);
    assert_eq!(reports[0]["outcome"]["status"], "accepted");
    assert_eq!(reports[0]["outcome"]["record"]["project_name"], "Beta Storage");
}

// --- Resolve ---

#[test]
fn resolve_company_alias() {
    ldes()
        .args(["resolve", "Form Energy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"resolved\""))
        .stdout(predicate::str::contains("Form Energy Inc."));
}

#[test]
fn resolve_short_mention_stays_unresolved() {
    ldes()
        .args(["resolve", "Form"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"unresolved\""));
}

#[test]
fn resolve_technology() {
    ldes()
        .args(["resolve", "CAES", "--class", "technology"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"resolved\""));
}

// --- Defaults ---

#[test]
fn defaults_round_trip_as_config() {
    let output = ldes().arg("defaults").assert().success();
    let toml_text = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    assert!(toml_text.contains("capacity_tolerance"));
    assert!(toml_text.contains("[llm]"));

    let tmp = TempDir::new().unwrap();
    let config = write_doc(tmp.path(), "ldes.toml", &toml_text);
    ldes()
        .args(["resolve", "Form Energy", "--config"])
        .arg(&config)
        .assert()
        .success();
}
