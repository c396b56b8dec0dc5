//! CLI integration tests for all subcommands.
//!
//! Uses `assert_cmd` to spawn the `tally` binary and verify
//! exit codes, stdout content, and stderr content.
//!
//! All tests set `current_dir` to the workspace root so that relative
//! paths to fixtures resolve correctly.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `tally` binary, rooted at workspace.
fn tally() -> Command {
    let mut cmd = cargo_bin_cmd!("tally");
    cmd.current_dir(workspace_root());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("failed to run tally");
    assert!(output.status.success(), "{:?}", output);
    String::from_utf8(output.stdout).expect("utf-8 stdout")
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    tally()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deterministic scoring engine"));
}

#[test]
fn version_exits_0() {
    tally()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tally"));
}

#[test]
fn score_help_mentions_answers() {
    tally()
        .args(["score", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--answers"));
}

// ──────────────────────────────────────────────
// 2. Validate
// ──────────────────────────────────────────────

#[test]
fn validate_valid_bundle_exits_0() {
    tally()
        .args(["validate", "fixtures/positive/sum_scale.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid: sum-scale-v1 (2 variables, sha256-"));
}

#[test]
fn validate_json_output() {
    tally()
        .args([
            "--output",
            "json",
            "validate",
            "fixtures/positive/assessment.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"))
        .stdout(predicate::str::contains("\"version_id\": \"wellbeing-2025-01\""));
}

#[test]
fn validate_schema_violation_lists_errors() {
    tally()
        .args(["validate", "fixtures/negative/invalid_operator.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid bundle"))
        .stderr(predicate::str::contains("average"));
}

#[test]
fn validate_cycle_reports_engine_error() {
    tally()
        .args(["validate", "fixtures/negative/cycle.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("\"error\": \"CYCLE_DETECTED\""));
}

#[test]
fn validate_missing_variable_json_output() {
    tally()
        .args([
            "--output",
            "json",
            "validate",
            "fixtures/negative/missing_variable.json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"referenced_by\": \"A\""))
        .stderr(predicate::str::contains("\"variable\": \"v_not_exist\""));
}

#[test]
fn validate_question_out_of_range() {
    tally()
        .args(["validate", "fixtures/negative/question_out_of_range.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_QUESTION_ID"))
        .stderr(predicate::str::contains("Q96"));
}

#[test]
fn validate_nonexistent_file_exits_1() {
    tally()
        .args(["validate", "nonexistent_bundle_xyz.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error reading bundle"));
}

#[test]
fn quiet_suppresses_text_errors() {
    tally()
        .args(["--quiet", "validate", "fixtures/negative/cycle.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 3. Graph and hash
// ──────────────────────────────────────────────

#[test]
fn graph_text_output() {
    tally()
        .args(["graph", "fixtures/positive/sum_scale.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("order: v_sum, v_scaled"))
        .stdout(predicate::str::contains("layer 1: v_scaled"))
        .stdout(predicate::str::contains("v_sum -> v_scaled"));
}

#[test]
fn graph_json_output_parses() {
    let out = stdout_of(tally().args([
        "--output",
        "json",
        "graph",
        "fixtures/positive/assessment.json",
    ]));
    let graph: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(graph["topo_order"].as_array().unwrap().len(), 14);
    assert_eq!(graph["layers"][3], serde_json::json!(["severity"]));
}

#[test]
fn hash_is_stable_across_key_order() {
    let first = stdout_of(tally().args(["hash", "fixtures/positive/sum_scale.json"]));
    assert!(first.trim().starts_with("sha256-"), "{}", first);

    // Same bundle, keys written in a different order and compact.
    let tmp = TempDir::new().unwrap();
    let reordered = tmp.path().join("reordered.json");
    fs::write(
        &reordered,
        r#"{"variables":{"v_scaled":{"expression":{"to":100,"max":20,"min":0,"inputs":[{"source":"v_sum"}],"op":"scale"},"type":"rule"},"v_sum":{"expression":{"inputs":[{"source":"Q1"},{"source":"Q2"}],"op":"sum"},"type":"rule"}},"metadata":{"description":"Sum two answers, then rescale 0..20 onto 0..100","created_at":"2025-01-01T00:00:00Z"},"version_id":"sum-scale-v1"}"#,
    )
    .unwrap();
    let second = stdout_of(tally().arg("hash").arg(&reordered));
    assert_eq!(first, second);
}

#[test]
fn structural_hash_differs_from_version_hash() {
    let version = stdout_of(tally().args(["hash", "fixtures/positive/sum_scale.json"]));
    let structural = stdout_of(tally().args([
        "hash",
        "--structural",
        "fixtures/positive/sum_scale.json",
    ]));
    assert!(structural.trim().starts_with("sha256-"));
    assert_ne!(version, structural);
}

#[test]
fn hash_json_output_names_the_hash() {
    tally()
        .args([
            "--output",
            "json",
            "hash",
            "--structural",
            "fixtures/positive/sum_scale.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"structural_hash\": \"sha256-"));
}

// ──────────────────────────────────────────────
// 4. Score
// ──────────────────────────────────────────────

#[test]
fn score_text_output_in_trace_order() {
    tally()
        .args([
            "score",
            "fixtures/positive/sum_scale.json",
            "--answers",
            "fixtures/positive/sum_scale.answers.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("v_sum = 10\nv_scaled = 50\n"));
}

#[test]
fn score_json_output_is_full_result() {
    let out = stdout_of(tally().args([
        "--output",
        "json",
        "score",
        "fixtures/positive/assessment.json",
        "--answers",
        "fixtures/positive/assessment.answers.json",
    ]));
    let result: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(result["version_id"], "wellbeing-2025-01");
    assert_eq!(result["variables"]["severity"].as_f64(), Some(4.0));
    assert_eq!(result["variables"]["combined"].as_f64(), Some(37.5));
    assert_eq!(result["execution_trace"][0], "anxiety_raw");
    assert!(result["version_hash"].as_str().unwrap().starts_with("sha256-"));
}

#[test]
fn score_division_by_zero_names_variable() {
    tally()
        .args([
            "score",
            "fixtures/negative/divide_by_zero.json",
            "--answers",
            "fixtures/negative/divide_by_zero.answers.json",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("EXECUTION_ERROR"))
        .stderr(predicate::str::contains("\"variable\": \"ratio\""));
}

#[test]
fn score_rejects_unknown_answer_ids() {
    let tmp = TempDir::new().unwrap();
    let answers = tmp.path().join("answers.json");
    fs::write(
        &answers,
        r#"{ "user_id": "u", "answers": { "Q1": 1, "Q2": 2, "Q200": 3 } }"#,
    )
    .unwrap();
    tally()
        .args(["score", "fixtures/positive/sum_scale.json", "--answers"])
        .arg(&answers)
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_QUESTION_ID"))
        .stderr(predicate::str::contains("Q200"));
}

#[test]
fn score_malformed_answers_exits_1() {
    let tmp = TempDir::new().unwrap();
    let answers = tmp.path().join("answers.json");
    fs::write(&answers, r#"{ "answers": { "Q1": "five" } }"#).unwrap();
    tally()
        .args(["score", "fixtures/positive/sum_scale.json", "--answers"])
        .arg(&answers)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid answers payload"));
}

// ──────────────────────────────────────────────
// 5. Config
// ──────────────────────────────────────────────

fn custom_domain_bundle(dir: &Path) -> PathBuf {
    let path = dir.join("custom.json");
    fs::write(
        &path,
        r#"{
            "version_id": "custom-v1",
            "variables": {
                "total": { "type": "rule", "expression": { "op": "sum", "inputs": [{ "source": "A1" }, { "source": "A3" }] } }
            }
        }"#,
    )
    .unwrap();
    path
}

#[test]
fn config_answer_domain_classifies_sources() {
    let tmp = TempDir::new().unwrap();
    let bundle = custom_domain_bundle(tmp.path());
    let config = tmp.path().join("tally.toml");
    fs::write(&config, "[answers]\nprefix = \"A\"\nmin_index = 1\nmax_index = 3\n").unwrap();

    tally()
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .arg(&bundle)
        .assert()
        .success();

    // Under the default Q domain, A1 reads as a variable reference.
    tally()
        .arg("validate")
        .arg(&bundle)
        .assert()
        .failure()
        .stderr(predicate::str::contains("MISSING_VARIABLE"));
}

#[test]
fn invalid_config_exits_1() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("tally.toml");
    fs::write(&config, "[answers]\nmin_index = 9\nmax_index = 1\n").unwrap();
    tally()
        .arg("--config")
        .arg(&config)
        .args(["validate", "fixtures/positive/sum_scale.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not parse"));
}
