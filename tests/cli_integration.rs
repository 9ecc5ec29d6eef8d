//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use std::path::Path;

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

const SCENARIO: &str = r#"
states:
  - name: ToDo
  - name: Specified
  - name: Planned
  - name: Done
phases:
  specify:
    inputStates: [ToDo]
    outputState: Specified
  plan:
    inputStates: [Specified]
    outputState: Planned
  finish:
    inputStates: [Planned]
    outputState: Done
    emergencyFrom: [Specified]
rules:
  - code: PRD-001
    severity: blocking
    phases: [plan]
    check: { kind: artifact, pattern: "docs/prd/*.md" }
    remediation: Write the PRD first
"#;

/// Get the binary to test, isolated from the user's config and environment.
fn flowgate(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("flowgate").unwrap();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".xdg"))
        .env_remove("FLOWGATE_WORKFLOW")
        .env_remove("RUST_LOG");
    cmd
}

fn project() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("flowgate.yml").write_str(SCENARIO).unwrap();
    temp
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let temp = assert_fs::TempDir::new().unwrap();
    flowgate(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow state machine and policy gate"));
}

#[test]
fn test_version_flag() {
    let temp = assert_fs::TempDir::new().unwrap();
    flowgate(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    flowgate(temp.path()).arg("frobnicate").assert().code(2);
}

#[test]
fn test_check_requires_state_or_task() {
    let temp = project();
    flowgate(temp.path()).args(["check", "plan"]).assert().code(2);
}

// ============================================================================
// Init & Validate Tests
// ============================================================================

#[test]
fn test_init_writes_valid_workflow() {
    let temp = assert_fs::TempDir::new().unwrap();
    flowgate(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    temp.child("flowgate.yml").assert(predicate::str::contains("initialState: To Do"));

    flowgate(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("valid (9 states, 8 phases, 4 rules)"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp = project();
    flowgate(temp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    flowgate(temp.path()).args(["init", "--force"]).assert().success();
    temp.child("flowgate.yml").assert(predicate::str::contains("In Implementation"));
}

#[test]
fn test_validate_reports_graph_issues() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("flowgate.yml")
        .write_str(
            "states:\n  - name: A\n  - name: B\n  - name: Orphan\nphases:\n  go:\n    inputStates: [A]\n    outputState: B\n",
        )
        .unwrap();

    flowgate(temp.path())
        .arg("validate")
        .assert()
        .code(6)
        .stdout(predicate::str::contains("UNREACHABLE"));
}

#[test]
fn test_validate_json() {
    let temp = project();
    let output = flowgate(temp.path()).args(["validate", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["phases"], 3);
}

#[test]
fn test_malformed_workflow_names_path() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("flowgate.yml")
        .write_str(&SCENARIO.replace("outputState: Done", "outputState: Shipped"))
        .unwrap();

    flowgate(temp.path())
        .args(["check", "finish", "--state", "Planned"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("phases.finish.outputState"));
}

#[test]
fn test_missing_workflow_is_config_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    flowgate(temp.path()).args(["graph"]).assert().code(6);
}

// ============================================================================
// Check Command Tests
// ============================================================================

#[test]
fn test_check_denied() {
    let temp = project();
    flowgate(temp.path())
        .args(["check", "plan", "--state", "ToDo"])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("requires one of {Specified}"));
}

#[test]
fn test_check_passed() {
    let temp = project();
    flowgate(temp.path())
        .args(["check", "specify", "--state", "ToDo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"))
        .stdout(predicate::str::contains("Next state: Specified"));
}

#[test]
fn test_check_blocked_until_artifact_exists() {
    let temp = project();
    flowgate(temp.path())
        .args(["check", "plan", "--state", "Specified"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("BLOCKED"))
        .stdout(predicate::str::contains("Write the PRD first"));

    temp.child("docs/prd/auth.md").write_str("# Auth").unwrap();
    flowgate(temp.path()).args(["check", "plan", "--state", "Specified"]).assert().success();
}

#[test]
fn test_check_warn_only() {
    let temp = project();
    flowgate(temp.path())
        .args(["check", "plan", "--state", "Specified", "--warn-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED_WITH_WARNINGS"))
        .stderr(predicate::str::contains("warning: PRD-001 failed"));
}

#[test]
fn test_check_force_along_emergency_path() {
    let temp = project();
    flowgate(temp.path())
        .args(["check", "finish", "--state", "Specified", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("guard override used"))
        .stderr(predicate::str::contains("bypassed"));

    flowgate(temp.path())
        .args(["check", "finish", "--state", "ToDo", "--force"])
        .assert()
        .code(4);
}

#[test]
fn test_check_force_without_emergency_path_is_denied() {
    let temp = project();
    flowgate(temp.path())
        .args(["check", "plan", "--state", "ToDo", "--force"])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("DENIED"))
        .stderr(predicate::str::contains("bypassed").not());
}

#[test]
fn test_check_json_output() {
    let temp = project();
    let output = flowgate(temp.path())
        .args(["check", "plan", "--state", "Specified", "--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["verdict"], "blocked");
    assert_eq!(json["next_state"], "Planned");
    assert_eq!(json["report"]["outcome"], "BLOCKED");
    assert_eq!(json["report"]["entries"][0]["code"], "PRD-001");
}

#[test]
fn test_check_unknown_phase() {
    let temp = project();
    flowgate(temp.path())
        .args(["check", "deploy", "--state", "ToDo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown phase 'deploy'"));
}

#[test]
fn test_workflow_from_env() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("ops/flow.yml").write_str(SCENARIO).unwrap();
    flowgate(temp.path())
        .env("FLOWGATE_WORKFLOW", "ops/flow.yml")
        .args(["check", "specify", "--state", "ToDo"])
        .assert()
        .success();
}

#[test]
fn test_workflow_from_local_config() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(".flowgate.toml").write_str("[general]\nworkflow = \"ops/flow.toml\"\n").unwrap();
    temp.child("ops/flow.toml")
        .write_str(
            "[[states]]\nname = \"A\"\n\n[[states]]\nname = \"B\"\n\n[phases.go]\ninputStates = [\"A\"]\noutputState = \"B\"\n",
        )
        .unwrap();

    flowgate(temp.path())
        .args(["check", "go", "--state", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Next state: B"));
}

// ============================================================================
// Task & Advance Tests
// ============================================================================

#[test]
fn test_advance_moves_task() {
    let temp = project();
    flowgate(temp.path()).args(["task", "add", "t1", "--state", "ToDo"]).assert().success();

    flowgate(temp.path())
        .args(["advance", "specify", "--task", "t1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Task 't1' is now in 'Specified'"));

    flowgate(temp.path())
        .args(["task", "show", "t1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\": \"Specified\""));

    // Same phase again: the task has moved on
    flowgate(temp.path()).args(["advance", "specify", "--task", "t1"]).assert().code(4);
}

#[test]
fn test_advance_blocked_keeps_state() {
    let temp = project();
    flowgate(temp.path()).args(["task", "add", "t1", "--state", "Specified"]).assert().success();
    flowgate(temp.path()).args(["advance", "plan", "--task", "t1"]).assert().code(3);
    flowgate(temp.path())
        .args(["task", "show", "t1"])
        .assert()
        .stdout(predicate::str::contains("\"state\": \"Specified\""));
}

#[test]
fn test_check_reads_task() {
    let temp = project();
    flowgate(temp.path())
        .args(["task", "add", "t1", "--state", "Specified", "--label", "sec", "--item", "[x] AC1"])
        .assert()
        .success();

    flowgate(temp.path())
        .args(["check", "plan", "--task", "t1"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("PRD-001"));
}

#[test]
fn test_advance_missing_task() {
    let temp = project();
    flowgate(temp.path())
        .args(["advance", "specify", "--task", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

// ============================================================================
// Graph & Rules Tests
// ============================================================================

#[test]
fn test_graph_formats() {
    let temp = project();
    flowgate(temp.path())
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("ToDo (initial)"))
        .stdout(predicate::str::contains("plan: {Specified} -> Planned"));

    flowgate(temp.path())
        .args(["graph", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph workflow"));

    let output = flowgate(temp.path()).args(["graph", "--format", "json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["initialState"], "ToDo");
    assert_eq!(json["terminalStates"][0], "Done");
}

#[test]
fn test_rules_listing() {
    let temp = project();
    flowgate(temp.path())
        .args(["rules", "--phase", "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PRD-001"))
        .stdout(predicate::str::contains("artifact docs/prd/*.md"));

    flowgate(temp.path())
        .args(["rules", "--phase", "specify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No rules"));
}

#[test]
fn test_completions() {
    let temp = assert_fs::TempDir::new().unwrap();
    flowgate(temp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("flowgate"));
}
