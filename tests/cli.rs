// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ctflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ctflow").unwrap();
    cmd.env_remove("CTFLOW_CONFIG").arg("-C").arg(dir.path());
    cmd
}

#[test]
fn help_prints() {
    Command::cargo_bin("ctflow")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"));
}

#[test]
fn build_writes_template() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("repo").join("pipeline");

    ctflow(&dir)
        .args(["build", "--root"])
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "managed-continuous-training-workflow-template.yml",
        ));

    let written = dir
        .path()
        .join("repo/resources/deployed/managed-continuous-training-workflow-template.yml");
    let content = std::fs::read_to_string(written).unwrap();
    assert!(content.contains("kind: WorkflowTemplate"));
    assert!(content.contains("name: continuous-training-template"));
    assert!(!content.contains("generateName"));
}

#[test]
fn build_from_inside_tool_root() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("pipeline");
    std::fs::create_dir(&root).unwrap();

    Command::cargo_bin("ctflow")
        .unwrap()
        .env_remove("CTFLOW_CONFIG")
        .arg("-C")
        .arg(&root)
        .args(["build", "--root", "."])
        .assert()
        .success();

    assert!(dir
        .path()
        .join("resources/deployed/managed-continuous-training-workflow-template.yml")
        .exists());
    assert!(!root.join("resources").exists());
}

#[test]
fn build_twice_is_identical() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("pipeline");
    let written = dir
        .path()
        .join("resources/deployed/managed-continuous-training-workflow-template.yml");

    ctflow(&dir).arg("build").arg("--root").arg(&root).assert().success();
    let first = std::fs::read(&written).unwrap();

    ctflow(&dir).arg("build").arg("--root").arg(&root).assert().success();
    let second = std::fs::read(&written).unwrap();

    assert_eq!(first, second);
}

#[test]
fn build_stdout() {
    let dir = TempDir::new().unwrap();

    ctflow(&dir)
        .args(["build", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("apiVersion: argoproj.io/v1alpha1"))
        .stdout(predicate::str::contains("kind: WorkflowTemplate"))
        .stdout(predicate::str::contains("avp_path: avp/data/nwd-pipeline-continuous-training"));

    assert!(!dir.path().join("resources").exists());
}

#[test]
fn build_uses_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("ctflow.yaml"),
        "images:\n  ops: registry.local/ct-ops:9\n",
    )
    .unwrap();

    ctflow(&dir)
        .args(["build", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registry.local/ct-ops:9"));
}

#[test]
fn build_rejects_bad_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("ctflow.yaml"), "unhandled_branch: maybe\n").unwrap();

    ctflow(&dir).args(["build", "--stdout"]).assert().failure();
}

#[test]
fn graph_mermaid() {
    let dir = TempDir::new().unwrap();

    ctflow(&dir)
        .args(["graph", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph TD"))
        .stdout(predicate::str::contains("subgraph"))
        .stdout(predicate::str::contains("check-preprocess-proceed"));
}

#[test]
fn validate_succeeds() {
    let dir = TempDir::new().unwrap();

    ctflow(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid"));
}

#[test]
fn validate_verbose_lists_execution_order() {
    let dir = TempDir::new().unwrap();

    ctflow(&dir)
        .args(["validate", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Execution order: check-preprocess-proceed",
        ));
}
