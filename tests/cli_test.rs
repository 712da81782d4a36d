//! Integration tests for the gantry CLI.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_pipeline(content: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("gantry.yml"), content).unwrap();
    temp
}

fn gantry() -> Command {
    Command::new(cargo_bin("gantry"))
}

const SIMPLE_PIPELINE: &str = r#"
name: simple
steps:
  - id: hello
    unit: /bin/sh
    args: [-c, "echo hello"]
"#;

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    gantry()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build-pipeline orchestrator"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    gantry()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_run_executes_pipeline() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(SIMPLE_PIPELINE);
    gantry()
        .current_dir(temp.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline succeeded"))
        // Step output streams to the log sink on stderr.
        .stderr(predicate::str::contains("hello"));
    Ok(())
}

#[test]
fn cli_no_args_runs_pipeline() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(SIMPLE_PIPELINE);
    gantry()
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline succeeded"));
    Ok(())
}

#[test]
fn cli_run_without_pipeline_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    gantry()
        .current_dir(temp.path())
        .arg("run")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("not found"));
    Ok(())
}

#[test]
fn cli_run_reports_failure_and_skips_dependents() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(
        r#"
steps:
  - id: build
    unit: /bin/sh
    args: [-c, "exit 3"]
  - id: deploy
    unit: /bin/sh
    args: [-c, "echo never"]
    wait_for: [build]
"#,
    );

    gantry()
        .current_dir(temp.path())
        .arg("run")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Pipeline failed"))
        .stdout(predicate::str::contains("exit code 3"))
        .stdout(predicate::str::contains("predecessor 'build' did not succeed"));
    Ok(())
}

#[test]
fn cli_run_honors_global_timeout() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(
        r#"
timeout: 300ms
steps:
  - id: slow
    unit: /bin/sh
    args: [-c, "sleep 10"]
"#,
    );

    gantry()
        .current_dir(temp.path())
        .arg("run")
        .timeout(std::time::Duration::from_secs(8))
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Pipeline timed out"));
    Ok(())
}

#[test]
fn cli_run_passes_substitutions() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(
        r#"
steps:
  - id: check
    unit: /bin/sh
    args: [-c, "test \"${_MODE}\" = canary"]
"#,
    );

    gantry()
        .current_dir(temp.path())
        .args(["run", "--substitution", "_MODE=canary"])
        .assert()
        .success();
    Ok(())
}

#[test]
fn cli_run_dry_run_executes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(
        r#"
steps:
  - id: danger
    unit: /bin/sh
    args: [-c, "touch ran.txt"]
"#,
    );

    gantry()
        .current_dir(temp.path())
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry-run mode"))
        .stdout(predicate::str::contains("danger"));

    assert!(!temp.path().join("ran.txt").exists());
    Ok(())
}

#[test]
fn cli_run_json_report() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(SIMPLE_PIPELINE);
    let output = gantry()
        .current_dir(temp.path())
        .args(["run", "--format", "json"])
        .output()?;

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["steps"][0]["id"], "hello");
    assert_eq!(json["steps"][0]["status"], "success");
    Ok(())
}

#[test]
fn cli_validate_accepts_good_pipeline() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(SIMPLE_PIPELINE);
    gantry()
        .current_dir(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
    Ok(())
}

#[test]
fn cli_validate_rejects_unknown_dependency() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(
        r#"
steps:
  - id: build
    unit: /bin/sh
    wait_for: [ghost]
"#,
    );

    gantry()
        .current_dir(temp.path())
        .arg("validate")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unknown-dependency"));
    Ok(())
}

#[test]
fn cli_run_rejects_invalid_pipeline_before_executing() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(
        r#"
steps:
  - id: build
    unit: /bin/sh
    args: [-c, "touch ran.txt"]
  - id: build
    unit: /bin/sh
    args: [-c, "touch also-ran.txt"]
"#,
    );

    gantry()
        .current_dir(temp.path())
        .arg("run")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("duplicate-id"));

    assert!(!temp.path().join("ran.txt").exists());
    assert!(!temp.path().join("also-ran.txt").exists());
    Ok(())
}

#[test]
fn cli_list_shows_steps_and_waves() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(
        r#"
name: demo
steps:
  - id: a
    unit: /bin/sh
    starts_immediately: true
  - id: b
    unit: /bin/sh
    starts_immediately: true
  - id: c
    unit: /bin/sh
    wait_for: [a, b]
"#,
    );

    gantry()
        .current_dir(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("Execution waves"))
        .stdout(predicate::str::contains("1. a, b"))
        .stdout(predicate::str::contains("2. c"));
    Ok(())
}

#[test]
fn cli_init_writes_starter_pipeline() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    gantry()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    assert!(temp.path().join("gantry.yml").is_file());

    // The starter must validate and run.
    gantry()
        .current_dir(temp.path())
        .arg("validate")
        .assert()
        .success();
    Ok(())
}

#[test]
fn cli_init_refuses_overwrite() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_pipeline(SIMPLE_PIPELINE);
    gantry()
        .current_dir(temp.path())
        .arg("init")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("already exists"));
    Ok(())
}

#[test]
fn cli_schema_prints_json_schema() -> Result<(), Box<dyn std::error::Error>> {
    let output = gantry().arg("schema").output()?;

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert!(json.to_string().contains("wait_for"));
    Ok(())
}

#[test]
fn cli_explicit_config_flag() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let path = temp.path().join("ci.yml");
    fs::write(&path, SIMPLE_PIPELINE)?;

    gantry()
        .current_dir(temp.path())
        .args(["run", "--config", "ci.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline succeeded"));
    Ok(())
}
