//! CLI integration tests for the Luna command-line interface.
//!
//! These cover help text, argument parsing and the offline `config`
//! commands. Nothing here reaches a workspace.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = r#"
[workspace]
resource_id = "/subscriptions/sub-123/resourceGroups/ml-rg/providers/Microsoft.MachineLearningServices/workspaces/prod-ws"
tenant_id = "tenant-abc"
application_id = "app-xyz"
secret_name = "aml-sp-secret"
region = "westeurope"

[experiment]
name = "nightly"

[secrets]
aml-sp-secret = "super-secret-value"
"#;

/// Get a command for the luna binary with an isolated config directory.
fn luna(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("luna").unwrap();
    cmd.env("LUNA_CONFIG_DIR", config_dir)
        .env_remove("LUNA_CONFIG")
        .env_remove("LUNA_USER_ID")
        .env_remove("LUNA_SUBSCRIPTION_ID");
    cmd
}

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("workspace.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    luna(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Azure Machine Learning"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    luna(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("luna"));
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    luna(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("output"))
        .stdout(predicate::str::contains("outputs"))
        .stdout(predicate::str::contains("delete-output"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_submit_help_lists_options() {
    let dir = TempDir::new().unwrap();
    luna(dir.path())
        .args(["submit", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--product"))
        .stdout(predicate::str::contains("--deployment"))
        .stdout(predicate::str::contains("--api-version"))
        .stdout(predicate::str::contains("--predecessor"))
        .stdout(predicate::str::contains("--user"))
        .stdout(predicate::str::contains("--subscription"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument Parsing Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_no_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    luna(dir.path()).assert().failure();
}

#[test]
fn test_status_requires_operation_id() {
    let dir = TempDir::new().unwrap();
    luna(dir.path())
        .args(["status", "train", "--user", "u", "--subscription", "s"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPERATION_ID"));
}

#[test]
fn test_list_requires_owner() {
    let dir = TempDir::new().unwrap();
    luna(dir.path())
        .args(["list", "train"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--user"));
}

#[test]
fn test_submit_rejects_both_inputs() {
    let dir = TempDir::new().unwrap();
    luna(dir.path())
        .args([
            "submit",
            "train",
            "--product",
            "p",
            "--deployment",
            "d",
            "--api-version",
            "v1",
            "--input",
            "{}",
            "--input-file",
            "input.json",
            "--user",
            "u",
            "--subscription",
            "s",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    luna(dir.path())
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_redacts_secrets() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CONFIG);

    luna(dir.path())
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("prod-ws"))
        .stdout(predicate::str::contains("nightly"))
        .stdout(predicate::str::contains("https://westeurope.api.azureml.ms/"))
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains("super-secret-value").not());
}

#[test]
fn test_config_show_json() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CONFIG);

    let output = luna(dir.path())
        .args(["--json", "config", "show", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["workspace"]["tenant_id"], "tenant-abc");
    assert_eq!(json["experiment"]["name"], "nightly");
    assert_eq!(json["experiment"]["run_type"], "azureml.PipelineRun");
    assert_eq!(json["secrets"]["aml-sp-secret"], "<redacted>");
}

#[test]
fn test_config_show_defaults_without_files() {
    let dir = TempDir::new().unwrap();

    luna(dir.path())
        .current_dir(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No workspace configured"))
        .stdout(predicate::str::contains("myexperiment"));
}

#[test]
fn test_config_discovers_user_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), CONFIG).unwrap();

    luna(dir.path())
        .current_dir(dir.path())
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ loaded"))
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_path_uses_config_dir() {
    let dir = TempDir::new().unwrap();

    luna(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();

    luna(dir.path())
        .args(["config", "show", "--config"])
        .arg(dir.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.toml"));
}

#[test]
fn test_status_without_workspace_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[experiment]\nname = \"x\"\n");

    luna(dir.path())
        .args(["status", "train", "a1", "--user", "u", "--subscription", "s", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no workspace configured"));
}
