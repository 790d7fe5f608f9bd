//! End-to-end CLI integration tests
//!
//! These tests invoke the compiled binary as a subprocess to verify
//! that the CLI behaves correctly from a user's perspective. Nothing
//! here touches the network: remote endpoints point at a closed local
//! port.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CLOSED_PORT: &str = "http://127.0.0.1:9";

/// Returns a Command configured to run our binary, isolated from the
/// user's config and log directories.
#[allow(deprecated)]
fn cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("SHIPGATE_LOG_DIR", home.path().join("logs"))
        .env_remove("RUST_LOG");
    cmd
}

/// A project with a manifest and a config whose remotes are unreachable.
fn offline_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("Cargo.toml"),
        "[package]\nname = \"kojamp\"\nversion = \"1.2.3\"\n",
    )
    .unwrap();
    fs::write(
        tmp.path().join(".shipgate.toml"),
        format!(
            r#"
[remote]
api_url = "{CLOSED_PORT}"
repository = "octo/kojamp"

[registry]
index_url = "{CLOSED_PORT}/index"

[container]
api_url = "{CLOSED_PORT}/hub"
engine = "shipgate-test-no-such-engine"
"#
        ),
    )
    .unwrap();
    tmp
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("Options:"));
}

#[test]
fn help_lists_every_subcommand() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("doctor"));
}

#[test]
fn long_help_lists_environment() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SHIPGATE_LOG_DIR"));
}

#[test]
fn version_flag_shows_version() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn publish_help_shows_flags() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["publish", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn unknown_subcommand_fails() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("ship-it")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// =============================================================================
// Doctor Command
// =============================================================================

#[test]
fn doctor_succeeds() {
    let home = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    cmd(&home)
        .args(["-C", tmp.path().to_str().unwrap(), "doctor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration"))
        .stdout(predicate::str::contains("Tools"));
}

#[test]
fn doctor_json_outputs_valid_json() {
    let home = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    let output = cmd(&home)
        .args(["-C", tmp.path().to_str().unwrap(), "--json", "doctor"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("doctor --json should output valid JSON");

    assert_eq!(json["config"]["found"], false);
    assert_eq!(json["tools"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["config"]["effective"]["container"]["engine"], "docker");
}

// =============================================================================
// Release Commands
// =============================================================================

#[test]
fn status_without_manifest_names_missing_package() {
    let home = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    cmd(&home)
        .args(["-C", tmp.path().to_str().unwrap(), "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("package.name"));
}

#[test]
fn check_without_repository_names_missing_key() {
    let home = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("Cargo.toml"),
        "[package]\nname = \"kojamp\"\nversion = \"1.2.3\"\n",
    )
    .unwrap();

    cmd(&home)
        .args(["-C", tmp.path().to_str().unwrap(), "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote.repository"));
}

#[test]
fn status_json_reports_every_source() {
    let home = TempDir::new().unwrap();
    let project = offline_project();
    let output = cmd(&home)
        .args(["-C", project.path().to_str().unwrap(), "--json", "status"])
        .assert()
        .failure();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("status --json should output valid JSON");

    assert_eq!(json["package"], "kojamp");
    assert_eq!(json["repository"], "octo/kojamp");
    assert_eq!(json["image"], "octo/kojamp");

    let sources = json["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 5);
    assert_eq!(sources[0]["kind"], "manifest");
    assert_eq!(sources[0]["version"], "1.2.3");
    assert!(sources[2]["error"].is_string());
}

#[test]
fn check_explains_failed_sources() {
    let home = TempDir::new().unwrap();
    let project = offline_project();
    cmd(&home)
        .args(["-C", project.path().to_str().unwrap(), "--color", "never", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("1.2.3"))
        .stdout(predicate::str::contains("source(s) failed"))
        .stderr(predicate::str::contains("version source(s) failed"));
}

#[test]
fn publish_does_nothing_when_sources_fail() {
    let home = TempDir::new().unwrap();
    let project = offline_project();
    cmd(&home)
        .args([
            "-C",
            project.path().to_str().unwrap(),
            "--color",
            "never",
            "publish",
            "--yes",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Published").not());
}

// =============================================================================
// Global Flags
// =============================================================================

#[test]
fn quiet_and_verbose_flags_accepted() {
    let home = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    cmd(&home)
        .args(["-q", "-C", tmp.path().to_str().unwrap(), "doctor"])
        .assert()
        .success();
    cmd(&home)
        .args(["-vv", "-C", tmp.path().to_str().unwrap(), "doctor"])
        .assert()
        .success();
}

#[test]
fn chdir_to_missing_directory_fails() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["-C", "/nonexistent/shipgate/dir", "doctor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to change directory"));
}

#[test]
fn writes_log_file_to_configured_dir() {
    let home = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    cmd(&home)
        .args(["-C", tmp.path().to_str().unwrap(), "doctor"])
        .assert()
        .success();

    let logs = home.path().join("logs");
    let entries: Vec<_> = fs::read_dir(&logs).unwrap().collect();
    assert!(!entries.is_empty(), "expected a log file in {}", logs.display());
}
