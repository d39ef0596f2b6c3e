//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, each subcommand
//! responds to `--help`, and bad input fails before any model is loaded.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `poseflow` binary with a clean environment.
fn poseflow() -> Command {
    let mut cmd = Command::cargo_bin("poseflow").expect("binary 'poseflow' should be built");
    for var in [
        "POSEFLOW_BIND",
        "POSEFLOW_MODEL_PATH",
        "R2_ENDPOINT_URL",
        "R2_ACCESS_KEY_ID",
        "R2_SECRET_ACCESS_KEY",
        "R2_BUCKET_NAME",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    poseflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: poseflow"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn version_flag_shows_semver() {
    poseflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^poseflow \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    poseflow()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: poseflow"));
}

#[test]
fn invalid_subcommand_fails() {
    poseflow()
        .arg("this-is-not-a-real-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn serve_help() {
    poseflow()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Run the HTTP API server"))
        .stdout(predicate::str::contains("--bind"));
}

#[test]
fn process_help() {
    poseflow()
        .args(["process", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Render pose overlays"))
        .stdout(predicate::str::contains("<INPUT>"))
        .stdout(predicate::str::contains("<OUTPUT>"))
        .stdout(predicate::str::contains("--score-threshold"));
}

#[test]
fn check_help() {
    poseflow()
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"));
}

// ─── Argument validation ─────────────────────────────────────────────────────

#[test]
fn process_missing_args_fails() {
    poseflow()
        .arg("process")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<INPUT>"));
}

#[test]
fn process_missing_input_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "").unwrap();

    poseflow()
        .arg("--config")
        .arg(&config)
        .arg("process")
        .arg(dir.path().join("missing.mp4"))
        .arg(dir.path().join("out.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("input file not found"));
}

#[test]
fn process_rejects_bad_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "").unwrap();
    let input = dir.path().join("in.mp4");
    std::fs::write(&input, b"not really a video").unwrap();

    poseflow()
        .arg("--config")
        .arg(&config)
        .args(["process", "-t", "2.0"])
        .arg(&input)
        .arg(dir.path().join("out.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0.0 and 1.0"));
}

#[test]
fn missing_config_file_fails() {
    poseflow()
        .args(["--config", "/nonexistent/poseflow.toml", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[model]\nscore_threshold = 7.0\n").unwrap();

    poseflow()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid [model] section"));
}
