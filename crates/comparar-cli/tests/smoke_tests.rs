//! Smoke tests for comparador CLI
//!
//! These tests verify the binary parses its commands and runs the
//! browser-free paths end to end.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use comparar::{encode_png, Capture};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command for the comparador binary
fn comparador() -> Command {
    let mut cmd = Command::cargo_bin("comparador").expect("comparador binary should exist");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_png(path: &Path, img: &Capture) {
    fs::write(path, encode_png(img).unwrap()).unwrap();
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    comparador()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    comparador()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("visual regression"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("diff"));
}

#[test]
fn test_no_args_shows_help() {
    comparador().assert().failure();
}

#[test]
fn test_run_subcommand_help() {
    comparador()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--production-origin"))
        .stdout(predicate::str::contains("--degraded-is-failure"));
}

// ============================================================================
// Init / Config / Clean
// ============================================================================

#[test]
fn test_init_writes_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("comparar.yaml");

    comparador()
        .args(["init", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("routes"));
    assert!(content.contains("threshold"));
}

#[test]
fn test_init_refuses_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("comparar.yaml");
    fs::write(&path, "routes: [\"/\"]\n").unwrap();

    comparador()
        .args(["init", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_config_reads_working_directory_file() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("comparar.yaml"),
        "routes: [\"/pricing\"]\nthreshold: 0.02\n",
    )
    .unwrap();

    comparador()
        .current_dir(temp.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("/pricing"))
        .stdout(predicate::str::contains("0.02"));
}

#[test]
fn test_config_json() {
    let temp = TempDir::new().unwrap();
    comparador()
        .current_dir(temp.path())
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"production_origin\""));
}

#[test]
fn test_config_missing_file_fails() {
    comparador()
        .args(["config", "--config", "/nonexistent/comparar.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_clean_removes_diffs() {
    let temp = TempDir::new().unwrap();
    let diff_dir = temp.path().join("tests/__diff__");
    fs::create_dir_all(&diff_dir).unwrap();
    fs::write(diff_dir.join("home_mobile_chromium_diff.png"), b"x").unwrap();
    fs::write(diff_dir.join("report.html"), b"<html>").unwrap();

    comparador()
        .current_dir(temp.path())
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1"));

    assert!(!diff_dir.join("home_mobile_chromium_diff.png").exists());
    assert!(diff_dir.join("report.html").exists());
}

// ============================================================================
// Diff
// ============================================================================

#[test]
fn test_diff_identical_images_succeeds() {
    let temp = TempDir::new().unwrap();
    let img = Capture::filled(16, 16, [240, 240, 240, 255]);
    let (a, b) = (temp.path().join("a.png"), temp.path().join("b.png"));
    write_png(&a, &img);
    write_png(&b, &img);

    comparador()
        .args(["--color", "never", "diff"])
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stderr(predicate::str::contains("0.00% different"));
}

#[test]
fn test_diff_changed_images_fails_and_writes_output() {
    let temp = TempDir::new().unwrap();
    let (a, b) = (temp.path().join("a.png"), temp.path().join("b.png"));
    let out = temp.path().join("diff.png");
    write_png(&a, &Capture::filled(16, 16, [255, 255, 255, 255]));
    write_png(&b, &Capture::filled(16, 16, [0, 0, 0, 255]));

    comparador()
        .args(["--color", "never", "diff"])
        .arg(&a)
        .arg(&b)
        .arg("--output")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("FAIL"));

    assert!(out.exists());
}

#[test]
fn test_diff_size_mismatch_reports_error() {
    let temp = TempDir::new().unwrap();
    let (a, b) = (temp.path().join("a.png"), temp.path().join("b.png"));
    write_png(&a, &Capture::filled(16, 16, [0, 0, 0, 255]));
    write_png(&b, &Capture::filled(8, 16, [0, 0, 0, 255]));

    comparador()
        .arg("diff")
        .arg(&a)
        .arg(&b)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Image dimensions differ"));
}

// ============================================================================
// Run argument validation (no browser needed)
// ============================================================================

#[test]
fn test_run_rejects_invalid_threshold() {
    let temp = TempDir::new().unwrap();
    comparador()
        .current_dir(temp.path())
        .args(["run", "--threshold", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("threshold"));
}

#[test]
fn test_run_rejects_bad_viewport() {
    comparador()
        .args(["run", "--viewport", "huge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("name=WIDTHxHEIGHT"));
}
