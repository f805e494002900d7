//! CLI end-to-end tests
//!
//! Tests for the sampleflow command-line interface.

mod common;

use common::{h264_clip, unsupported_clip, write_fixture};
use predicates::prelude::*;
use std::fs;
use assert_cmd::Command;
use tempfile::tempdir;

/// Get a command for the sampleflow binary
#[allow(deprecated)]
fn sampleflow_cmd() -> Command {
    let mut cmd = Command::cargo_bin("sampleflow").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = sampleflow_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = sampleflow_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sampleflow"));
}

#[test]
fn test_cli_probe_text() {
    let dir = tempdir().unwrap();
    let clip = write_fixture(dir.path(), "clip.mp4", &h264_clip(2, true));

    let mut cmd = sampleflow_cmd();
    cmd.arg("probe")
        .arg(&clip)
        .assert()
        .success()
        .stdout(predicate::str::contains("Codec: avc1.42c01e"))
        .stdout(predicate::str::contains("Coded size: 320x240"))
        .stdout(predicate::str::contains("Duration: 2.000s"));
}

#[test]
fn test_cli_probe_json() {
    let dir = tempdir().unwrap();
    let clip = write_fixture(dir.path(), "clip.mp4", &h264_clip(1, false));

    let mut cmd = sampleflow_cmd();
    let output = cmd.args(["probe", "--json"]).arg(&clip).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["coded_width"], 320);
    assert_eq!(json["coded_height"], 240);
    assert_eq!(json["codec"], "avc1.42c01e");
    assert!(json["description"].as_str().unwrap().starts_with("0142c01e"));
}

#[test]
fn test_cli_probe_unsupported_codec_fails() {
    let dir = tempdir().unwrap();
    let clip = write_fixture(dir.path(), "clip.mp4", &unsupported_clip());

    let mut cmd = sampleflow_cmd();
    cmd.arg("probe")
        .arg(&clip)
        .assert()
        .failure()
        .stderr(predicate::str::contains("box not found"));
}

#[test]
fn test_cli_probe_missing_file() {
    let mut cmd = sampleflow_cmd();
    cmd.args(["probe", "/nonexistent/clip.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_run_to_output_file() {
    let dir = tempdir().unwrap();
    let clip = write_fixture(dir.path(), "clip.mp4", &h264_clip(1, true));
    let out = dir.path().join("chunks.jsonl");

    let mut cmd = sampleflow_cmd();
    cmd.arg("run")
        .arg(&clip)
        .args(["--preset", "hd", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Emitted 30 chunks (1 key"));

    let log = fs::read_to_string(&out).unwrap();
    let first: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(first["event"], "config");
    assert_eq!(first["target"]["width"], 1280);
    assert_eq!(log.lines().count(), 31);
}

#[test]
fn test_cli_run_to_stdout() {
    let dir = tempdir().unwrap();
    let clip = write_fixture(dir.path(), "clip.mp4", &h264_clip(1, true));

    let mut cmd = sampleflow_cmd();
    cmd.arg("run")
        .arg(&clip)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""event":"chunk""#))
        .stdout(predicate::str::contains(r#""type":"key""#));
}

#[test]
fn test_cli_run_unknown_preset() {
    let dir = tempdir().unwrap();
    let clip = write_fixture(dir.path(), "clip.mp4", &h264_clip(1, true));

    let mut cmd = sampleflow_cmd();
    cmd.arg("run")
        .arg(&clip)
        .args(["--preset", "imax"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown preset"));
}

#[test]
fn test_cli_worker_over_stdin() {
    let dir = tempdir().unwrap();
    let clip = write_fixture(dir.path(), "clip.mp4", &h264_clip(1, true));
    let request = serde_json::json!({
        "file": clip,
        "canvas": {"width": 320, "height": 240}
    });

    let mut cmd = sampleflow_cmd();
    cmd.arg("worker")
        .write_stdin(format!("{}\n", request))
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"status":"done","chunks":30}"#));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("sampleflow.toml");
    fs::write(
        &config_path,
        "[pipeline]\nsamples_per_batch = 64\n\n[encoder]\npreset = \"vga\"\n",
    )
    .unwrap();

    let mut cmd = sampleflow_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Samples per batch: 64"));
}

#[test]
fn test_cli_validate_invalid_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("bad.toml");
    fs::write(&config_path, "[pipeline]\nread_chunk_size = 0\n").unwrap();

    let mut cmd = sampleflow_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("read_chunk_size cannot be 0"));
}
