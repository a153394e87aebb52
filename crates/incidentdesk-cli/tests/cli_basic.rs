//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Every test
//! points `--config-file` at a temporary path so the user's config is never
//! touched.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(args: &[&str]) -> (i32, String, String) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "incidentdesk-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_with_config(config: &Path, args: &[&str]) -> (i32, String, String) {
    let path = config.to_str().unwrap();
    let mut full = vec!["--config-file", path];
    full.extend_from_slice(args);
    run_cli(&full)
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("every stdout line is JSON"))
        .collect()
}

#[test]
fn test_config_list_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_with_config(&dir.path().join("config.toml"), &["config", "list"]);
    assert_eq!(code, 0, "config list failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["level"]["duration_secs"], 300);
    assert_eq!(parsed["spawner"]["pacing"], "accelerating");
}

#[test]
fn test_config_set_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let (code, stdout, _) = run_with_config(&config, &["config", "set", "level.max_mistakes", "4"]);
    assert_eq!(code, 0, "config set failed");
    assert_eq!(stdout.trim(), "ok");

    let (code, stdout, _) = run_with_config(&config, &["config", "get", "level.max_mistakes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "4");
}

#[test]
fn test_config_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let (code, _, stderr) =
        run_with_config(&config, &["config", "set", "spawner.min_between_secs", "99"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error"));

    let (code, _, stderr) = run_with_config(&config, &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_config_reset() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    run_with_config(&config, &["config", "set", "timing.tick_ms", "100"]);

    let (code, _, _) = run_with_config(&config, &["config", "reset"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_with_config(&config, &["config", "get", "timing.tick_ms"]);
    assert_eq!(stdout.trim(), "250");
}

#[test]
fn test_simulate_reaches_an_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_with_config(
        &dir.path().join("config.toml"),
        &[
            "simulate",
            "--levels",
            "2",
            "--level-secs",
            "20",
            "--time-scale",
            "40",
            "--seed",
            "42",
            "--frame-ms",
            "10",
        ],
    );
    assert_eq!(code, 0, "simulate failed: {stderr}");

    let lines = json_lines(&stdout);
    let summary = lines.last().unwrap();
    assert_eq!(summary["type"], "Summary");
    assert_eq!(summary["seed"], 42);
    assert!(["victory", "game_over"].contains(&summary["status"].as_str().unwrap()));

    let kinds: Vec<&str> = lines.iter().filter_map(|l| l["type"].as_str()).collect();
    assert_eq!(kinds.first(), Some(&"LevelStarted"));
    assert!(kinds.contains(&"IncidentSpawned"));
}

#[test]
fn test_simulate_summary_only() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_with_config(
        &dir.path().join("config.toml"),
        &[
            "simulate",
            "--levels",
            "1",
            "--level-secs",
            "5",
            "--time-scale",
            "20",
            "--summary-only",
        ],
    );
    assert_eq!(code, 0);
    let lines = json_lines(&stdout);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["level"], 1);
}

#[test]
fn test_simulate_rejects_invalid_time_scale() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_with_config(
        &dir.path().join("config.toml"),
        &["simulate", "--time-scale", "0"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("timing.time_scale"));
}
