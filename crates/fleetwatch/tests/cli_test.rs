//! Integration tests for the `fleetwatch` CLI binary.
//!
//! Argument parsing, help output, completions and config handling run
//! without a server; snapshot commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `fleetwatch` binary with env isolation.
///
/// Clears all `FLEETWATCH_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn fleetwatch_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fleetwatch");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("FLEETWATCH_PROFILE")
        .env_remove("FLEETWATCH_SERVER")
        .env_remove("FLEETWATCH_TOKEN")
        .env_remove("FLEETWATCH_OUTPUT")
        .env_remove("FLEETWATCH_INSECURE")
        .env_remove("FLEETWATCH_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// A server with three devices: two online, one offline, one moving.
async fn fleet_server(token: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/session"))
        .and(query_param("token", token))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "JSESSIONID=cli; Path=/")
                .set_body_json(json!({"id": 1, "name": "dispatch"})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(10)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Van", "uniqueId": "100", "status": "online", "category": "van"},
            {"id": 2, "name": "Truck", "uniqueId": "200", "status": "online", "category": "truck"},
            {"id": 3, "name": "Bike", "uniqueId": "300", "status": "offline",
             "lastUpdate": "2024-05-01T10:00:00Z", "category": "bicycle"},
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/positions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 11, "deviceId": 1, "deviceTime": "2024-05-01T10:00:00Z",
             "fixTime": "2024-05-01T10:00:00Z", "latitude": 52.5, "longitude": 13.4,
             "speed": 21.0, "course": 90.0},
            {"id": 12, "deviceId": 2, "deviceTime": "2024-05-01T10:00:00Z",
             "fixTime": "2024-05-01T10:00:00Z", "latitude": 48.1, "longitude": 11.6,
             "speed": 0.0, "course": 0.0},
        ])))
        .mount(&server)
        .await;

    server
}

/// Run a blocking `assert_cmd` invocation off the async runtime.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = fleetwatch_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("devices")
                .and(predicate::str::contains("watch"))
                .and(predicate::str::contains("stats")),
        );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetwatch"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let home = tempfile::tempdir().unwrap();
    let output = fleetwatch_cmd(home.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_status_filter() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .args(["devices", "--status", "sleeping"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_devices_without_server() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .arg("devices")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("No server configured"));
}

#[test]
fn test_devices_without_token() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .args(["devices", "--server", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("No session token"));
}

#[test]
fn test_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .args(["stats", "--profile", "nowhere"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("nowhere"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_under_config_home() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_show() {
    let home = tempfile::tempdir().unwrap();

    fleetwatch_cmd(home.path())
        .args([
            "config",
            "init",
            "--server",
            "https://track.example.com",
            "--name",
            "depot",
            "--token-env",
            "DEPOT_TOKEN",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("depot"));

    fleetwatch_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("https://track.example.com")
                .and(predicate::str::contains("DEPOT_TOKEN"))
                .and(predicate::str::contains("default_profile = \"depot\"")),
        );

    // a second init of the same profile needs --force
    fleetwatch_cmd(home.path())
        .args(["config", "init", "--server", "https://other.example.com", "--name", "depot"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_config_init_rejects_bad_url() {
    let home = tempfile::tempdir().unwrap();
    fleetwatch_cmd(home.path())
        .args(["config", "init", "--server", "not a url"])
        .assert()
        .failure()
        .code(2);
}

// ── Snapshot commands against a server ──────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_plain_sorted_and_filtered() {
    let server = fleet_server("t0k").await;
    let home = tempfile::tempdir().unwrap();

    let mut cmd = fleetwatch_cmd(home.path());
    cmd.args(["devices", "--server", &server.uri(), "--token", "t0k", "-o", "plain"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "3\n2\n1\n");

    let mut cmd = fleetwatch_cmd(home.path());
    cmd.args([
        "devices",
        "--server",
        &server.uri(),
        "--token",
        "t0k",
        "-o",
        "plain",
        "--hide-offline",
        "--sort",
        "unique-id",
    ]);
    let output = run(cmd).await;
    assert_eq!(String::from_utf8_lossy(&output.stdout), "1\n2\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_json_includes_positions() {
    let server = fleet_server("t0k").await;
    let home = tempfile::tempdir().unwrap();

    let mut cmd = fleetwatch_cmd(home.path());
    cmd.args([
        "devices",
        "--server",
        &server.uri(),
        "--token",
        "t0k",
        "-o",
        "json",
        "--search",
        "TRU",
    ]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Truck");
    assert_eq!(rows[0]["position"]["latitude"], 48.1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_table() {
    let server = fleet_server("t0k").await;
    let home = tempfile::tempdir().unwrap();

    let mut cmd = fleetwatch_cmd(home.path());
    cmd.args(["devices", "--server", &server.uri(), "--token", "t0k"]);
    let output = run(cmd).await;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(stdout.contains("Truck"));
    assert!(stdout.contains("21 kn"));
    assert!(stdout.contains("bicycle"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stats_json() {
    let server = fleet_server("t0k").await;
    let home = tempfile::tempdir().unwrap();

    let mut cmd = fleetwatch_cmd(home.path());
    cmd.args(["stats", "--server", &server.uri(), "--token", "t0k", "-o", "json-compact"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        stats,
        json!({"total": 3, "online": 2, "offline": 1, "moving": 1})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_token_exits_with_auth_code() {
    let server = fleet_server("t0k").await;
    let home = tempfile::tempdir().unwrap();

    let mut cmd = fleetwatch_cmd(home.path());
    cmd.args(["stats", "--server", &server.uri(), "--token", "wrong"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}
