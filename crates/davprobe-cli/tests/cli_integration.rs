#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ENV_VARS: [&str; 6] = [
    "DAVPROBE_CONFIG",
    "DAVPROBE_URL",
    "DAVPROBE_ROOT",
    "DAVPROBE_PORT",
    "DAVPROBE_USER",
    "DAVPROBE_PASSWORD",
];

fn davprobe() -> Command {
    let mut cmd = Command::cargo_bin("davprobe").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run once, returning the exit code and the parsed stdout.
fn run_json(cmd: &mut Command) -> (Option<i32>, serde_json::Value) {
    let output = cmd.output().unwrap();
    let value = serde_json::from_slice(&output.stdout).unwrap();
    (output.status.code(), value)
}

// ============================================================================
// Basic CLI tests
// ============================================================================

#[test]
fn test_help() {
    davprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WebDAV conformance scenarios"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_version() {
    davprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("davprobe"));
}

#[test]
fn test_unknown_command() {
    davprobe().arg("frobnicate").assert().failure();
}

// ============================================================================
// list
// ============================================================================

#[test]
fn test_list_shows_scenarios() {
    davprobe()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("reference"))
        .stdout(predicate::str::contains("lock-exclusivity"))
        .stdout(predicate::str::contains("propfind-depth"));
}

#[test]
fn test_list_json() {
    let (code, value) = run_json(davprobe().args(["list", "--json"]));
    assert_eq!(code, Some(0));
    let entries = value.as_array().unwrap();

    assert_eq!(entries.len(), 8);
    assert_eq!(entries[0]["name"], "reference");
    assert!(entries[0]["steps"].as_u64().unwrap() > 10);
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_single_scenario_passes() {
    davprobe()
        .args(["run", "missing-resource"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("PASS"))
        .stdout(predicate::str::contains("1 passed, 0 failed"));
}

#[test]
fn test_run_reference_json() {
    let (code, value) = run_json(davprobe().args(["run", "reference", "--json"]));

    assert_eq!(code, Some(0));
    let report = &value.as_array().unwrap()[0];
    assert_eq!(report["scenario"], "reference");
    assert_eq!(report["passed"], true);
    assert_eq!(report["steps_run"], report["steps_total"]);
    assert!(report.get("failure").is_none());
}

#[test]
fn test_run_with_credentials() {
    davprobe()
        .args(["run", "reference", "--user", "tester", "--password", "tester"])
        .assert()
        .code(0);
}

#[test]
fn test_run_credentials_from_env() {
    davprobe()
        .args(["run", "put-semantics"])
        .env("DAVPROBE_USER", "tester")
        .env("DAVPROBE_PASSWORD", "tester")
        .assert()
        .code(0);
}

#[test]
fn test_run_keeps_configured_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");

    davprobe()
        .args(["run", "reference", "--root"])
        .arg(&root)
        .assert()
        .code(0);

    assert!(root.join("test").join("file2_moved.txt").is_file());
}

#[test]
fn test_run_unknown_scenario_is_harness_error() {
    davprobe()
        .args(["run", "no-such-scenario"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown scenario 'no-such-scenario'"));
}

#[test]
fn test_run_unreachable_server_fails_scenario() {
    // Grab a free port, then release it so nothing listens there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let mut cmd = davprobe();
    cmd.args(["run", "missing-resource", "--json", "--url"])
        .arg(format!("http://127.0.0.1:{port}"));
    let (code, value) = run_json(&mut cmd);

    assert_eq!(code, Some(1));
    let report = &value.as_array().unwrap()[0];
    assert_eq!(report["passed"], false);
    assert_eq!(report["failure"]["step"], 0);
}

#[test]
fn test_run_port_in_use_is_harness_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    davprobe()
        .args(["run", "missing-resource", "--port", &port.to_string()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("could not run"));
}

#[test]
fn test_run_invalid_config_is_harness_error() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("davprobe.toml");
    std::fs::write(&config, "request_timeout = 5\n").unwrap();

    davprobe()
        .args(["run", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_run_config_file_credentials() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("davprobe.toml");
    std::fs::write(
        &config,
        "[server]\ngrace_period = \"1s\"\n\n[server.credentials]\nusername = \"tester\"\npassword = \"tester\"\n",
    )
    .unwrap();

    davprobe()
        .args(["run", "missing-resource", "--config"])
        .arg(&config)
        .assert()
        .code(0);
}

#[test]
fn test_url_conflicts_with_port() {
    davprobe()
        .args(["run", "--url", "http://127.0.0.1:1", "--port", "8080"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
