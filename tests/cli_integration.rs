#[cfg(unix)]
use std::io::{BufRead, BufReader};
#[cfg(unix)]
use std::process::{Command as StdCommand, Stdio};
#[cfg(unix)]
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;

mod common;

fn mock_cmd() -> Command {
    Command::cargo_bin("openapi-mock-server").unwrap()
}

#[test]
fn missing_spec_is_rejected() {
    mock_cmd()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: OpenAPI specification file is required",
        ));
}

#[test]
fn empty_spec_is_rejected() {
    mock_cmd()
        .args(["--spec", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "OpenAPI specification file is required",
        ));
}

#[test]
fn nonexistent_spec_names_the_path() {
    mock_cmd()
        .args(["-f", "does/not/exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "OpenAPI specification file not found: does/not/exist.yaml",
        ));
}

#[test]
fn invalid_document_is_an_engine_error() {
    let dir = tempfile::tempdir().unwrap();
    let spec = dir.path().join("broken.yaml");
    std::fs::write(&spec, "hello: world\n").unwrap();
    mock_cmd()
        .args(["--spec", spec.to_str().unwrap(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load OpenAPI spec"));
}

#[test]
fn port_in_use_is_a_startup_error() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();
    let spec = common::petstore_path();
    mock_cmd()
        .args([
            "--spec",
            spec.to_str().unwrap(),
            "--host",
            "127.0.0.1",
            "--port",
            &port,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to bind"));
}

#[test]
fn help_lists_flags() {
    mock_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--spec"))
        .stdout(predicate::str::contains("--base-path"))
        .stdout(predicate::str::contains("base-url"))
        .stdout(predicate::str::contains("[default: 8080]"));
}

#[cfg(unix)]
extern "C" {
    fn kill(pid: i32, sig: i32) -> i32;
}

/// SIGTERM after startup shuts the server down and exits 0.
#[cfg(unix)]
#[test]
fn terminate_signal_exits_cleanly() {
    let spec = common::petstore_path();
    let mut child = StdCommand::new(env!("CARGO_BIN_EXE_openapi-mock-server"))
        .args([
            "--spec",
            spec.to_str().unwrap(),
            "--host",
            "127.0.0.1",
            "--port",
            "0",
            "--base-url",
            "api",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let mut lines = BufReader::new(child.stdout.take().unwrap()).lines();
    let first = lines.next().unwrap().unwrap();
    assert!(first.starts_with("Mock server started at http://127.0.0.1:"));
    assert!(first.ends_with("/api"));
    assert!(lines.next().unwrap().unwrap().starts_with("OpenAPI spec: "));
    assert_eq!(lines.next().unwrap().unwrap(), "Press Ctrl+C to stop the server");

    let rc = unsafe { kill(child.id() as i32, 15) };
    assert_eq!(rc, 0);

    let rest: Vec<String> = lines.map_while(Result::ok).collect();
    assert!(rest.iter().any(|l| l == "Shutting down server..."));

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        assert!(std::time::Instant::now() < deadline, "server did not exit");
        std::thread::sleep(Duration::from_millis(50));
    };
    assert!(status.success());
}
