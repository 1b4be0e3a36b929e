//! Integration tests for the command-line interface.
//!
//! These tests run the compiled binary for the one-shot modes that exit on
//! their own (config checks, config output, probing) and for signal-driven
//! shutdown of the long-running agent.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

/// Helper to get the binary path
fn binary_path() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_herakles-metrics-agent"))
}

fn run(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(binary_path())
        .args(args)
        .env_remove("METRICS_AGENT_CONFIG")
        .output()
        .expect("Failed to execute command");
    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

#[test]
fn test_check_config_defaults() {
    let (ok, stdout, stderr) = run(&["--no-config", "--check-config"]);
    assert!(ok, "stdout: '{}', stderr: '{}'", stdout, stderr);
    assert!(stdout.contains("Configuration is valid"));
}

#[test]
fn test_check_config_rejects_zero_batch_size() {
    let (ok, stdout, stderr) = run(&["--no-config", "--batch-size", "0", "--check-config"]);
    assert!(!ok);
    assert!(
        stderr.contains("batch size must be between 1 and 255"),
        "Expected batch size error, got stdout: '{}', stderr: '{}'",
        stdout,
        stderr
    );
}

#[test]
fn test_check_config_file_with_zero_collector_interval() {
    let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
    writeln!(
        file,
        "collection:\n  collectors:\n    disk:\n      enabled: true\n      interval: 0s"
    )
    .unwrap();

    let path = file.path().to_string_lossy().into_owned();
    let (ok, _stdout, stderr) = run(&["--config", &path, "--check-config"]);
    assert!(!ok);
    assert!(stderr.contains("Disk collector interval must be positive"));
}

#[test]
fn test_show_config_applies_overrides() {
    let (ok, stdout, _stderr) = run(&[
        "--no-config",
        "--interval",
        "45s",
        "--enable",
        "memory",
        "--show-config",
        "--config-format",
        "json",
    ]);
    assert!(ok);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["collection"]["interval"], "45s");
    assert_eq!(value["collection"]["collectors"]["memory"]["enabled"], true);
    assert_eq!(value["collection"]["collectors"]["cpu"]["enabled"], false);
}

#[test]
fn test_config_subcommand_to_stdout() {
    let (ok, stdout, _stderr) = run(&["config", "--output", "-", "--format", "toml"]);
    assert!(ok);
    assert!(stdout.contains("batch_size = 100"));
    assert!(stdout.contains("[collection.collectors.disk]"));
}

#[test]
fn test_probe_memory_prints_json() {
    if !std::path::Path::new("/proc/meminfo").exists() {
        return;
    }

    let (ok, stdout, stderr) = run(&["--no-config", "--log-level", "off", "probe", "--collector", "memory"]);
    assert!(ok, "stderr: '{}'", stderr);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let points = value["memory"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[0]["type"], "memory.usage");
    assert_eq!(points[0]["value_type"], "int");
    assert_eq!(points[0]["labels"]["type"], "virtual");
}

#[cfg(unix)]
#[test]
fn test_sighup_shuts_agent_down_gracefully() {
    if !std::path::Path::new("/proc/meminfo").exists() {
        return;
    }

    let mut child = Command::new(binary_path())
        .args([
            "--no-config",
            "--enable",
            "memory",
            "--log-level",
            "info",
        ])
        .env_remove("METRICS_AGENT_CONFIG")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start agent");

    let mut stderr = BufReader::new(child.stderr.take().unwrap());
    let mut log = String::new();
    let mut line = String::new();
    while stderr.read_line(&mut line).unwrap() > 0 {
        log.push_str(&line);
        let ready = line.contains("herakles-metrics-agent running");
        line.clear();
        if ready {
            break;
        }
    }
    assert!(log.contains("herakles-metrics-agent running"), "log: '{}'", log);

    // handlers are installed right after the startup line
    std::thread::sleep(std::time::Duration::from_millis(300));
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGHUP) };
    assert_eq!(rc, 0);

    stderr.read_to_string(&mut log).unwrap();
    let status = child.wait().unwrap();
    assert!(status.success(), "status: {:?}, log: '{}'", status, log);
    assert!(log.contains("Received SIGHUP"));
    assert!(log.contains("stopped gracefully"));
}
