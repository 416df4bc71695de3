use std::io::Write;
use std::process::{Command, Output, Stdio};

use super::sample_ulog;

/// Run the binary with an isolated (absent) config file.
fn ulog_trace(args: &[&str], config_dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ulog-trace"));
    cmd.args(args)
        .env("ULOG_TRACE_CONFIG_PATH", config_dir.path().join("config.toml"))
        .env("NO_COLOR", "1")
        .env_remove("ULOGPFX")
        .env_remove("APPDIR")
        .env_remove("RUST_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    let config_dir = tempfile::tempdir().unwrap();
    ulog_trace(args, &config_dir).output().unwrap()
}

#[test]
fn test_timing_table_from_file() {
    let sample = sample_ulog();
    let output = run(&["timing", sample.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");

    insta::assert_snapshot!(String::from_utf8_lossy(&output.stdout), @r"
    Service                     Count  Errors   Total(s)
    -------------------------- ------  ------  ---------
    ORDER                           2       1      0.900
        tpcall(PRICE)               2              0.630
        tpacall(AUDIT)              1              0.005
    PRICE                           2       0      0.595
    AUDIT                           1       0      0.080
    -------------------------- ------  ------  ---------
    TOTAL                           5       1      1.575
    ");
}

#[test]
fn test_timing_from_stdin() {
    let config_dir = tempfile::tempdir().unwrap();
    let mut child = ulog_trace(&["timing", "-"], &config_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let sample = std::fs::read(sample_ulog()).unwrap();
    child.stdin.take().unwrap().write_all(&sample).unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tpcall(PRICE)"), "{stdout}");
    assert!(stdout.contains("TOTAL"), "{stdout}");
}

#[test]
fn test_timing_json() {
    let sample = sample_ulog();
    let output = run(&["timing", "--json", sample.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let services: Vec<&str> = json["services"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["service"].as_str().unwrap())
        .collect();
    assert_eq!(services, ["svc:AUDIT", "svc:ORDER", "svc:PRICE", "proc:ordcl"]);
    assert_eq!(json["services"][1]["errors"], 1);
}

#[test]
fn test_timing_missing_file_fails() {
    let output = run(&["timing", "/nonexistent/path/to/ULOG.010124"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to open"), "{stderr}");
}

#[test]
fn test_timing_without_traces_fails() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ULOG.010124");
    std::fs::write(&log, "100000.000.host!srv.1: LIBTUX_CAT:262: INFO: Standard main starting\n")
        .unwrap();

    let output = run(&["timing", log.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No completed service calls"), "{stderr}");
}

#[test]
fn test_graph_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("calls.dot");
    let sample = sample_ulog();
    let output = run(&[
        "graph",
        sample.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());

    let dot = std::fs::read_to_string(&out).unwrap();
    assert!(dot.starts_with("digraph tmtrace {\n"));
    assert!(dot.contains("\"proc_ordcl\" -> \"svc_ORDER\";"));
    assert!(dot.contains("\"svc_ORDER\" -> \"svc_AUDIT\" [style=dashed];"));
}

#[test]
fn test_follow_missing_directory_stops() {
    let output = run(&["follow", "--prefix", "/nonexistent/ulog-trace/ULOG"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("can no longer be read"), "{stderr}");
}

#[test]
fn test_follow_without_prefix_hints() {
    let output = run(&["follow"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no ULOG prefix configured"), "{stderr}");
    assert!(stderr.contains("--prefix"), "{stderr}");
}

#[test]
fn test_explicit_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let output = run(&[
        "--config",
        missing.to_str().unwrap(),
        "follow",
        "--prefix",
        "/nonexistent/ulog-trace/ULOG",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read config file"), "{stderr}");
}
