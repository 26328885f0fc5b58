//! Integration tests for the emane-lab command-line interface

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const TOPOLOGY: &str = r#"
nodes:
  core:
    - name: node-1
      neighbors: [node-2]
      is_border: false
    - name: node-2
      neighbors: [node-3]
      is_border: true
      as_number: 65002
  edge:
    - name: node-3
      neighbors: []
      is_border: false
"#;

/// Helper function to create a command instance for the emane-lab binary
fn cli_command() -> Command {
    Command::cargo_bin("emane-lab").expect("Failed to find emane-lab binary")
}

/// Topology plus an experiment config in a temporary directory
fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("topology.yaml"), TOPOLOGY).unwrap();

    let config = format!(
        r#"
topology_file: {topology}
output_dir: {output}
seed: 42
experiment:
  enabled: true
  duration: 3
  link_update: {{ single: {{ interval: [1.0] }} }}
  traffic:
    arrival: {{ single: {{ interval: [1.0] }} }}
    bandwidth: {{ single: {{ elements: {{ interval: [600] }} }} }}
    flow_size: {{ single: {{ interval: [100] }} }}
"#,
        topology = dir.path().join("topology.yaml").display(),
        output = dir.path().join("out").display(),
    );
    fs::write(dir.path().join("lab.yaml"), config).unwrap();
    dir
}

fn config_arg(dir: &Path) -> String {
    dir.join("lab.yaml").display().to_string()
}

#[test]
fn test_cli_help() {
    let mut cmd = cli_command();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("topology"))
        .stdout(predicate::str::contains("scenario"))
        .stdout(predicate::str::contains("traffic"))
        .stdout(predicate::str::contains("events"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_cli_invalid_command() {
    let mut cmd = cli_command();
    cmd.arg("invalid-command");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_topology_table() {
    let dir = fixture();
    let mut cmd = cli_command();
    cmd.args(["--config", config_arg(dir.path()).as_str(), "topology"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("node-2"))
        .stdout(predicate::str::contains("65002"))
        .stdout(predicate::str::contains("10.100.0.3"))
        .stdout(predicate::str::contains("1.1.1.1/24"))
        .stdout(predicate::str::contains("(border)"));
}

#[test]
fn test_topology_json() {
    let dir = fixture();
    let output = cli_command()
        .args(["--config", config_arg(dir.path()).as_str(), "topology", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(graph["links"].as_array().unwrap().len(), 2);
    assert_eq!(graph["nodes"]["node-3"]["index"], 2);
    assert_eq!(graph["nodes"]["node-3"]["domain"], "edge");
}

#[test]
fn test_topology_file_override() {
    let dir = fixture();
    let other = dir.path().join("pair.json");
    fs::write(
        &other,
        r#"{"nodes": {"lab": [{"name": "a", "neighbors": ["b"], "is_border": false},
                               {"name": "b", "neighbors": [], "is_border": false}]}}"#,
    )
    .unwrap();

    let mut cmd = cli_command();
    cmd.args([
        "--config",
        config_arg(dir.path()).as_str(),
        "-t",
        other.to_str().unwrap(),
        "scenario",
    ]);

    cmd.assert()
        .success()
        .stdout("0.0 nem:1 pathloss nem:2,0\n0.0 nem:2 pathloss nem:1,0\n");
}

#[test]
fn test_scenario_blocks_non_adjacent_pairs() {
    let dir = fixture();
    let mut cmd = cli_command();
    cmd.args(["--config", config_arg(dir.path()).as_str(), "scenario"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("0.0 nem:1 pathloss nem:2,0 nem:3,200"));
}

#[test]
fn test_traffic_writes_schedules() {
    let dir = fixture();
    let mut cmd = cli_command();
    cmd.args(["--config", config_arg(dir.path()).as_str(), "traffic"]);
    cmd.assert().success().stdout(predicate::str::contains("Wrote 6 flows"));

    let sink = fs::read_to_string(dir.path().join("out/node-2/mgen.in")).unwrap();
    assert_eq!(sink, "0.00 LISTEN UDP 5001\n6.00 IGNORE UDP 5001\n");

    let source = fs::read_to_string(dir.path().join("out/node-1/mgen.in")).unwrap();
    assert_eq!(source.lines().count(), 6);
    assert!(source.starts_with("1.00 ON 1 UDP SRC 5001 DST 10.100.0.2/5001 PERIODIC [128 600]\n"));
}

#[test]
fn test_seeded_traffic_is_reproducible() {
    let dir = fixture();
    let mut first = String::new();
    for run in 0..2 {
        cli_command()
            .args(["--config", config_arg(dir.path()).as_str(), "traffic"])
            .assert()
            .success();
        let source = fs::read_to_string(dir.path().join("out/node-3/mgen.in")).unwrap();
        if run == 0 {
            first = source;
        } else {
            assert_eq!(first, source);
        }
    }
}

#[test]
fn test_events_dry_run() {
    let dir = fixture();
    let mut cmd = cli_command();
    cmd.args([
        "--config",
        config_arg(dir.path()).as_str(),
        "--duration",
        "2.5",
        "events",
        "--dry-run",
    ]);
    cmd.timeout(Duration::from_secs(30));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Link events completed: 1 epochs, 2 updates"))
        .stderr(predicate::str::contains("[dry-run]"));
}

#[test]
fn test_disabled_experiment() {
    let dir = fixture();
    let config = fs::read_to_string(dir.path().join("lab.yaml")).unwrap();
    fs::write(
        dir.path().join("lab.yaml"),
        config.replace("enabled: true", "enabled: false"),
    )
    .unwrap();

    let mut cmd = cli_command();
    cmd.args(["--config", config_arg(dir.path()).as_str(), "run", "--dry-run"]);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Experiment is disabled"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_bad_topology_fails() {
    let dir = fixture();
    fs::write(
        dir.path().join("topology.yaml"),
        "nodes:\n  core:\n    - name: a\n      neighbors: [ghost]\n      is_border: false\n",
    )
    .unwrap();

    let mut cmd = cli_command();
    cmd.args(["--config", config_arg(dir.path()).as_str(), "topology"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = cli_command();
    cmd.args([
        "--config",
        dir.path().join("absent.yaml").to_str().unwrap(),
        "scenario",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}
