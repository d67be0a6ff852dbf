use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn write_fixture() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let truck = r#"{
  "name": "truck",
  "children": [
    { "name": "Body", "materials": ["Paint"] },
    { "name": "Cabin", "materials": ["Glass", "Paint"] }
  ]
}"#;
    let config = r##"{
  "camera": { "fov": 50, "position": [0, 2, 8] },
  "objects": [
    { "name": "Truck", "path": "truck.json" },
    { "name": "Ghost", "path": "missing.json" }
  ],
  "features": {
    "Wireframe": { "enabled": true, "color": "#ff0000" },
    "Skybox": { "enabled": true },
    "CameraRotation": { "enabled": false }
  }
}"##;
    fs::write(dir.path().join("truck.json"), truck).expect("write truck");
    fs::write(dir.path().join("viewer.json"), config).expect("write config");
    dir
}

#[test]
fn cli_loads_config_and_prints_summary() {
    let fixture = write_fixture();
    let mut cmd = Command::cargo_bin("viewer-runtime").expect("binary exists");
    cmd.arg(fixture.path().join("viewer.json"))
        .args(["--frames", "3", "--size", "320x240"]);
    cmd.assert()
        .success()
        .stdout(contains("Loaded 1 object(s)"))
        .stdout(contains(" - Truck"))
        .stdout(contains("Lights: ambient, directional"))
        .stdout(contains("Materials: Paint, Glass"))
        .stdout(contains("Active features: Wireframe"))
        .stdout(contains("Feature Skybox failed"))
        .stdout(contains("Load errors: 1"))
        .stdout(contains("CameraRotation").not());
}

#[test]
fn cli_requires_a_config_path() {
    let mut cmd = Command::cargo_bin("viewer-runtime").expect("binary exists");
    cmd.assert()
        .failure()
        .stderr(contains("Usage: viewer-runtime"));
}

#[test]
fn cli_rejects_malformed_size() {
    let fixture = write_fixture();
    let mut cmd = Command::cargo_bin("viewer-runtime").expect("binary exists");
    cmd.arg(fixture.path().join("viewer.json"))
        .args(["--size", "wide"]);
    cmd.assert()
        .failure()
        .stderr(contains("expected WIDTHxHEIGHT"));
}
