//! Integration tests for the `spray-cad` binary entry point.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn missing_step_input_exits_with_failure() {
    let dir = TempDir::new().expect("temp dir");
    let output = dir.path().join("out.stl");

    let mut command = cargo_bin_cmd!("spray-cad");
    command
        .current_dir(dir.path())
        .arg("convert")
        .arg(dir.path().join("absent.STEP"))
        .arg(&output);
    command
        .assert()
        .failure()
        .code(1)
        .stdout(contains("ERROR: STEP file does not exist"));

    assert!(!output.exists(), "no STL may be written");
}

#[test]
fn reference_step_is_written_with_default_path() {
    let dir = TempDir::new().expect("temp dir");

    let mut command = cargo_bin_cmd!("spray-cad");
    command.current_dir(dir.path()).arg("make-reference-step");
    command
        .assert()
        .success()
        .stdout(contains("SUCCESS"));

    let written = dir.path().join("data/model/simple_cube.step");
    assert!(
        predicate::path::is_file().eval(&written),
        "reference cube should exist at {}",
        written.display()
    );
}

#[test]
fn unknown_configured_executable_fails_conversion() {
    let dir = TempDir::new().expect("temp dir");
    let input = dir.path().join("part.step");
    std::fs::write(&input, "ISO-10303-21;\nEND-ISO-10303-21;\n").expect("write input");

    let mut command = cargo_bin_cmd!("spray-cad");
    command
        .current_dir(dir.path())
        .arg("--freecad-executable")
        .arg(dir.path().join("no-such-FreeCADCmd"))
        .arg("convert")
        .arg(&input)
        .arg(dir.path().join("part.stl"));
    command
        .assert()
        .failure()
        .stdout(contains("ERROR: FreeCAD executable not found"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let mut command = cargo_bin_cmd!("spray-cad");
    command
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(contains("Usage"));
}
