//! End-to-end checks of the command-line tool.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

/// Writes a scratch file for one test and returns its path. Files live under
/// the per-target temp dir so parallel tests do not collide.
fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("test-expectations-{}-{}", std::process::id(), name));
    fs::write(&path, contents).expect("scratch file is writable");
    path
}

fn bin() -> Command {
    Command::cargo_bin("test-expectations").expect("binary builds")
}

#[test]
fn lint_accepts_a_clean_file() {
    let file = scratch_file(
        "clean",
        "# resolved entries\nBug(x) fast/html/keygen.html [ Failure ]\n",
    );
    bin()
        .arg("lint")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok:"));
    let _ = fs::remove_file(file);
}

#[test]
fn lint_rejects_a_malformed_file() {
    let file = scratch_file("broken", "Bug(x) fast/html/keygen.html [ Failure\n");
    bin()
        .arg("lint")
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Missing a \"]\""));
    let _ = fs::remove_file(file);
}

#[test]
fn lint_reports_missing_paths_with_a_test_list() {
    let tests = scratch_file("corpus", "fast/html/keygen.html\n");
    let file = scratch_file("stale", "Bug(x) fast/html/removed.html [ Failure ]\n");
    bin()
        .arg("--tests")
        .arg(&tests)
        .arg("lint")
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Path does not exist."));
    let _ = fs::remove_file(tests);
    let _ = fs::remove_file(file);
}

#[test]
fn query_resolves_the_cascade() {
    let generic = scratch_file("generic", "Bug(x) fast/html/keygen.html [ Failure ]\n");
    let overrides = scratch_file("overrides", "Bug(y) fast/html/keygen.html [ Timeout ]\n");
    bin()
        .arg("query")
        .arg("fast/html/keygen.html")
        .arg(&generic)
        .arg(&overrides)
        .assert()
        .success()
        .stdout(predicate::str::contains("expected: Timeout"));
    let _ = fs::remove_file(generic);
    let _ = fs::remove_file(overrides);
}

#[test]
fn format_emits_canonical_lines() {
    let file = scratch_file(
        "canonical",
        "Bug(x)   [ Debug  Mac ] fast/html/keygen.html [ Timeout Crash ]\n",
    );
    bin()
        .arg("format")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "BUGX [ Mac Debug ] fast/html/keygen.html [ Crash Timeout ]",
        ));
    let _ = fs::remove_file(file);
}
