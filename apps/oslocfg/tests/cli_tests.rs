//! Integration tests for oslocfg CLI commands.
//!
//! Uses tempfile for testing file-based operations.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use oslocfg::cli::{CliError, cmd_check, cmd_generate, cmd_show};
use oslocfg_core::OsloError;
use std::path::PathBuf;
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a temporary directory for tests.
fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// GENERATE COMMAND TESTS
// =============================================================================

#[test]
fn test_generate_from_command_line() {
    let temp = create_temp_dir();
    let output = temp.path().join("sample.conf");

    cmd_generate(&args(&[
        "--output-file",
        output.to_str().unwrap(),
        "--opts",
        "DEFAULT:oslocfg.conf",
    ]))
    .unwrap();

    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("[DEFAULT]\n"));
    assert!(text.contains("# From DEFAULT"));
    assert!(text.contains("(multi valued)"));
    assert!(text.contains("#config_file =\n"));
    assert!(text.contains("#config_dir =\n"));
}

#[test]
fn test_generate_from_config_file() {
    let temp = create_temp_dir();
    let output = temp.path().join("generated.conf");
    let gen_conf = write_file(
        &temp,
        "gen.conf",
        &format!(
            "[DEFAULT]\noutput_file = {}\nwrap_width = 40\nopts = generator:oslocfg.generator\n",
            output.display()
        ),
    );

    cmd_generate(&args(&["--config-file", gen_conf.to_str().unwrap()])).unwrap();

    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("[DEFAULT]\n\n\n[generator]\n"));
    assert!(text.contains("#wrap_width = 70\n"));
    assert!(text.lines().filter(|l| l.starts_with("# ")).all(|l| l.len() <= 40));
}

#[test]
fn test_generate_unknown_lister_fails() {
    let temp = create_temp_dir();
    let output = temp.path().join("sample.conf");

    let result = cmd_generate(&args(&[
        "--output-file",
        output.to_str().unwrap(),
        "--opts",
        "DEFAULT:nope",
    ]));
    assert!(matches!(
        result,
        Err(CliError::Config(OsloError::NoSuchLister { .. }))
    ));
}

#[test]
fn test_generate_rejects_bad_wrap_width() {
    let result = cmd_generate(&args(&["--wrap-width", "wide"]));
    assert!(matches!(
        result,
        Err(CliError::Config(OsloError::InvalidValue { .. }))
    ));
}

// =============================================================================
// CHECK COMMAND TESTS
// =============================================================================

#[test]
fn test_check_reports_sections() {
    let temp = create_temp_dir();
    let path = write_file(
        &temp,
        "demo.conf",
        "[DEFAULT]\ndebug = true\n\n[database]\nconnection = sqlite://\npool = 5\n",
    );

    let mut out = Vec::new();
    let summaries = cmd_check(std::slice::from_ref(&path), &mut out).unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].sections.get("DEFAULT"), Some(&1));
    assert_eq!(summaries[0].sections.get("database"), Some(&2));
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("OK (2 sections)"));
    assert!(text.contains("  [database] 2 keys"));
}

#[test]
fn test_check_stops_at_malformed_file() {
    let temp = create_temp_dir();
    let good = write_file(&temp, "good.conf", "[DEFAULT]\na = 1\n");
    let bad = write_file(&temp, "bad.conf", "a = 1\n");

    let mut out = Vec::new();
    let result = cmd_check(&[good, bad.clone()], &mut out);
    match result {
        Err(CliError::Parse { path, source }) => {
            assert_eq!(path, bad);
            assert_eq!(source.line_number, 1);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_check_missing_file() {
    let mut out = Vec::new();
    let result = cmd_check(&[PathBuf::from("/nonexistent/demo.conf")], &mut out);
    assert!(matches!(result, Err(CliError::Read { .. })));
}

// =============================================================================
// SHOW COMMAND TESTS
// =============================================================================

#[test]
fn test_show_merges_files() {
    let temp = create_temp_dir();
    let a = write_file(&temp, "a.conf", "[DEFAULT]\nname = first\n");
    let b = write_file(&temp, "b.conf", "[DEFAULT]\nname = second\n\n[cache]\nttl = 60\n");

    let mut out = Vec::new();
    cmd_show(&[a, b], false, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text,
        "[DEFAULT]\nname = first\nname = second\n\n[cache]\nttl = 60\n"
    );
}

#[test]
fn test_show_json() {
    let temp = create_temp_dir();
    let path = write_file(&temp, "demo.conf", "[api]\nworkers = 4\n");

    let mut out = Vec::new();
    cmd_show(std::slice::from_ref(&path), true, &mut out).unwrap();

    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["sections"]["api"]["workers"][0], "4");
    assert_eq!(value["files"][0], path.display().to_string());
}
