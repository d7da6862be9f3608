//! Integration tests for the quarry CLI.
//!
//! Drives the built binary against isolated temp project directories.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Run quarry with the given args against a project directory.
fn run_quarry(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quarry"))
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("failed to execute quarry")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ============================================================================
// Flag Tests
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["--help"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("build"), "help should list build: {text}");
    assert!(text.contains("list"), "help should list list: {text}");
    assert!(text.contains("summary"), "help should list summary: {text}");
    assert!(text.contains("fetch"), "help should list fetch: {text}");
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("quarry"));
}

// ============================================================================
// List Tests
// ============================================================================

#[test]
fn test_list_shows_all_steps_pending() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["list"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    for step_id in [
        "tickers_v1",
        "prices_v2",
        "daily_aggs_v2",
        "hundred_day_aggs_v1",
        "market_cap_v2",
        "insider_trades_v2",
    ] {
        assert!(text.contains(step_id), "list should show {step_id}: {text}");
    }
    assert!(text.contains("PENDING"));
    assert!(!text.contains("DONE"));
}

#[test]
fn test_list_json_is_valid() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["list", "--format", "json"]);
    assert!(output.status.success());

    let rows: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("list --format json should emit JSON");
    let rows = rows.as_array().expect("JSON output should be an array");
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0]["id"], "tickers_v1");
    assert_eq!(rows[0]["status"], "PENDING");
}

#[test]
fn test_list_alias_ls() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["ls"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("tickers_v1"));
}

// ============================================================================
// Dry Run Tests
// ============================================================================

#[test]
fn test_dry_run_shows_all_new_on_fresh_project() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["build", "--dry-run"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("tickers_v1"));
    assert!(text.contains("insider_trades_v2"));
    assert!(text.contains("NEW"));
    assert!(!text.contains("REBUILD"));

    // Planning must not create any state
    assert!(!dir.path().join("db").exists());
}

#[test]
fn test_dry_run_orders_dependencies_first() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["build", "--dry-run"]);
    let text = stdout(&output);

    let tickers = text.find("tickers_v1").expect("tickers in plan");
    let prices = text.find("prices_v2").expect("prices in plan");
    let daily = text.find("daily_aggs_v2").expect("daily_aggs in plan");
    assert!(tickers < prices && prices < daily);
}

// ============================================================================
// Config Error Tests
// ============================================================================

#[test]
fn test_unknown_target_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["build", "bogus_table"]);
    assert!(!output.status.success(), "unknown target must fail");

    let text = stderr(&output);
    assert!(
        text.contains("unknown target") && text.contains("bogus_table"),
        "should name the bad target: {text}"
    );
    // Nothing ran, nothing was created
    assert!(!dir.path().join("db").join(".build_manifest.json").exists());
}

#[test]
fn test_unknown_target_rejected_even_with_dry_run() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["build", "--dry-run", "bogus_table"]);
    assert!(!output.status.success());
}

// ============================================================================
// Summary Tests
// ============================================================================

#[test]
fn test_summary_on_empty_project_reports_missing_tables() {
    let dir = TempDir::new().unwrap();
    let output = run_quarry(dir.path(), &["summary"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("TICKERS"));
    assert!(text.contains("not found"));
}

// ============================================================================
// Fetch Tests (offline behavior only)
// ============================================================================

#[test]
fn test_fetch_market_cap_requires_token() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_quarry"))
        .arg("-C")
        .arg(dir.path())
        .args(["fetch", "market-cap"])
        .env_remove("FMP_API_TOKEN")
        .output()
        .expect("failed to execute quarry");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("FMP_API_TOKEN"));
}
