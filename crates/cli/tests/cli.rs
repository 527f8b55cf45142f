//! End-to-end tests of the `undu` binary

mod common;

use anyhow::Result;
use std::fs;
use tempfile::TempDir;

fn init_project() -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("file.txt"), "v1")?;
    undu!(dir.path(), "init").assert_success()?;
    Ok(dir)
}

#[test]
fn test_init_reports_initial_checkpoint() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = undu!(dir.path(), "--json", "init").assert_success()?;
    let json = result.json()?;

    assert_eq!(json["ok"], true);
    assert_eq!(json["checkpoint"]["message"], "Initial");
    assert!(dir.path().join(".undu").is_dir());
    Ok(())
}

#[test]
fn test_init_twice_fails() -> Result<()> {
    let dir = init_project()?;
    let result = undu!(dir.path(), "--json", "init").assert_failure()?;
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.json()?["error"], "already_initialized");
    Ok(())
}

#[test]
fn test_outside_repository_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = undu!(dir.path(), "--json", "status").assert_failure()?;
    let json = result.json()?;
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"], "not_a_repository");
    Ok(())
}

#[test]
fn test_save_then_status() -> Result<()> {
    let dir = init_project()?;
    fs::write(dir.path().join("file.txt"), "v2")?;

    let status = undu!(dir.path(), "--json", "status").assert_success()?.json()?;
    let changes = status["unsavedChanges"].as_array().cloned().unwrap_or_default();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["path"], "file.txt");
    assert_eq!(changes[0]["type"], "modified");

    let saved = undu!(dir.path(), "--json", "save", "second", "version")
        .assert_success()?
        .json()?;
    assert_eq!(saved["checkpoint"]["message"], "second version");
    assert_eq!(saved["files"], 1);

    let status = undu!(dir.path(), "--json", "status").assert_success()?.json()?;
    assert_eq!(status["unsavedChanges"].as_array().map(Vec::len), Some(0));
    assert_eq!(status["currentCheckpoint"]["message"], "second version");
    assert_eq!(status["totalCheckpoints"], 1);
    assert_eq!(status["totalAutoSaves"], 1);
    Ok(())
}

#[test]
fn test_undo_restores_previous_content() -> Result<()> {
    let dir = init_project()?;
    fs::write(dir.path().join("file.txt"), "v2")?;
    fs::write(dir.path().join("new.txt"), "added")?;
    undu!(dir.path(), "save", "v2").assert_success()?;

    let result = undu!(dir.path(), "--json", "undo").assert_success()?.json()?;
    assert_eq!(result["checkpoint"]["message"], "Initial");
    assert_eq!(fs::read_to_string(dir.path().join("file.txt"))?, "v1");
    assert!(!dir.path().join("new.txt").exists());
    Ok(())
}

#[test]
fn test_undo_too_far_is_out_of_range() -> Result<()> {
    let dir = init_project()?;
    let result = undu!(dir.path(), "--json", "undo", "5").assert_failure()?;
    assert_eq!(result.json()?["error"], "out_of_range");
    Ok(())
}

#[test]
fn test_goto_by_message_and_unknown_target() -> Result<()> {
    let dir = init_project()?;
    fs::write(dir.path().join("file.txt"), "v2")?;
    undu!(dir.path(), "save", "before refactor").assert_success()?;
    fs::write(dir.path().join("file.txt"), "v3")?;
    undu!(dir.path(), "save", "after refactor").assert_success()?;

    undu!(dir.path(), "goto", "before").assert_success()?;
    assert_eq!(fs::read_to_string(dir.path().join("file.txt"))?, "v2");

    let result = undu!(dir.path(), "--json", "goto", "nonexistent").assert_failure()?;
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.json()?["error"], "not_found");
    assert_eq!(fs::read_to_string(dir.path().join("file.txt"))?, "v2");
    Ok(())
}

#[test]
fn test_cat_prints_recorded_bytes() -> Result<()> {
    let dir = init_project()?;
    fs::write(dir.path().join("file.txt"), "changed")?;

    let result = undu!(dir.path(), "cat", "file.txt", "--at", "Initial")
        .assert_success()?;
    assert_eq!(result.stdout, "v1");

    let missing = undu!(dir.path(), "--json", "cat", "nope.txt", "--at", "Initial")
        .assert_failure()?;
    assert_eq!(missing.json()?["error"], "not_found");
    Ok(())
}

#[test]
fn test_timeline_is_newest_first() -> Result<()> {
    let dir = init_project()?;
    fs::write(dir.path().join("file.txt"), "v2")?;
    undu!(dir.path(), "save", "second").assert_success()?;

    let timeline = undu!(dir.path(), "--json", "timeline").assert_success()?.json()?;
    let checkpoints = timeline["checkpoints"].as_array().cloned().unwrap_or_default();
    assert_eq!(checkpoints.len(), 2);
    assert_eq!(checkpoints[0]["message"], "second");
    assert_eq!(checkpoints[1]["message"], "Initial");
    assert_eq!(timeline["current"], checkpoints[0]["id"]);
    Ok(())
}

#[test]
fn test_diff_between_checkpoints() -> Result<()> {
    let dir = init_project()?;
    fs::write(dir.path().join("added.txt"), "a")?;
    undu!(dir.path(), "save", "with added").assert_success()?;

    let diff = undu!(
        dir.path(),
        "--json",
        "diff",
        "--from",
        "Initial",
        "--to",
        "with added"
    )
    .assert_success()?
    .json()?;
    assert_eq!(diff["summary"]["filesChanged"], 1);
    assert_eq!(diff["summary"]["additions"], 1);
    assert_eq!(diff["changes"][0]["path"], "added.txt");
    assert_eq!(diff["changes"][0]["type"], "added");
    Ok(())
}

#[test]
fn test_prune_dry_run_changes_nothing() -> Result<()> {
    let dir = init_project()?;
    let report = undu!(dir.path(), "--json", "prune", "--dry-run")
        .assert_success()?
        .json()?;
    assert_eq!(report["dryRun"], true);
    assert_eq!(report["checkpoints"].as_array().map(Vec::len), Some(0));

    let timeline = undu!(dir.path(), "--json", "timeline").assert_success()?.json()?;
    assert_eq!(timeline["checkpoints"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn test_human_save_output() -> Result<()> {
    let dir = init_project()?;
    fs::write(dir.path().join("file.txt"), "v2")?;
    let result = undu!(dir.path(), "save", "plain output").assert_success()?;
    assert!(result.stdout.contains("Saved"));
    assert!(result.stdout.contains("plain output"));
    assert!(result.stdout.contains("1 files"));
    Ok(())
}
