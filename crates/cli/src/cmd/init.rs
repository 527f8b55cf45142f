//! Initialize undu in the current directory

use crate::output;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use undu_engine::SnapshotEngine;

pub fn run(json: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let engine = SnapshotEngine::init(&cwd)?;
    let timeline = engine.timeline()?;

    if json {
        return output::success(serde_json::json!({
            "root": engine.root(),
            "checkpoint": timeline.checkpoints.first(),
        }));
    }

    println!(
        "{} Initialized undu in {}",
        "✓".green(),
        engine.root().display().to_string().cyan()
    );
    println!();
    println!("{}", "Next steps:".bold());
    println!("  undu save \"message\"   save a checkpoint");
    println!("  undu watch            auto-save while you work");
    println!("  undu undo             go back one checkpoint");
    Ok(())
}
