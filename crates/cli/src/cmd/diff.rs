//! Show changes between two states

use crate::{output, util};
use anyhow::Result;
use owo_colors::OwoColorize;
use undu_engine::CheckpointRecord;

fn label(side: Option<&CheckpointRecord>, fallback: &str) -> String {
    match side {
        Some(record) => format!("{} \"{}\"", util::short_id(&record.id), record.message),
        None => fallback.to_string(),
    }
}

pub fn run(from: Option<&str>, to: Option<&str>, json: bool) -> Result<()> {
    let engine = util::open_engine()?;
    let diff = engine.diff(from, to)?;

    if json {
        return output::success(serde_json::to_value(&diff)?);
    }

    println!(
        "{} {} {} {}",
        "Changes from".bold(),
        label(diff.from.as_ref(), "nothing").yellow(),
        "to".bold(),
        label(diff.to.as_ref(), "working tree").yellow()
    );
    println!();

    if diff.changes.is_empty() {
        println!("{}", "No changes".dimmed());
        return Ok(());
    }
    for change in &diff.changes {
        println!("{}", util::format_change(change));
    }
    println!();
    println!(
        "{} files changed, {} added, {} deleted",
        diff.summary.files_changed, diff.summary.additions, diff.summary.deletions
    );
    Ok(())
}
