//! Apply the auto-save retention policy

use crate::{output, util};
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(dry_run: bool, json: bool) -> Result<()> {
    let engine = util::open_engine()?;
    let report = if dry_run {
        engine.prune_at(undu_engine::now_ms(), true)?
    } else {
        engine.prune()?
    };

    if json {
        return output::success(serde_json::to_value(&report)?);
    }

    if report.checkpoints.is_empty() {
        println!("{}", "Nothing to prune".dimmed());
    } else if dry_run {
        println!("Would delete {} auto-saves:", report.checkpoints.len());
        for id in &report.checkpoints {
            println!("  {}", util::short_id(id).yellow());
        }
    } else {
        println!(
            "{} Deleted {} auto-saves, {} blobs ({} freed)",
            "✓".green(),
            report.checkpoints.len(),
            report.blobs_deleted,
            util::format_size(report.bytes_freed)
        );
    }
    Ok(())
}
