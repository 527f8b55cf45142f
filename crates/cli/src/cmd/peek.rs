//! Show a checkpoint's manifest without restoring it

use crate::{output, util};
use anyhow::Result;
use owo_colors::OwoColorize;
use undu_engine::CheckpointRecord;

pub fn run(target: &str, json: bool) -> Result<()> {
    let engine = util::open_engine()?;
    let checkpoint = engine.peek(target)?;

    if json {
        return output::success(serde_json::json!({
            "checkpoint": CheckpointRecord::of(&checkpoint),
            "files": checkpoint.files,
        }));
    }

    println!(
        "{} \"{}\"",
        util::short_id(&checkpoint.id).yellow(),
        checkpoint.message.bold()
    );
    println!(
        "{}",
        format!(
            "{} ({})",
            util::format_absolute_time(checkpoint.timestamp),
            util::format_relative_time(checkpoint.timestamp)
        )
        .dimmed()
    );
    println!();

    if checkpoint.files.is_empty() {
        println!("{}", "No files".dimmed());
        return Ok(());
    }
    for file in &checkpoint.files {
        println!("  {:>10}  {}", util::format_size(file.size).dimmed(), file.path);
    }
    println!();
    println!(
        "{} files, {}",
        checkpoint.files.len(),
        util::format_size(checkpoint.total_size())
    );
    Ok(())
}
