//! Show the current checkpoint and unsaved changes

use crate::{output, util};
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(json: bool) -> Result<()> {
    let engine = util::open_engine()?;
    let status = engine.status()?;

    if json {
        return output::success(serde_json::to_value(&status)?);
    }

    println!("{}", status.project_name.bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match &status.current_checkpoint {
        Some(current) => println!(
            "Current:     {} {} {}",
            util::short_id(&current.id).yellow(),
            current.message,
            util::format_relative_time(current.timestamp).dimmed()
        ),
        None => println!("Current:     {}", "none".dimmed()),
    }
    println!(
        "Checkpoints: {} named, {} auto-saves",
        status.total_checkpoints, status.total_auto_saves
    );
    println!();

    if status.unsaved_changes.is_empty() {
        println!("{}", "No unsaved changes".dimmed());
    } else {
        println!("{}", format!("Unsaved changes ({}):", status.unsaved_changes.len()).bold());
        for change in &status.unsaved_changes {
            println!("{}", util::format_change(change));
        }
    }
    Ok(())
}
