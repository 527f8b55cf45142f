//! Show every checkpoint, newest first

use crate::{output, util};
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(json: bool) -> Result<()> {
    let engine = util::open_engine()?;
    let timeline = engine.timeline()?;

    if json {
        return output::success(serde_json::to_value(&timeline)?);
    }

    println!("{}", "Timeline".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for record in &timeline.checkpoints {
        let is_current = timeline.current.as_ref() == Some(&record.id);
        let marker = if is_current { "●".green().to_string() } else { "○".dimmed().to_string() };
        let message = if record.is_auto_save {
            record.message.dimmed().to_string()
        } else {
            record.message.clone()
        };
        println!(
            "{} {} {}  {}",
            marker,
            util::short_id(&record.id).yellow(),
            message,
            util::format_relative_time(record.timestamp).dimmed()
        );
    }
    Ok(())
}
