//! CLI command implementations

pub mod cat;
pub mod diff;
pub mod goto;
pub mod init;
pub mod peek;
pub mod prune;
pub mod save;
pub mod status;
pub mod timeline;
pub mod undo;
pub mod watch;

use crate::{output, util};
use anyhow::Result;
use owo_colors::OwoColorize;
use undu_engine::{Checkpoint, CheckpointRecord};

/// Shared rendering for commands that land on a checkpoint
pub(crate) fn report_checkpoint(verb: &str, checkpoint: &Checkpoint, json: bool) -> Result<()> {
    if json {
        return output::success(serde_json::json!({
            "checkpoint": CheckpointRecord::of(checkpoint),
            "files": checkpoint.files.len(),
        }));
    }

    println!(
        "{} {} {} \"{}\" ({} files)",
        "✓".green(),
        verb,
        util::short_id(&checkpoint.id).yellow(),
        checkpoint.message,
        checkpoint.files.len()
    );
    Ok(())
}
