//! Go back along the timeline

use super::report_checkpoint;
use crate::util;
use anyhow::Result;

pub fn run(steps: usize, json: bool) -> Result<()> {
    let engine = util::open_engine()?;
    let checkpoint = engine.undo(steps)?;
    report_checkpoint("Restored", &checkpoint, json)
}
