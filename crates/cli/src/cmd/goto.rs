//! Restore a checkpoint by id or message

use super::report_checkpoint;
use crate::util;
use anyhow::Result;

pub fn run(target: &str, json: bool) -> Result<()> {
    let engine = util::open_engine()?;
    let checkpoint = engine.goto(target)?;
    report_checkpoint("Restored", &checkpoint, json)
}
