//! Save a named checkpoint

use super::report_checkpoint;
use crate::util;
use anyhow::Result;

pub fn run(message: &str, json: bool) -> Result<()> {
    let engine = util::open_engine()?;
    let checkpoint = engine.save(message, false)?;
    report_checkpoint("Saved", &checkpoint, json)
}
