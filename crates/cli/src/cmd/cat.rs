//! Print a file as recorded in a checkpoint

use crate::{output, util};
use anyhow::{Context, Result};
use std::io::Write;

pub fn run(path: &str, at: &str, json: bool) -> Result<()> {
    let engine = util::open_engine()?;
    let bytes = engine.file_at(path, at)?;

    if json {
        return output::success(serde_json::json!({
            "path": path,
            "size": bytes.len(),
            "content": String::from_utf8_lossy(&bytes),
        }));
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&bytes).context("Failed to write to stdout")?;
    stdout.flush().context("Failed to write to stdout")?;
    Ok(())
}
