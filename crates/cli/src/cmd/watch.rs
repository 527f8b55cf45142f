//! Watch the project and auto-save in the foreground

use crate::{output, util};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::sync::Arc;
use undu_watcher::AutoSaver;

pub async fn run(json: bool) -> Result<()> {
    let engine = Arc::new(util::open_engine()?);
    let auto_save = engine.config().auto_save.clone();

    if !auto_save.enabled {
        if json {
            return output::success(serde_json::json!({ "watching": false }));
        }
        println!("{}", "Auto-save is disabled in .undu/config.toml".yellow());
        return Ok(());
    }

    let saver = AutoSaver::start(Arc::clone(&engine))?;

    if json {
        output::success(serde_json::json!({
            "watching": true,
            "root": engine.root(),
            "intervalMs": auto_save.interval_ms,
        }))?;
    } else {
        println!(
            "{} Watching {} (auto-save after {}s of quiet, Ctrl-C to stop)",
            "●".green(),
            engine.root().display().to_string().cyan(),
            auto_save.interval_ms / 1000
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    let pending = saver.pending_count();
    saver.stop();
    if !json {
        println!();
        if pending > 0 {
            println!("{}", format!("Stopped with {pending} unsaved paths pending").yellow());
        } else {
            println!("{}", "Stopped".dimmed());
        }
    }
    Ok(())
}
