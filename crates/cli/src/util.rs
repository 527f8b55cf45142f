//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use owo_colors::OwoColorize;
use undu_engine::{ChangeKind, CheckpointId, FileChange, SnapshotEngine};

/// Open the repository containing the current directory
pub fn open_engine() -> Result<SnapshotEngine> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(SnapshotEngine::find(&cwd)?)
}

/// First 8 characters of an id
pub fn short_id(id: &CheckpointId) -> &str {
    id.short(8)
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts_ms: u64) -> String {
    let Some(then) = DateTime::<Utc>::from_timestamp_millis(ts_ms as i64) else {
        return "at an unknown time".to_string();
    };
    let seconds = (Utc::now() - then).num_seconds();

    if seconds < 0 {
        "in the future".to_string()
    } else if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3600 {
        plural(seconds / 60, "minute")
    } else if seconds < 86400 {
        plural(seconds / 3600, "hour")
    } else if seconds < 604800 {
        plural(seconds / 86400, "day")
    } else {
        plural(seconds / 604800, "week")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Format timestamp as local time ("2024-01-03 14:30")
pub fn format_absolute_time(ts_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms as i64)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// One colored line per change: `+ added`, `~ modified`, `- deleted`
pub fn format_change(change: &FileChange) -> String {
    match change.kind {
        ChangeKind::Added => format!("  {} {}", "+".green(), change.path.green()),
        ChangeKind::Modified => format!("  {} {}", "~".yellow(), change.path.yellow()),
        ChangeKind::Deleted => format!("  {} {}", "-".red(), change.path.red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc::now().timestamp_millis() as u64;
        assert_eq!(format_relative_time(now), "just now");
        assert_eq!(format_relative_time(now - 2 * 60 * 1000 - 500), "2 minutes ago");
        assert_eq!(format_relative_time(now - 60 * 60 * 1000 - 500), "1 hour ago");
        assert_eq!(format_relative_time(now + 60 * 60 * 1000), "in the future");
    }
}
