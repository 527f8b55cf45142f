//! Quiet-period debouncing
//!
//! Every event resets one shared timer. Pending paths are released together
//! once no event has arrived for the whole quiet period.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: BTreeSet<String>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: BTreeSet::new(),
            last_event: None,
        }
    }

    /// Record a change to `path` at `now`, restarting the quiet period
    pub fn push(&mut self, path: String, now: Instant) {
        self.pending.insert(path);
        self.last_event = Some(now);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// How long until the pending set is released; `None` when idle
    pub fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        let last = self.last_event?;
        Some((last + self.quiet).saturating_duration_since(now))
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        !self.pending.is_empty() && self.time_until_ready(now) == Some(Duration::ZERO)
    }

    /// Release and clear the pending paths, sorted
    pub fn take(&mut self) -> Vec<String> {
        self.last_event = None;
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

/// Editor swap, backup and temp files that never deserve a checkpoint
pub fn is_editor_temp(file_name: &str) -> bool {
    // Vim swap files (.swp, .swo, .swn) and its 4913 write probe
    if (file_name.starts_with('.') && file_name.contains(".sw")) || file_name == "4913" {
        return true;
    }
    if file_name.ends_with(".tmp") || file_name.contains(".tmp.") {
        return true;
    }
    // Emacs autosave and backups
    if file_name.starts_with('#') && file_name.ends_with('#') {
        return true;
    }
    file_name.ends_with('~') || file_name.ends_with(".bak")
}
