//! Snapshot engine for undu
//!
//! Coordinates the scanner, the content store and the checkpoint journal
//! to save, restore and compare project states.

pub mod diff;
pub mod engine;
mod restore;
pub mod worktree;

pub use diff::{compare, ChangeKind, Diff, DiffSummary, FileChange};
pub use engine::{PruneReport, SnapshotEngine, Status, Timeline, AUTO_SAVE_MESSAGE, INITIAL_MESSAGE};
pub use undu_core::{Error, NotFoundKind, Result};
pub use undu_journal::{now_ms, Checkpoint, CheckpointId, CheckpointRecord, FileSnapshot};
