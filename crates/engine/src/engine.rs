//! The snapshot engine: save, restore, compare

use crate::diff::{compare, Diff, DiffSummary, FileChange};
use crate::{restore, worktree};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use undu_core::{
    normalize_path, Config, ContentStore, Error, Layout, NotFoundKind, Result, Scanner,
    StorageContext,
};
use undu_journal::{
    now_ms, Checkpoint, CheckpointId, CheckpointRecord, GarbageCollector, Journal,
    RetentionPolicy,
};

/// Message of the checkpoint `init` creates
pub const INITIAL_MESSAGE: &str = "Initial";

/// Message of watcher-triggered checkpoints
pub const AUTO_SAVE_MESSAGE: &str = "Auto-save";

/// Snapshot of repository state for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub project_name: String,
    pub current_checkpoint: Option<CheckpointRecord>,
    pub unsaved_changes: Vec<FileChange>,
    /// Named (user-created) checkpoints
    pub total_checkpoints: usize,
    pub total_auto_saves: usize,
}

/// Every checkpoint, newest first, plus the current pointer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub checkpoints: Vec<CheckpointRecord>,
    pub current: Option<CheckpointId>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub dry_run: bool,
    /// Checkpoints recommended (dry run) or actually deleted
    pub checkpoints: Vec<CheckpointId>,
    pub blobs_deleted: usize,
    pub bytes_freed: u64,
}

/// Coordinates scanner, content store and journal for one project
///
/// Every public operation holds an internal lock for its whole duration, so
/// one engine can be shared across threads behind an `Arc`.
pub struct SnapshotEngine {
    layout: Layout,
    config: Config,
    scanner: Scanner,
    store: ContentStore,
    journal: Journal,
    gc: GarbageCollector,
    lock: Mutex<()>,
}

impl SnapshotEngine {
    /// Create a repository at `root` and record the initial checkpoint
    pub fn init(root: &Path) -> Result<Self> {
        let root = canonical(root)?;
        let layout = Layout::new(&root);
        layout.create()?;
        Config::default().save(&layout.config_path(), &layout.tmp_dir())?;

        let engine = Self::open_layout(layout)?;
        engine.save(INITIAL_MESSAGE, true)?;
        tracing::info!(root = %root.display(), "initialized repository");
        Ok(engine)
    }

    /// Open the repository rooted exactly at `root`
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_layout(Layout::new(&canonical(root)?))
    }

    /// Open the nearest repository at or above `start`
    pub fn find(start: &Path) -> Result<Self> {
        let layout = Layout::discover(&canonical(start)?)?;
        Self::open_layout(layout)
    }

    fn open_layout(layout: Layout) -> Result<Self> {
        layout.ensure_exists()?;
        let config = Config::load(&layout.config_path())?;
        let journal = Journal::open(&layout.db_dir())?;
        let store = ContentStore::new(layout.objects_dir(), layout.tmp_dir());
        let scanner = Scanner::new(layout.root(), config.ignore.clone());

        Ok(Self {
            layout,
            config,
            scanner,
            store,
            journal,
            gc: GarbageCollector::new(RetentionPolicy::default()),
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.store
    }

    /// Capture the working tree as a new checkpoint and make it current
    pub fn save(&self, message: &str, is_auto_save: bool) -> Result<Checkpoint> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::validation("Checkpoint message must not be empty"));
        }

        let _guard = self.lock.lock();

        let files = worktree::capture_into(&self.scanner, &self.store)?;
        let parent_id = self.journal.current_id()?;
        let newest = self.journal.records()?.first().map_or(0, |r| r.timestamp);
        let timestamp = now_ms().max(newest);

        let checkpoint = Checkpoint::new(message, timestamp, is_auto_save, parent_id, files);
        self.journal.insert_as_current(&checkpoint)?;

        tracing::info!(
            id = %checkpoint.id,
            message = %checkpoint.message,
            files = checkpoint.files.len(),
            auto = is_auto_save,
            "checkpoint created"
        );
        Ok(checkpoint)
    }

    /// Step `steps` checkpoints back along the newest-first timeline
    pub fn undo(&self, steps: usize) -> Result<Checkpoint> {
        let _guard = self.lock.lock();

        let records = self.journal.records()?;
        let current = self.journal.current_id()?;
        let current_idx = current
            .as_ref()
            .and_then(|id| records.iter().position(|r| &r.id == id));

        // With no current pointer the first step lands on the newest checkpoint
        let (target_idx, available) = match current_idx {
            Some(idx) => (idx.checked_add(steps), records.len() - idx - 1),
            None => (steps.checked_sub(1), records.len()),
        };
        let target = match target_idx.and_then(|idx| records.get(idx)) {
            Some(record) => record,
            None => return Err(Error::OutOfRange { requested: steps, available }),
        };

        let checkpoint = self
            .journal
            .find_by_id(target.id.as_str())?
            .ok_or_else(|| Error::not_found(NotFoundKind::Checkpoint, target.id.as_str()))?;
        self.restore_to(checkpoint)
    }

    /// Restore the working tree to the checkpoint `target` resolves to
    ///
    /// Resolution: exact id, then case-insensitive exact message, then the
    /// most recent case-insensitive substring match.
    pub fn goto(&self, target: &str) -> Result<Checkpoint> {
        let _guard = self.lock.lock();
        let checkpoint = self.resolve(target)?;
        self.restore_to(checkpoint)
    }

    fn restore_to(&self, checkpoint: Checkpoint) -> Result<Checkpoint> {
        let plan = restore::prepare(&self.scanner, &self.store, &checkpoint)?;

        let stats = restore::apply(self.root(), &self.layout.tmp_dir(), plan).map_err(|e| {
            let detail = e.to_string();
            Error::Storage {
                context: format!(
                    "Restore to {} failed; working tree may be partially restored",
                    checkpoint.id
                ),
                source: detail.into(),
            }
        })?;

        self.journal.set_current(&checkpoint.id)?;
        tracing::info!(
            id = %checkpoint.id,
            written = stats.written,
            unchanged = stats.unchanged,
            removed = stats.removed,
            "restored checkpoint"
        );
        Ok(checkpoint)
    }

    pub fn status(&self) -> Result<Status> {
        let _guard = self.lock.lock();

        let current = self.journal.get_current()?;
        let unsaved_changes = self.unsaved_against(current.as_ref())?;
        let records = self.journal.records()?;
        let total_auto_saves = records.iter().filter(|r| r.is_auto_save).count();

        Ok(Status {
            project_name: self.layout.project_name(),
            current_checkpoint: current.as_ref().map(CheckpointRecord::of),
            unsaved_changes,
            total_checkpoints: records.len() - total_auto_saves,
            total_auto_saves,
        })
    }

    /// Changes between the current checkpoint and the live tree
    ///
    /// Empty when there is no current checkpoint.
    pub fn unsaved_changes(&self) -> Result<Vec<FileChange>> {
        let _guard = self.lock.lock();
        let current = self.journal.get_current()?;
        self.unsaved_against(current.as_ref())
    }

    fn unsaved_against(&self, current: Option<&Checkpoint>) -> Result<Vec<FileChange>> {
        match current {
            Some(checkpoint) => Ok(compare(&checkpoint.files, &worktree::capture(&self.scanner)?)),
            None => Ok(Vec::new()),
        }
    }

    /// Diff two states
    ///
    /// `from` defaults to the current checkpoint, `to` to the working tree.
    pub fn diff(&self, from: Option<&str>, to: Option<&str>) -> Result<Diff> {
        let _guard = self.lock.lock();

        let from = match from {
            Some(target) => Some(self.resolve(target)?),
            None => self.journal.get_current()?,
        };
        let to = to.map(|target| self.resolve(target)).transpose()?;

        let from_files = from.as_ref().map(|c| c.files.as_slice()).unwrap_or_default();
        let changes = match &to {
            Some(checkpoint) => compare(from_files, &checkpoint.files),
            None => compare(from_files, &worktree::capture(&self.scanner)?),
        };

        Ok(Diff {
            from: from.as_ref().map(CheckpointRecord::of),
            to: to.as_ref().map(CheckpointRecord::of),
            summary: DiffSummary::of(&changes),
            changes,
        })
    }

    /// A checkpoint with its manifest; touches neither tree nor pointer
    pub fn peek(&self, target: &str) -> Result<Checkpoint> {
        let _guard = self.lock.lock();
        self.resolve(target)
    }

    /// Bytes of `path` as recorded in the checkpoint `target` resolves to
    ///
    /// An untracked path is `NotFound(file)`; a tracked path whose blob is
    /// gone is `NotFound(blob)`.
    pub fn file_at(&self, path: &str, target: &str) -> Result<Vec<u8>> {
        let path = normalize_path(Path::new(path))?;
        let _guard = self.lock.lock();

        let checkpoint = self.resolve(target)?;
        let snapshot = self.journal.file_at(&checkpoint.id, &path)?.ok_or_else(|| {
            Error::not_found(
                NotFoundKind::File,
                format!("{path} in checkpoint {}", checkpoint.id),
            )
        })?;
        self.store.require(snapshot.hash)
    }

    pub fn timeline(&self) -> Result<Timeline> {
        let _guard = self.lock.lock();
        Ok(Timeline {
            checkpoints: self.journal.records()?,
            current: self.journal.current_id()?,
        })
    }

    /// Apply the retention policy now
    pub fn prune(&self) -> Result<PruneReport> {
        self.prune_at(now_ms(), false)
    }

    /// Apply the retention policy as of `now_ms`
    ///
    /// A dry run reports the candidates without deleting anything.
    pub fn prune_at(&self, now_ms: u64, dry_run: bool) -> Result<PruneReport> {
        let _guard = self.lock.lock();

        if dry_run {
            return Ok(PruneReport {
                dry_run,
                checkpoints: self.gc.plan(&self.journal, now_ms)?,
                ..PruneReport::default()
            });
        }

        let report = self.gc.collect(&self.journal, &self.store, now_ms)?;
        Ok(PruneReport {
            dry_run,
            checkpoints: report.deleted,
            blobs_deleted: report.blobs_deleted,
            bytes_freed: report.bytes_freed,
        })
    }

    fn resolve(&self, target: &str) -> Result<Checkpoint> {
        let target = target.trim();
        if target.is_empty() {
            return Err(Error::validation("Checkpoint id or message must not be empty"));
        }
        self.journal
            .find_by_message(target)?
            .ok_or_else(|| Error::not_found(NotFoundKind::Checkpoint, target))
    }
}

fn canonical(path: &Path) -> Result<std::path::PathBuf> {
    std::fs::canonicalize(path).with_storage(|| format!("Failed to resolve {}", path.display()))
}
