//! Working-tree restore
//!
//! Write first, delete stale last: every blob is loaded before the tree is
//! touched, changed files are replaced through atomic renames, and only then
//! are paths absent from the target removed.
//!
//! A restore never destroys a file the scanner does not track. When the
//! target needs a file where an ignored or untracked file currently sits
//! (or inside a directory holding one), `prepare` refuses with `Storage`.

use ahash::AHashSet;
use std::fs;
use std::path::{Path, PathBuf};
use undu_core::store::resolve_under;
use undu_core::{atomic_write, hash_file, ContentStore, Error, Result, Scanner, StorageContext};
use undu_journal::{Checkpoint, FileSnapshot};

/// Everything needed to apply a restore, gathered without side effects
pub(crate) struct RestorePlan<'a> {
    writes: Vec<(&'a FileSnapshot, PathBuf, Vec<u8>)>,
    stale: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RestoreStats {
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Load every blob of `target` and list the tracked paths it does not have
///
/// A missing blob fails here with `NotFound(blob)`, before any file changes.
/// So does a target path blocked by untracked content.
pub(crate) fn prepare<'a>(
    scanner: &Scanner,
    store: &ContentStore,
    target: &'a Checkpoint,
) -> Result<RestorePlan<'a>> {
    let root = scanner.root();

    let mut writes = Vec::with_capacity(target.files.len());
    for file in &target.files {
        let path = resolve_under(root, &file.path)?;
        let data = store.require(file.hash)?;
        writes.push((file, path, data));
    }

    let wanted: AHashSet<&str> = target.files.iter().map(|f| f.path.as_str()).collect();
    let stale: Vec<String> = scanner
        .scan()?
        .into_iter()
        .filter(|path| !wanted.contains(path.as_str()))
        .collect();

    let stale_set: AHashSet<&str> = stale.iter().map(String::as_str).collect();
    for file in &target.files {
        ensure_replaceable(root, &file.path, &stale_set)?;
    }

    Ok(RestorePlan { writes, stale })
}

/// Mutate the working tree to match the plan
pub(crate) fn apply(root: &Path, tmp_dir: &Path, plan: RestorePlan<'_>) -> Result<RestoreStats> {
    let mut stats = RestoreStats::default();
    let stale: AHashSet<&str> = plan.stale.iter().map(String::as_str).collect();

    for (file, path, data) in plan.writes {
        stats.removed += clear_conflicts(root, &file.path, &stale)?;

        // A symlink is replaced even when its target has the right bytes
        let is_regular = fs::symlink_metadata(&path).is_ok_and(|meta| meta.is_file());
        let unchanged = is_regular && hash_file(&path)? == file.hash;
        if unchanged {
            stats.unchanged += 1;
        } else {
            atomic_write(tmp_dir, &path, &data)
                .with_storage(|| format!("Failed to restore {}", file.path))?;
            tracing::debug!(path = %file.path, bytes = data.len(), "restored file");
            stats.written += 1;
        }
        apply_mode(&path, file.mode)?;
    }

    for relative in &plan.stale {
        let path = root.join(relative);
        // Already displaced by a write above
        match fs::symlink_metadata(&path) {
            Ok(meta) if !meta.is_dir() => {}
            _ => continue,
        }
        fs::remove_file(&path).with_storage(|| format!("Failed to remove {relative}"))?;
        tracing::debug!(path = %relative, "removed stale file");
        stats.removed += 1;
        remove_empty_parents(root, &path);
    }

    Ok(stats)
}

/// Fail if making room for `relative` would delete a file that is not stale
fn ensure_replaceable(root: &Path, relative: &str, stale: &AHashSet<&str>) -> Result<()> {
    let mut current = root.to_path_buf();
    let mut prefix = String::new();
    let mut parts = relative.split('/').peekable();

    while let Some(part) = parts.next() {
        current.push(part);
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(part);

        let Ok(meta) = fs::symlink_metadata(&current) else {
            return Ok(());
        };
        if parts.peek().is_some() {
            if !meta.is_dir() {
                if stale.contains(prefix.as_str()) {
                    return Ok(());
                }
                return Err(blocked(relative, &prefix));
            }
        } else if meta.is_dir() {
            if let Some(untracked) = first_untracked(&current, &prefix, stale)? {
                return Err(blocked(relative, &untracked));
            }
        }
    }
    Ok(())
}

/// First file under `dir` that is not in `stale`, depth first
fn first_untracked(dir: &Path, prefix: &str, stale: &AHashSet<&str>) -> Result<Option<String>> {
    let entries = fs::read_dir(dir).with_storage(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_storage(|| format!("Failed to read {}", dir.display()))?;
        let relative = format!("{prefix}/{}", entry.file_name().to_string_lossy());
        let file_type = entry
            .file_type()
            .with_storage(|| format!("Failed to stat {relative}"))?;

        if file_type.is_dir() {
            if let Some(found) = first_untracked(&entry.path(), &relative, stale)? {
                return Ok(Some(found));
            }
        } else if !stale.contains(relative.as_str()) {
            return Ok(Some(relative));
        }
    }
    Ok(None)
}

fn blocked(path: &str, untracked: &str) -> Error {
    Error::storage(
        format!("Cannot restore {path}"),
        format!("{untracked} is not tracked and would be destroyed"),
    )
}

/// Make room for a file at `relative`: a stale file ancestor is removed, and
/// a directory at `relative` itself is emptied of stale files and removed
///
/// Returns how many stale files were removed.
fn clear_conflicts(root: &Path, relative: &str, stale: &AHashSet<&str>) -> Result<usize> {
    let mut current = root.to_path_buf();
    let mut parts = relative.split('/').peekable();

    while let Some(part) = parts.next() {
        current.push(part);
        let Ok(meta) = fs::symlink_metadata(&current) else {
            // Nothing further down can exist either
            return Ok(0);
        };

        if parts.peek().is_some() {
            if !meta.is_dir() {
                fs::remove_file(&current)
                    .with_storage(|| format!("Failed to replace {}", current.display()))?;
                return Ok(1);
            }
        } else if meta.is_dir() {
            let inner = format!("{relative}/");
            let mut removed = 0;
            for path in stale.iter().filter(|p| p.starts_with(&inner)) {
                let victim = root.join(path);
                if fs::symlink_metadata(&victim).is_ok_and(|m| !m.is_dir()) {
                    fs::remove_file(&victim).with_storage(|| format!("Failed to remove {path}"))?;
                    removed += 1;
                }
            }
            remove_empty_dirs(&current)?;
            fs::remove_dir(&current)
                .with_storage(|| format!("Failed to replace {}", current.display()))?;
            return Ok(removed);
        }
    }
    Ok(0)
}

/// Remove every empty directory below `dir`, deepest first
fn remove_empty_dirs(dir: &Path) -> Result<()> {
    let entries = fs::read_dir(dir).with_storage(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_storage(|| format!("Failed to read {}", dir.display()))?;
        let is_dir = entry
            .file_type()
            .with_storage(|| format!("Failed to stat {}", entry.path().display()))?
            .is_dir();
        if is_dir {
            let sub = entry.path();
            remove_empty_dirs(&sub)?;
            // Non-empty directories stay
            fs::remove_dir(&sub).ok();
        }
    }
    Ok(())
}

/// Drop directories emptied by a removal, stopping at the root
fn remove_empty_parents(root: &Path, path: &Path) {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if mode == 0 {
        return Ok(());
    }
    let current = fs::metadata(path)
        .with_storage(|| format!("Failed to stat {}", path.display()))?
        .permissions()
        .mode()
        & 0o7777;
    if current != mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_storage(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
