//! Working-tree manifests
//!
//! Hashing fans out over rayon. A file that disappears between the scan and
//! the read is skipped with a warning; any other read failure is an error.

use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use undu_core::{hash_bytes, hash_file, ContentStore, Result, Scanner, StorageContext};
use undu_journal::FileSnapshot;

/// Permission bits recorded for a file
#[cfg(unix)]
pub fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
pub fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Manifest of the live tree, hashing only
pub fn capture(scanner: &Scanner) -> Result<Vec<FileSnapshot>> {
    collect(scanner, None)
}

/// Manifest of the live tree, storing every novel blob along the way
pub fn capture_into(scanner: &Scanner, store: &ContentStore) -> Result<Vec<FileSnapshot>> {
    collect(scanner, Some(store))
}

fn collect(scanner: &Scanner, store: Option<&ContentStore>) -> Result<Vec<FileSnapshot>> {
    let root = scanner.root();
    let paths = scanner.scan()?;

    let snapshots = paths
        .par_iter()
        .map(|relative| snapshot_file(root, relative, store))
        .collect::<Result<Vec<_>>>()?;

    Ok(snapshots.into_iter().flatten().collect())
}

fn snapshot_file(
    root: &Path,
    relative: &str,
    store: Option<&ContentStore>,
) -> Result<Option<FileSnapshot>> {
    let full = root.join(relative);
    let meta = match fs::metadata(&full) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = relative, "file vanished during scan, skipping");
            return Ok(None);
        }
        Err(e) => return Err(e).with_storage(|| format!("Failed to stat {relative}")),
    };

    let (hash, size) = match store {
        Some(store) => {
            let data = match fs::read(&full) {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::warn!(path = relative, "file vanished during scan, skipping");
                    return Ok(None);
                }
                Err(e) => return Err(e).with_storage(|| format!("Failed to read {relative}")),
            };
            let hash = hash_bytes(&data);
            store.put(hash, &data)?;
            (hash, data.len() as u64)
        }
        None => (hash_file(&full)?, meta.len()),
    };

    Ok(Some(FileSnapshot {
        path: relative.to_string(),
        hash,
        size,
        mode: file_mode(&meta),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use undu_core::IgnoreSet;

    #[test]
    fn test_capture_hashes_tracked_files() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        fs::create_dir_all(temp_dir.path().join("src"))?;
        fs::write(temp_dir.path().join("src/main.rs"), "fn main() {}")?;
        fs::write(temp_dir.path().join("debug.log"), "noise")?;

        let scanner = Scanner::new(temp_dir.path(), IgnoreSet::new(["*.log"]));
        let manifest = capture(&scanner)?;

        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest[0].path, "src/main.rs");
        assert_eq!(manifest[0].hash, hash_bytes(b"fn main() {}"));
        assert_eq!(manifest[0].size, 12);
        Ok(())
    }

    #[test]
    fn test_capture_into_stores_blobs_once() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let project = temp_dir.path().join("project");
        fs::create_dir_all(&project)?;
        fs::write(project.join("a.txt"), "same")?;
        fs::write(project.join("b.txt"), "same")?;

        let store = ContentStore::new(temp_dir.path().join("objects"), temp_dir.path().join("tmp"));
        let manifest = capture_into(&Scanner::new(&project, IgnoreSet::default()), &store)?;

        assert_eq!(manifest.len(), 2);
        assert_eq!(store.list()?, vec![hash_bytes(b"same")]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_records_mode() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir()?;
        let script = temp_dir.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n")?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

        let manifest = capture(&Scanner::new(temp_dir.path(), IgnoreSet::default()))?;
        assert_eq!(manifest[0].mode, 0o755);
        Ok(())
    }
}
