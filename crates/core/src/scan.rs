//! File scanner: enumerates tracked files under a project root

use crate::error::{Error, Result};
use crate::ignore::IgnoreSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Walks a project tree, pruning ignored directories
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    ignore: IgnoreSet,
}

impl Scanner {
    pub fn new(root: &Path, ignore: IgnoreSet) -> Self {
        Self {
            root: root.to_path_buf(),
            ignore,
        }
    }

    /// Relative, `/`-separated paths of every regular, non-ignored file,
    /// sorted
    ///
    /// Symlinks and other special files are skipped. The scanner never
    /// descends into an ignored directory.
    pub fn scan(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match relative(&self.root, entry.path()) {
                Some(rel) => !self.ignore.is_ignored(&rel),
                None => false,
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                Error::Storage {
                    context: format!("Failed to scan {path}"),
                    source: Box::new(e),
                }
            })?;

            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(rel) = relative(&self.root, entry.path()) {
                files.push(rel);
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn is_ignored(&self, relative_path: &str) -> bool {
        self.ignore.is_ignored(relative_path)
    }

    /// Convert an absolute path under the root into its tracked form
    pub fn relativize(&self, path: &Path) -> Option<String> {
        relative(&self.root, path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
