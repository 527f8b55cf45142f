//! Reserved directory layout and filesystem helpers

use crate::error::{Error, Result, StorageContext};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Name of the reserved top-level directory
pub const UNDU_DIR: &str = ".undu";
pub const DB_DIR: &str = "undu.db";
pub const OBJECTS_DIR: &str = "objects";
pub const TMP_DIR: &str = "tmp";
pub const CONFIG_FILE: &str = "config.toml";

/// Paths inside a project's `.undu/` directory
///
/// ```text
/// .undu/
///   config.toml
///   undu.db/          checkpoint metadata (sled)
///   objects/<hh>/..   content blobs
///   tmp/              staging for atomic writes
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    undu_dir: PathBuf,
}

impl Layout {
    pub fn new(project_root: &Path) -> Self {
        Self {
            root: project_root.to_path_buf(),
            undu_dir: project_root.join(UNDU_DIR),
        }
    }

    /// Walk `start` and its ancestors until one contains `.undu/`
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = Some(start);
        while let Some(dir) = current {
            if dir.join(UNDU_DIR).is_dir() {
                return Ok(Self::new(dir));
            }
            current = dir.parent();
        }
        Err(Error::NotARepository(start.to_path_buf()))
    }

    /// Create the directory skeleton; fails if `.undu/` already exists
    pub fn create(&self) -> Result<()> {
        if self.undu_dir.exists() {
            return Err(Error::AlreadyInitialized(self.undu_dir.clone()));
        }
        fs::create_dir_all(&self.undu_dir).storage("Failed to create .undu directory")?;
        fs::create_dir_all(self.objects_dir()).storage("Failed to create objects directory")?;
        fs::create_dir_all(self.tmp_dir()).storage("Failed to create tmp directory")?;
        Ok(())
    }

    /// Fails with `NotARepository` unless `.undu/` exists
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.undu_dir.is_dir() {
            return Err(Error::NotARepository(self.root.clone()));
        }
        // Older or hand-pruned layouts may lack these
        fs::create_dir_all(self.objects_dir()).storage("Failed to create objects directory")?;
        fs::create_dir_all(self.tmp_dir()).storage("Failed to create tmp directory")?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn undu_dir(&self) -> &Path {
        &self.undu_dir
    }

    pub fn db_dir(&self) -> PathBuf {
        self.undu_dir.join(DB_DIR)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.undu_dir.join(OBJECTS_DIR)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.undu_dir.join(TMP_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.undu_dir.join(CONFIG_FILE)
    }

    /// Last path segment of the project root
    pub fn project_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Atomic write helper
///
/// Writes data to a temporary file, fsyncs it, then renames it to the
/// target path.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(tmp_dir)?;
    let temp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());

    let result = (|| -> std::io::Result<()> {
        let mut temp_file = fs::File::create(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        drop(temp_file);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&temp_path, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
        return result;
    }

    // Fsync parent directory for durability (best effort)
    if let Some(parent) = target.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Normalize a project-relative path for storage
///
/// - Rejects `..` and absolute paths
/// - Drops `.` components
/// - Joins with `/` regardless of platform
pub fn normalize_path(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::validation(format!(
                    "Path traversal not allowed: {}",
                    path.display()
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::validation(format!(
                    "Absolute paths not allowed: {}",
                    path.display()
                )))
            }
        }
    }
    if parts.is_empty() {
        return Err(Error::validation("Empty path"));
    }
    Ok(parts.join("/"))
}

/// Resolve a stored relative path under `root`, refusing anything that
/// would escape it
pub fn resolve_under(root: &Path, relative: &str) -> Result<PathBuf> {
    let normalized = normalize_path(Path::new(relative))?;
    Ok(root.join(normalized))
}
