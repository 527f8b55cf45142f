//! Checkpoint data structures

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use undu_core::{hash_bytes, ContentHash};

/// Opaque checkpoint identifier: 16 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(String);

impl CheckpointId {
    pub const LEN: usize = 16;

    /// Derive a fresh id from the message, the timestamp and a random
    /// factor, so two saves with equal message and time still differ
    pub fn generate(message: &str, timestamp_ms: u64) -> Self {
        let seed = format!("{message}-{timestamp_ms}-{}", uuid::Uuid::new_v4());
        let hex = hash_bytes(seed.as_bytes()).to_hex();
        Self(hex[..Self::LEN].to_string())
    }

    /// Wrap an id read back from storage or from a caller
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `n` characters, for display
    pub fn short(&self, n: usize) -> &str {
        &self.0[..n.min(self.0.len())]
    }
}

impl std::fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One file's recorded identity inside a checkpoint's manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    /// Project-relative, `/`-separated
    pub path: String,
    pub hash: ContentHash,
    pub size: u64,
    /// Permission bits at capture time
    pub mode: u32,
}

/// An immutable record of project state at a moment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub message: String,
    /// Unix milliseconds
    pub timestamp: u64,
    pub is_auto_save: bool,
    pub parent_id: Option<CheckpointId>,
    /// Complete manifest, sorted by path
    pub files: Vec<FileSnapshot>,
}

impl Checkpoint {
    pub fn new(
        message: impl Into<String>,
        timestamp: u64,
        is_auto_save: bool,
        parent_id: Option<CheckpointId>,
        mut files: Vec<FileSnapshot>,
    ) -> Self {
        let message = message.into();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            id: CheckpointId::generate(&message, timestamp),
            message,
            timestamp,
            is_auto_save,
            parent_id,
            files,
        }
    }

    pub fn file(&self, path: &str) -> Option<&FileSnapshot> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|idx| &self.files[idx])
    }

    /// Sum of recorded file sizes
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Current wall clock in Unix milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(path: &str, content: &[u8]) -> FileSnapshot {
        FileSnapshot {
            path: path.to_string(),
            hash: hash_bytes(content),
            size: content.len() as u64,
            mode: 0o644,
        }
    }

    #[test]
    fn test_ids_are_short_lowercase_hex() {
        let id = CheckpointId::generate("first", 1_700_000_000_000);
        assert_eq!(id.as_str().len(), CheckpointId::LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let a = CheckpointId::generate("same", 42);
        let b = CheckpointId::generate("same", 42);
        assert_ne!(a, b);
    }

    #[test]
    fn test_manifest_sorted_and_searchable() {
        let cp = Checkpoint::new(
            "manifest",
            1,
            false,
            None,
            vec![snapshot("b.txt", b"b"), snapshot("a.txt", b"a")],
        );
        assert_eq!(cp.files[0].path, "a.txt");
        assert_eq!(cp.file("b.txt").map(|f| f.size), Some(1));
        assert!(cp.file("c.txt").is_none());
        assert_eq!(cp.total_size(), 2);
    }

    #[test]
    fn test_json_shape() {
        let cp = Checkpoint::new("json", 7, true, None, vec![]);
        let value = serde_json::to_value(&cp).unwrap();
        assert_eq!(value["message"], "json");
        assert_eq!(value["timestamp"], 7);
        assert_eq!(value["isAutoSave"], true);
        assert!(value["parentId"].is_null());
        assert_eq!(value["id"], cp.id.as_str());
    }

    #[test]
    fn test_short_id() {
        let id = CheckpointId::from_string("0123456789abcdef");
        assert_eq!(id.short(8), "01234567");
        assert_eq!(id.short(100), "0123456789abcdef");
    }
}
