//! Set-difference between two manifests

use serde::Serialize;
use std::collections::BTreeMap;
use undu_core::ContentHash;
use undu_journal::{CheckpointRecord, FileSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One path's transition between two manifests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_hash: Option<ContentHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<ContentHash>,
}

impl FileChange {
    /// The same change seen from the other side
    pub fn inverted(&self) -> Self {
        let kind = match self.kind {
            ChangeKind::Added => ChangeKind::Deleted,
            ChangeKind::Deleted => ChangeKind::Added,
            ChangeKind::Modified => ChangeKind::Modified,
        };
        Self {
            path: self.path.clone(),
            kind,
            old_hash: self.new_hash,
            new_hash: self.old_hash,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub files_changed: usize,
    pub additions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    pub fn of(changes: &[FileChange]) -> Self {
        Self {
            files_changed: changes.len(),
            additions: changes.iter().filter(|c| c.kind == ChangeKind::Added).count(),
            deletions: changes.iter().filter(|c| c.kind == ChangeKind::Deleted).count(),
        }
    }
}

/// Changes between two states; `to == None` means the working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    pub from: Option<CheckpointRecord>,
    pub to: Option<CheckpointRecord>,
    pub changes: Vec<FileChange>,
    pub summary: DiffSummary,
}

/// Classify every path in the union of `from` and `to`, ordered by path
pub fn compare(from: &[FileSnapshot], to: &[FileSnapshot]) -> Vec<FileChange> {
    let mut sides: BTreeMap<&str, (Option<ContentHash>, Option<ContentHash>)> = BTreeMap::new();
    for file in from {
        sides.entry(file.path.as_str()).or_default().0 = Some(file.hash);
    }
    for file in to {
        sides.entry(file.path.as_str()).or_default().1 = Some(file.hash);
    }

    sides
        .into_iter()
        .filter_map(|(path, (old, new))| {
            let kind = match (old, new) {
                (None, Some(_)) => ChangeKind::Added,
                (Some(_), None) => ChangeKind::Deleted,
                (Some(a), Some(b)) if a != b => ChangeKind::Modified,
                _ => return None,
            };
            Some(FileChange {
                path: path.to_string(),
                kind,
                old_hash: old,
                new_hash: new,
            })
        })
        .collect()
}
