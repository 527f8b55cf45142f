//! Checkpoint repository backed by sled
//!
//! Trees:
//! - `checkpoints`: big-endian insertion sequence -> [`CheckpointRecord`]
//! - `files`: `<checkpoint id>\0<path>` -> [`FileSnapshot`]
//! - `state`: `current` -> checkpoint id
//!
//! Every multi-row mutation runs in one sled transaction across the three
//! trees, so a checkpoint and its manifest are visible together or not at
//! all.

use crate::checkpoint::{Checkpoint, CheckpointId, FileSnapshot};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Transactional, Tree};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use undu_core::{ContentHash, Error, NotFoundKind, Result, StorageContext};

const CURRENT_KEY: &[u8] = b"current";

/// Checkpoint row without its manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
    pub id: CheckpointId,
    pub message: String,
    pub timestamp: u64,
    pub is_auto_save: bool,
    pub parent_id: Option<CheckpointId>,
}

impl CheckpointRecord {
    pub fn of(checkpoint: &Checkpoint) -> Self {
        Self {
            id: checkpoint.id.clone(),
            message: checkpoint.message.clone(),
            timestamp: checkpoint.timestamp,
            is_auto_save: checkpoint.is_auto_save,
            parent_id: checkpoint.parent_id.clone(),
        }
    }

    pub fn with_files(self, files: Vec<FileSnapshot>) -> Checkpoint {
        Checkpoint {
            id: self.id,
            message: self.message,
            timestamp: self.timestamp,
            is_auto_save: self.is_auto_save,
            parent_id: self.parent_id,
            files,
        }
    }
}

/// Persistent store of checkpoints, their manifests, and the current pointer
pub struct Journal {
    db: sled::Db,
    checkpoints: Tree,
    files: Tree,
    state: Tree,
    /// In-memory index: checkpoint id -> sequence number
    index: RwLock<HashMap<CheckpointId, u64>>,
    /// Monotonic sequence counter
    seq_counter: AtomicU64,
}

impl Journal {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)
            .with_storage(|| format!("Failed to open checkpoint database {}", path.display()))?;
        let checkpoints = db.open_tree("checkpoints").storage("Failed to open checkpoints tree")?;
        let files = db.open_tree("files").storage("Failed to open files tree")?;
        let state = db.open_tree("state").storage("Failed to open state tree")?;

        // Build in-memory index on startup
        let mut index = HashMap::new();
        let mut max_seq = 0u64;
        for item in checkpoints.iter() {
            let (key, value) = item.storage("Failed to read checkpoints")?;
            let seq = decode_seq(&key)?;
            let record = decode_record(&value)?;
            index.insert(record.id, seq);
            max_seq = max_seq.max(seq);
        }

        Ok(Self {
            db,
            checkpoints,
            files,
            state,
            index: RwLock::new(index),
            seq_counter: AtomicU64::new(max_seq + 1),
        })
    }

    /// Persist a checkpoint and its manifest as one unit
    pub fn insert(&self, checkpoint: &Checkpoint) -> Result<u64> {
        self.write_checkpoint(checkpoint, false)
    }

    /// Persist a checkpoint and point `current` at it, as one unit
    pub fn insert_as_current(&self, checkpoint: &Checkpoint) -> Result<u64> {
        self.write_checkpoint(checkpoint, true)
    }

    fn write_checkpoint(&self, checkpoint: &Checkpoint, make_current: bool) -> Result<u64> {
        if self.index.read().contains_key(&checkpoint.id) {
            return Err(Error::validation(format!(
                "Checkpoint {} already exists",
                checkpoint.id
            )));
        }

        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let key = seq.to_be_bytes().to_vec();
        let record = encode(&CheckpointRecord::of(checkpoint))?;
        let mut rows = Vec::with_capacity(checkpoint.files.len());
        for file in &checkpoint.files {
            rows.push((file_key(&checkpoint.id, &file.path), encode(file)?));
        }
        let id_bytes = checkpoint.id.as_str().as_bytes().to_vec();

        let result: TransactionResult<(), ()> = (&self.checkpoints, &self.files, &self.state)
            .transaction(|(cps, files, state)| {
                cps.insert(key.clone(), record.clone())?;
                for (file_key, row) in &rows {
                    files.insert(file_key.clone(), row.clone())?;
                }
                if make_current {
                    state.insert(CURRENT_KEY, id_bytes.clone())?;
                }
                Ok(())
            });
        result.map_err(|e| tx_error("Failed to persist checkpoint", e))?;
        self.flush()?;

        self.index.write().insert(checkpoint.id.clone(), seq);
        tracing::debug!(id = %checkpoint.id, seq, files = checkpoint.files.len(), "checkpoint persisted");
        Ok(seq)
    }

    /// Move the current pointer; the target must exist
    pub fn set_current(&self, id: &CheckpointId) -> Result<()> {
        if !self.index.read().contains_key(id) {
            return Err(Error::not_found(NotFoundKind::Checkpoint, id.as_str()));
        }
        self.state
            .insert(CURRENT_KEY, id.as_str().as_bytes())
            .storage("Failed to update current checkpoint")?;
        self.flush()
    }

    pub fn current_id(&self) -> Result<Option<CheckpointId>> {
        let value = self.state.get(CURRENT_KEY).storage("Failed to read current checkpoint")?;
        match value {
            Some(bytes) => {
                let id = std::str::from_utf8(&bytes)
                    .map_err(|e| Error::storage("Corrupt current pointer", e.to_string()))?;
                Ok(Some(CheckpointId::from_string(id)))
            }
            None => Ok(None),
        }
    }

    pub fn get_current(&self) -> Result<Option<Checkpoint>> {
        match self.current_id()? {
            Some(id) => self.find_by_id(id.as_str()),
            None => Ok(None),
        }
    }

    /// Exact id lookup
    pub fn find_by_id(&self, id: &str) -> Result<Option<Checkpoint>> {
        let id = CheckpointId::from_string(id);
        let seq = match self.index.read().get(&id) {
            Some(&seq) => seq,
            None => return Ok(None),
        };
        let value = match self
            .checkpoints
            .get(seq.to_be_bytes())
            .storage("Failed to read checkpoint")?
        {
            Some(v) => v,
            None => return Ok(None),
        };
        let record = decode_record(&value)?;
        let files = self.manifest(&record.id)?;
        Ok(Some(record.with_files(files)))
    }

    /// Resolve by id, then case-insensitive exact message, then
    /// case-insensitive substring
    ///
    /// Ties within a tier go to the most recent checkpoint.
    pub fn find_by_message(&self, text: &str) -> Result<Option<Checkpoint>> {
        if let Some(checkpoint) = self.find_by_id(text)? {
            return Ok(Some(checkpoint));
        }

        let needle = text.to_lowercase();
        let records = self.records()?;

        let matched = records
            .iter()
            .find(|r| r.message.to_lowercase() == needle)
            .or_else(|| records.iter().find(|r| r.message.to_lowercase().contains(&needle)));

        match matched {
            Some(record) => {
                let files = self.manifest(&record.id)?;
                Ok(Some(record.clone().with_files(files)))
            }
            None => Ok(None),
        }
    }

    /// Every checkpoint with its manifest, newest first
    pub fn list_all(&self) -> Result<Vec<Checkpoint>> {
        let mut checkpoints = Vec::new();
        for record in self.records()? {
            let files = self.manifest(&record.id)?;
            checkpoints.push(record.with_files(files));
        }
        Ok(checkpoints)
    }

    /// Every checkpoint row without manifests, newest first
    ///
    /// Ordered by timestamp, then by insertion order for equal timestamps.
    pub fn records(&self) -> Result<Vec<CheckpointRecord>> {
        let mut rows = Vec::new();
        for item in self.checkpoints.iter() {
            let (key, value) = item.storage("Failed to read checkpoints")?;
            rows.push((decode_seq(&key)?, decode_record(&value)?));
        }
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.timestamp.cmp(&a.timestamp).then(seq_b.cmp(seq_a))
        });
        Ok(rows.into_iter().map(|(_, record)| record).collect())
    }

    /// Manifest rows for one checkpoint, sorted by path
    pub fn manifest(&self, id: &CheckpointId) -> Result<Vec<FileSnapshot>> {
        let mut files = Vec::new();
        for item in self.files.scan_prefix(manifest_prefix(id)) {
            let (_, value) = item.storage("Failed to read manifest")?;
            files.push(decode_file(&value)?);
        }
        // Keys share the prefix, so sled order is already path order
        Ok(files)
    }

    /// Single manifest row lookup
    pub fn file_at(&self, id: &CheckpointId, path: &str) -> Result<Option<FileSnapshot>> {
        match self.files.get(file_key(id, path)).storage("Failed to read manifest")? {
            Some(value) => Ok(Some(decode_file(&value)?)),
            None => Ok(None),
        }
    }

    /// Every content hash referenced by any manifest
    pub fn referenced_hashes(&self) -> Result<HashSet<ContentHash>> {
        let mut hashes = HashSet::new();
        for item in self.files.iter() {
            let (_, value) = item.storage("Failed to read manifest")?;
            hashes.insert(decode_file(&value)?.hash);
        }
        Ok(hashes)
    }

    /// Delete a checkpoint and its manifest rows
    ///
    /// Children of the deleted checkpoint are re-linked to its parent so the
    /// chain stays connected. Deleting an unknown id is a no-op returning
    /// `false`; deleting the current checkpoint is refused.
    pub fn delete(&self, id: &CheckpointId) -> Result<bool> {
        let seq = match self.index.read().get(id) {
            Some(&seq) => seq,
            None => return Ok(false),
        };
        if self.current_id()?.as_ref() == Some(id) {
            return Err(Error::validation(format!(
                "Cannot delete the current checkpoint {id}"
            )));
        }

        let key = seq.to_be_bytes().to_vec();
        let deleted = match self.checkpoints.get(&key).storage("Failed to read checkpoint")? {
            Some(value) => decode_record(&value)?,
            None => return Ok(false),
        };

        let mut file_keys = Vec::new();
        for item in self.files.scan_prefix(manifest_prefix(id)) {
            let (k, _) = item.storage("Failed to read manifest")?;
            file_keys.push(k.to_vec());
        }

        let mut relinked = Vec::new();
        for item in self.checkpoints.iter() {
            let (k, value) = item.storage("Failed to read checkpoints")?;
            let mut record = decode_record(&value)?;
            if record.parent_id.as_ref() == Some(id) {
                record.parent_id = deleted.parent_id.clone();
                relinked.push((k.to_vec(), encode(&record)?));
            }
        }

        let result: TransactionResult<(), ()> =
            (&self.checkpoints, &self.files).transaction(|(cps, files)| {
                cps.remove(key.clone())?;
                for file_key in &file_keys {
                    files.remove(file_key.clone())?;
                }
                for (child_key, child) in &relinked {
                    cps.insert(child_key.clone(), child.clone())?;
                }
                Ok(())
            });
        result.map_err(|e| tx_error("Failed to delete checkpoint", e))?;
        self.flush()?;

        self.index.write().remove(id);
        tracing::debug!(%id, relinked = relinked.len(), "checkpoint deleted");
        Ok(true)
    }

    /// Total number of checkpoints
    pub fn count(&self) -> usize {
        self.index.read().len()
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().storage("Failed to flush checkpoint database")?;
        Ok(())
    }
}

fn manifest_prefix(id: &CheckpointId) -> Vec<u8> {
    let mut prefix = id.as_str().as_bytes().to_vec();
    prefix.push(0);
    prefix
}

fn file_key(id: &CheckpointId, path: &str) -> Vec<u8> {
    let mut key = manifest_prefix(id);
    key.extend_from_slice(path.as_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).storage("Failed to encode record")
}

fn decode_record(bytes: &[u8]) -> Result<CheckpointRecord> {
    bincode::deserialize(bytes).storage("Corrupt checkpoint record")
}

fn decode_file(bytes: &[u8]) -> Result<FileSnapshot> {
    bincode::deserialize(bytes).storage("Corrupt manifest row")
}

fn decode_seq(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| Error::storage("Corrupt checkpoint key", format!("{} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn tx_error(context: &str, e: TransactionError<()>) -> Error {
    match e {
        TransactionError::Storage(source) => Error::Storage {
            context: context.to_string(),
            source: Box::new(source),
        },
        TransactionError::Abort(()) => Error::storage(context, "transaction aborted"),
    }
}
