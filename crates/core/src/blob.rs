//! Content store: immutable, deduplicated blobs addressed by hash

use crate::error::{Error, NotFoundKind, Result, StorageContext};
use crate::hash::{hash_bytes, ContentHash};
use crate::store::atomic_write;
use dashmap::DashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Blobs above this size are considered for zstd compression
const COMPRESSION_THRESHOLD: usize = 4096;

/// Width of the shard directory name, in hex characters
const SHARD_WIDTH: usize = 2;

/// Blob header format (version 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    /// Flags: bit0=compressed, bit1-7=reserved
    pub flags: u8,
    /// Original size (before compression)
    pub orig_len: u64,
    /// Stored size (after compression, if compressed)
    pub stored_len: u64,
}

impl BlobHeader {
    const MAGIC: [u8; 4] = *b"UDB1";
    const FLAG_COMPRESSED: u8 = 0b0000_0001;
    pub const LEN: usize = 21;

    pub fn new(orig_len: u64, stored_len: u64, compressed: bool) -> Self {
        let flags = if compressed { Self::FLAG_COMPRESSED } else { 0 };
        Self {
            flags,
            orig_len,
            stored_len,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & Self::FLAG_COMPRESSED) != 0
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut bytes = [0u8; Self::LEN];
        bytes[0..4].copy_from_slice(&Self::MAGIC);
        bytes[4] = self.flags;
        bytes[5..13].copy_from_slice(&self.orig_len.to_le_bytes());
        bytes[13..21].copy_from_slice(&self.stored_len.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < Self::LEN {
            return Err(format!(
                "invalid header length: expected at least {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ));
        }
        if bytes[0..4] != Self::MAGIC {
            return Err(format!("invalid magic bytes {:?}", &bytes[0..4]));
        }

        let mut orig = [0u8; 8];
        let mut stored = [0u8; 8];
        orig.copy_from_slice(&bytes[5..13]);
        stored.copy_from_slice(&bytes[13..21]);

        Ok(Self {
            flags: bytes[4],
            orig_len: u64::from_le_bytes(orig),
            stored_len: u64::from_le_bytes(stored),
        })
    }
}

/// Encode raw content as an on-disk blob (header + payload)
pub fn encode_blob(data: &[u8]) -> Vec<u8> {
    let compressed = if data.len() > COMPRESSION_THRESHOLD {
        // Only keep compression if it actually reduces size
        zstd::encode_all(data, 3)
            .ok()
            .filter(|c| c.len() < data.len())
    } else {
        None
    };

    let payload: &[u8] = compressed.as_deref().unwrap_or(data);
    let header = BlobHeader::new(data.len() as u64, payload.len() as u64, compressed.is_some());

    let mut out = Vec::with_capacity(BlobHeader::LEN + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decode an on-disk blob back into its original content
pub fn decode_blob(serialized: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let header = BlobHeader::from_bytes(serialized)?;
    let end = usize::try_from(header.stored_len)
        .ok()
        .and_then(|n| n.checked_add(BlobHeader::LEN))
        .filter(|&end| end <= serialized.len())
        .ok_or_else(|| {
            format!(
                "truncated blob: header claims {} payload bytes, got {}",
                header.stored_len,
                serialized.len().saturating_sub(BlobHeader::LEN)
            )
        })?;
    let payload = &serialized[BlobHeader::LEN..end];

    if !header.is_compressed() {
        if payload.len() as u64 != header.orig_len {
            return Err(format!(
                "size mismatch: expected {} bytes, got {}",
                header.orig_len,
                payload.len()
            ));
        }
        return Ok(payload.to_vec());
    }

    let data = zstd::decode_all(payload).map_err(|e| format!("zstd: {e}"))?;
    if data.len() as u64 != header.orig_len {
        return Err(format!(
            "decompressed size mismatch: expected {} bytes, got {}",
            header.orig_len,
            data.len()
        ));
    }
    Ok(data)
}

/// Content-addressed blob storage under `objects/<hh>/<rest>`
pub struct ContentStore {
    /// `objects/` directory
    objects_dir: PathBuf,
    /// Staging directory for atomic writes
    tmp_dir: PathBuf,
    /// Hashes known to be present on disk
    known: DashSet<ContentHash>,
}

impl ContentStore {
    pub fn new(objects_dir: PathBuf, tmp_dir: PathBuf) -> Self {
        Self {
            objects_dir,
            tmp_dir,
            known: DashSet::new(),
        }
    }

    /// Store `data` under `hash` unless a blob already exists there
    ///
    /// Duplicate writes are a no-op, never an error. The existing blob is
    /// not compared against `data`.
    pub fn put(&self, hash: ContentHash, data: &[u8]) -> Result<bool> {
        if self.contains(hash) {
            return Ok(false);
        }

        let path = self.blob_path(hash);
        let serialized = encode_blob(data);
        atomic_write(&self.tmp_dir, &path, &serialized)
            .with_storage(|| format!("Failed to write blob {hash}"))?;

        tracing::debug!(%hash, bytes = data.len(), "stored blob");
        self.known.insert(hash);
        Ok(true)
    }

    /// Hash and store `data`, returning its hash
    pub fn put_bytes(&self, data: &[u8]) -> Result<ContentHash> {
        let hash = hash_bytes(data);
        self.put(hash, data)?;
        Ok(hash)
    }

    /// Read a blob; `Ok(None)` if no blob exists for `hash`
    ///
    /// A blob whose decoded bytes do not hash back to `hash` is reported as
    /// a storage error (corruption).
    pub fn get(&self, hash: ContentHash) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(hash);
        let serialized = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_storage(|| format!("Failed to read blob {hash}")),
        };

        let data = decode_blob(&serialized)
            .map_err(|msg| Error::storage(format!("Corrupt blob {hash}"), msg))?;

        let actual = hash_bytes(&data);
        if actual != hash {
            return Err(Error::storage(
                format!("Corrupt blob {hash}"),
                format!("content hashes to {actual}"),
            ));
        }

        self.known.insert(hash);
        Ok(Some(data))
    }

    /// Read a blob, treating absence as `NotFound(blob)`
    pub fn require(&self, hash: ContentHash) -> Result<Vec<u8>> {
        self.get(hash)?
            .ok_or_else(|| Error::not_found(NotFoundKind::Blob, hash.to_hex()))
    }

    pub fn contains(&self, hash: ContentHash) -> bool {
        self.known.contains(&hash) || self.blob_path(hash).is_file()
    }

    /// Delete a blob; returns the number of bytes freed (0 if absent)
    pub fn remove(&self, hash: ContentHash) -> Result<u64> {
        self.known.remove(&hash);

        let path = self.blob_path(hash);
        let size = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).with_storage(|| format!("Failed to stat blob {hash}")),
        };
        fs::remove_file(&path).with_storage(|| format!("Failed to delete blob {hash}"))?;

        // Drop the shard directory once it is empty
        if let Some(shard) = path.parent() {
            let _ = fs::remove_dir(shard);
        }
        Ok(size)
    }

    /// Enumerate every stored blob hash by walking the shard directories
    pub fn list(&self) -> Result<Vec<ContentHash>> {
        let mut hashes = Vec::new();
        if !self.objects_dir.exists() {
            return Ok(hashes);
        }

        let shards = fs::read_dir(&self.objects_dir).storage("Failed to list objects")?;
        for shard in shards {
            let shard = shard.storage("Failed to list objects")?;
            if !shard.path().is_dir() {
                continue;
            }
            let prefix = shard.file_name().to_string_lossy().to_string();

            for entry in fs::read_dir(shard.path()).storage("Failed to list shard")? {
                let entry = entry.storage("Failed to list shard")?;
                let rest = entry.file_name().to_string_lossy().to_string();
                // Anything that isn't a well-formed hash is not ours
                if let Ok(hash) = ContentHash::from_hex(&format!("{prefix}{rest}")) {
                    hashes.push(hash);
                }
            }
        }

        hashes.sort();
        Ok(hashes)
    }

    /// Filesystem path for a blob: first two hex chars shard, rest is name
    pub fn blob_path(&self, hash: ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        let (prefix, rest) = hex.split_at(SHARD_WIDTH);
        self.objects_dir.join(prefix).join(rest)
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store(root: &Path) -> ContentStore {
        ContentStore::new(root.join("objects"), root.join("tmp"))
    }

    #[test]
    fn test_blob_header_serialization() {
        let header = BlobHeader::new(1000, 500, true);
        let parsed = BlobHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(header, parsed);
        assert!(parsed.is_compressed());
    }

    #[test]
    fn test_blob_header_magic_validation() {
        let mut bytes = BlobHeader::new(1, 1, false).to_bytes();
        bytes[0..4].copy_from_slice(b"BADM");
        assert!(BlobHeader::from_bytes(&bytes).is_err());
        assert!(BlobHeader::from_bytes(&bytes[..10]).is_err());
    }

    #[test]
    fn test_small_blob_stays_uncompressed() {
        let data = b"hello world";
        let encoded = encode_blob(data);
        let header = BlobHeader::from_bytes(&encoded).unwrap();
        assert!(!header.is_compressed());
        assert_eq!(decode_blob(&encoded).unwrap(), data);
    }

    #[test]
    fn test_large_compressible_blob_is_compressed() {
        let data = b"hello world ".repeat(1000);
        let encoded = encode_blob(&data);
        assert!(BlobHeader::from_bytes(&encoded).unwrap().is_compressed());
        assert!(encoded.len() < data.len());
        assert_eq!(decode_blob(&encoded).unwrap(), data);
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        let encoded = encode_blob(b"some content here");
        assert!(decode_blob(&encoded[..encoded.len() - 3]).is_err());
    }

    #[test]
    fn test_oversized_stored_len_is_rejected() {
        let corrupt = [&BlobHeader::new(1, u64::MAX, false).to_bytes()[..], b"x"].concat();
        let err = decode_blob(&corrupt).unwrap_err();
        assert!(err.contains("truncated blob"));

        let corrupt = [&BlobHeader::new(1, u64::MAX - 10, true).to_bytes()[..], b"x"].concat();
        assert!(decode_blob(&corrupt).is_err());
    }

    #[test]
    fn test_uncompressed_length_mismatch_is_rejected() {
        let corrupt = [&BlobHeader::new(5, 1, false).to_bytes()[..], b"x"].concat();
        assert!(decode_blob(&corrupt).unwrap_err().contains("size mismatch"));
    }

    #[test]
    fn test_corrupt_header_on_disk_is_storage_error() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = test_store(temp_dir.path());
        let hash = store.put_bytes(b"soon corrupt")?;

        let corrupt = [&BlobHeader::new(12, u64::MAX, false).to_bytes()[..], b"soon"].concat();
        fs::write(store.blob_path(hash), corrupt)?;

        let err = store.get(hash).unwrap_err();
        assert_eq!(err.code(), "storage");
        Ok(())
    }

    #[test]
    fn test_put_get() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = test_store(temp_dir.path());

        let hash = store.put_bytes(b"test data for blob store")?;
        assert_eq!(store.get(hash)?.as_deref(), Some(&b"test data for blob store"[..]));
        Ok(())
    }

    #[test]
    fn test_put_is_idempotent() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = test_store(temp_dir.path());

        let hash = hash_bytes(b"test data");
        assert!(store.put(hash, b"test data")?);
        assert!(!store.put(hash, b"test data")?);
        assert!(!store.put(hash, b"test data")?);
        assert_eq!(store.list()?, vec![hash]);
        Ok(())
    }

    #[test]
    fn test_get_unknown_hash_is_none() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = test_store(temp_dir.path());

        let fake = ContentHash::from_bytes([0xFF; 32]);
        assert!(store.get(fake)?.is_none());
        assert!(store.require(fake).unwrap_err().is_not_found());
        Ok(())
    }

    #[test]
    fn test_sharded_layout() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = test_store(temp_dir.path());

        let hash = store.put_bytes(b"layout")?;
        let hex = hash.to_hex();
        let expected = temp_dir.path().join("objects").join(&hex[..2]).join(&hex[2..]);
        assert!(expected.is_file());
        Ok(())
    }

    #[test]
    fn test_corrupt_blob_is_storage_error() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = test_store(temp_dir.path());

        let hash = store.put_bytes(b"original")?;
        std::fs::write(store.blob_path(hash), encode_blob(b"tampered"))?;

        let err = store.get(hash).unwrap_err();
        assert_eq!(err.code(), "storage");
        Ok(())
    }

    #[test]
    fn test_remove_frees_blob() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = test_store(temp_dir.path());

        let hash = store.put_bytes(b"short lived")?;
        assert!(store.remove(hash)? > 0);
        assert!(!store.contains(hash));
        assert!(store.get(hash)?.is_none());
        assert_eq!(store.remove(hash)?, 0);
        Ok(())
    }

    #[test]
    fn test_empty_blob() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = test_store(temp_dir.path());

        let hash = store.put_bytes(b"")?;
        assert_eq!(store.get(hash)?, Some(Vec::new()));
        Ok(())
    }
}
