//! BLAKE3 hashing primitives for content-addressed storage

use crate::error::{Error, Result, StorageContext};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Files larger than this are hashed through a memory map
const MMAP_THRESHOLD: u64 = 4 * 1024 * 1024;

/// A BLAKE3 content hash (32 bytes), rendered as 64 lowercase hex chars
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64 character hex string (either case)
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 64 {
            return Err(Error::validation(format!(
                "Invalid hash length: expected 64 characters, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::validation(format!("Invalid hash {s:?}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for ContentHash {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        ContentHash::from_hex(&s)
    }
}

/// Hash bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    ContentHash::from_bytes(*blake3::hash(data).as_bytes())
}

/// Hash a file without loading it fully into memory
///
/// Large files go through a memory map, small ones through a buffered
/// streaming read.
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    let len = std::fs::metadata(path)
        .with_storage(|| format!("Failed to stat {}", path.display()))?
        .len();

    let mut hasher = blake3::Hasher::new();
    if len > MMAP_THRESHOLD {
        hasher
            .update_mmap(path)
            .with_storage(|| format!("Failed to map {}", path.display()))?;
    } else {
        let file = std::fs::File::open(path)
            .with_storage(|| format!("Failed to open {}", path.display()))?;
        hasher
            .update_reader(std::io::BufReader::new(file))
            .with_storage(|| format!("Failed to read {}", path.display()))?;
    }
    Ok(ContentHash::from_bytes(*hasher.finalize().as_bytes()))
}
