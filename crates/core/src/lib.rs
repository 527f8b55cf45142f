//! Undu Core - storage primitives for the undu checkpoint store
//!
//! This crate provides the foundational storage layer:
//! - BLAKE3 content hashing
//! - Content-addressed blob storage with compression
//! - Ignore patterns and the project file scanner
//! - Reserved directory layout and configuration
//! - The error taxonomy shared by every undu crate

pub mod blob;
pub mod config;
pub mod error;
pub mod hash;
pub mod ignore;
pub mod scan;
pub mod store;

// Re-export main types for convenience
pub use blob::ContentStore;
pub use config::{AutoSaveConfig, Config};
pub use error::{Error, NotFoundKind, Result, StorageContext};
pub use hash::{hash_bytes, hash_file, ContentHash};
pub use ignore::{IgnorePattern, IgnoreSet};
pub use scan::Scanner;
pub use store::{atomic_write, normalize_path, Layout, UNDU_DIR};
