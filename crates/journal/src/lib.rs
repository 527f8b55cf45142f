//! Checkpoint repository and retention for undu
//!
//! This crate provides:
//! - Checkpoint data structures
//! - Checkpoint repository (sled embedded DB)
//! - Retention policy & blob GC

pub mod checkpoint;
pub mod journal;
pub mod retention;

// Re-exports
pub use checkpoint::{now_ms, Checkpoint, CheckpointId, FileSnapshot};
pub use journal::{CheckpointRecord, Journal};
pub use retention::{Bucket, GarbageCollector, GcReport, RetentionPolicy};
