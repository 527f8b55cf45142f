//! Integration tests for journal crate

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use tempfile::TempDir;
use undu_core::{hash_bytes, ContentStore};
use undu_journal::{
    Checkpoint, CheckpointId, CheckpointRecord, FileSnapshot, GarbageCollector, Journal,
    RetentionPolicy,
};

const MINUTE: u64 = 60 * 1000;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

fn store_file(store: &ContentStore, path: &str, content: &[u8]) -> anyhow::Result<FileSnapshot> {
    let hash = store.put_bytes(content)?;
    Ok(FileSnapshot {
        path: path.to_string(),
        hash,
        size: content.len() as u64,
        mode: 0o644,
    })
}

fn open(temp_dir: &TempDir) -> anyhow::Result<(Journal, ContentStore)> {
    let journal = Journal::open(&temp_dir.path().join("undu.db"))?;
    let store = ContentStore::new(temp_dir.path().join("objects"), temp_dir.path().join("tmp"));
    Ok((journal, store))
}

#[test]
fn test_gc_deletes_candidates_and_unreferenced_blobs() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let (journal, store) = open(&temp_dir)?;
    let now = 30 * DAY;

    // Two auto-saves two minutes apart, three hours ago. The older one only
    // differs by a file nobody else references.
    let shared = store_file(&store, "shared.txt", b"shared")?;
    let unique = store_file(&store, "unique.txt", b"only in the old auto-save")?;

    let old = Checkpoint::new("Auto-save", now - 3 * HOUR - 2 * MINUTE, true, None, vec![shared.clone(), unique]);
    let newer = Checkpoint::new("Auto-save", now - 3 * HOUR, true, Some(old.id.clone()), vec![shared.clone()]);
    let named = Checkpoint::new("release", now - 10 * MINUTE, false, Some(newer.id.clone()), vec![shared.clone()]);
    journal.insert(&old)?;
    journal.insert(&newer)?;
    journal.insert_as_current(&named)?;

    let gc = GarbageCollector::new(RetentionPolicy::default());
    assert_eq!(gc.plan(&journal, now)?, vec![old.id.clone()]);

    let report = gc.collect(&journal, &store, now)?;
    assert_eq!(report.deleted, vec![old.id.clone()]);
    assert_eq!(report.blobs_deleted, 1);
    assert!(report.bytes_freed > 0);

    assert!(journal.find_by_id(old.id.as_str())?.is_none());
    assert_eq!(store.list()?, vec![shared.hash]);

    // The surviving auto-save was re-linked past the deleted one
    let newer_now = journal.find_by_id(newer.id.as_str())?.expect("survivor");
    assert_eq!(newer_now.parent_id, None);

    // Idempotent
    let again = gc.collect(&journal, &store, now)?;
    assert!(again.deleted.is_empty());
    assert_eq!(again.blobs_deleted, 0);
    Ok(())
}

#[test]
fn test_gc_keeps_blobs_shared_with_named_checkpoints() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let (journal, store) = open(&temp_dir)?;
    let now = 30 * DAY;

    let file = store_file(&store, "a.txt", b"same bytes")?;
    let named = Checkpoint::new("named", now - 2 * DAY, false, None, vec![file.clone()]);
    let a = Checkpoint::new("Auto-save", now - 2 * HOUR - MINUTE, true, Some(named.id.clone()), vec![file.clone()]);
    let b = Checkpoint::new("Auto-save", now - 2 * HOUR, true, Some(a.id.clone()), vec![file.clone()]);
    journal.insert(&a)?;
    journal.insert(&b)?;
    journal.insert_as_current(&named)?;

    let report = GarbageCollector::new(RetentionPolicy::default()).collect(&journal, &store, now)?;
    assert_eq!(report.deleted, vec![a.id.clone()]);
    assert_eq!(report.blobs_deleted, 0);
    assert!(store.contains(file.hash));
    Ok(())
}

#[test]
fn test_gc_never_touches_current() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let (journal, store) = open(&temp_dir)?;
    let now = 30 * DAY;

    let file = store_file(&store, "a.txt", b"x")?;
    let newest = Checkpoint::new("Auto-save", now - 2 * HOUR, true, None, vec![file.clone()]);
    let current = Checkpoint::new("Auto-save", now - 2 * HOUR - MINUTE, true, None, vec![file]);
    journal.insert(&newest)?;
    journal.insert(&current)?;
    journal.set_current(&current.id)?;

    let report = GarbageCollector::new(RetentionPolicy::default()).collect(&journal, &store, now)?;
    assert!(report.deleted.is_empty());
    assert_eq!(journal.count(), 2);
    Ok(())
}

#[test]
fn test_retention_monotonicity_over_random_timelines() {
    let policy = RetentionPolicy::default();
    let now = 400 * DAY;

    for seed in 0..32u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let count = rng.gen_range(1..400);
        let records: Vec<CheckpointRecord> = (0..count)
            .map(|n| CheckpointRecord {
                id: CheckpointId::from_string(format!("{n:016x}")),
                message: "Auto-save".to_string(),
                timestamp: now - rng.gen_range(0..90 * DAY),
                is_auto_save: true,
                parent_id: None,
            })
            .collect();

        let doomed: HashSet<CheckpointId> = policy.plan(&records, None, now).into_iter().collect();

        for (index, bucket) in policy.buckets.iter().enumerate() {
            let mut members: Vec<&CheckpointRecord> = records
                .iter()
                .filter(|r| policy.bucket_for(now - r.timestamp) == index)
                .collect();
            if members.is_empty() {
                continue;
            }
            members.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

            let survivors: Vec<u64> = members
                .iter()
                .filter(|r| !doomed.contains(&r.id))
                .map(|r| r.timestamp)
                .collect();

            assert_eq!(
                survivors.first(),
                Some(&members[0].timestamp),
                "seed {seed}: newest in bucket {index} must survive"
            );
            for pair in survivors.windows(2) {
                assert!(
                    pair[0] - pair[1] >= bucket.interval_ms,
                    "seed {seed}: survivors {} and {} closer than {} in bucket {index}",
                    pair[0],
                    pair[1],
                    bucket.interval_ms
                );
            }
        }
    }
}

#[test]
fn test_manifest_hashes_survive_reopen() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let checkpoint = {
        let (journal, store) = open(&temp_dir)?;
        let files = vec![
            store_file(&store, "src/main.rs", b"fn main() {}")?,
            store_file(&store, "README.md", b"# readme")?,
        ];
        let checkpoint = Checkpoint::new("first", 1_000, false, None, files);
        journal.insert_as_current(&checkpoint)?;
        checkpoint
    };

    let (journal, _) = open(&temp_dir)?;
    let current = journal.get_current()?.expect("current survives reopen");
    assert_eq!(current.files, checkpoint.files);
    assert_eq!(current.file("src/main.rs").map(|f| f.hash), Some(hash_bytes(b"fn main() {}")));
    Ok(())
}
