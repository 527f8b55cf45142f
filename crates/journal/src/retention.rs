//! Retention policy for auto-saves and blob garbage collection

use crate::checkpoint::CheckpointId;
use crate::journal::{CheckpointRecord, Journal};
use serde::Serialize;
use std::time::Instant;
use undu_core::{ContentStore, Result};

const MINUTE: u64 = 60 * 1000;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// One age range and the minimum spacing between its survivors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// Exclusive upper age bound; `None` for the open-ended last bucket
    pub max_age_ms: Option<u64>,
    /// Minimum distance between kept timestamps; `0` keeps everything
    pub interval_ms: u64,
}

/// Time-bucketed decay schedule for auto-saves
///
/// Named checkpoints and the current checkpoint are never candidates.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Ordered by increasing age bound
    pub buckets: Vec<Bucket>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            buckets: vec![
                Bucket { max_age_ms: Some(HOUR), interval_ms: 0 },
                Bucket { max_age_ms: Some(DAY), interval_ms: 10 * MINUTE },
                Bucket { max_age_ms: Some(WEEK), interval_ms: HOUR },
                Bucket { max_age_ms: Some(30 * DAY), interval_ms: DAY },
                Bucket { max_age_ms: None, interval_ms: WEEK },
            ],
        }
    }
}

impl RetentionPolicy {
    /// Index of the bucket an age falls in
    pub fn bucket_for(&self, age_ms: u64) -> usize {
        self.buckets
            .iter()
            .position(|b| b.max_age_ms.map_or(true, |max| age_ms < max))
            .unwrap_or(self.buckets.len().saturating_sub(1))
    }

    /// Ids recommended for deletion at `now_ms`
    ///
    /// Pure: reads only the given records. Checkpoints stamped after
    /// `now_ms` count as age zero.
    pub fn plan(
        &self,
        records: &[CheckpointRecord],
        current: Option<&CheckpointId>,
        now_ms: u64,
    ) -> Vec<CheckpointId> {
        let mut buckets: Vec<Vec<(u64, &CheckpointId)>> = vec![Vec::new(); self.buckets.len()];

        for record in records {
            if !record.is_auto_save || Some(&record.id) == current {
                continue;
            }
            let age = now_ms.saturating_sub(record.timestamp);
            buckets[self.bucket_for(age)].push((record.timestamp, &record.id));
        }

        let mut candidates = Vec::new();
        for (bucket, mut entries) in self.buckets.iter().zip(buckets) {
            candidates.extend(thin_bucket(&mut entries, bucket.interval_ms));
        }
        candidates
    }
}

/// Thin one bucket, returning the ids to delete
///
/// Keeps the newest entry, then walks older entries keeping each one whose
/// distance from the last kept timestamp is at least `interval_ms`.
pub fn thin_bucket(entries: &mut [(u64, &CheckpointId)], interval_ms: u64) -> Vec<CheckpointId> {
    if entries.len() <= 1 || interval_ms == 0 {
        return Vec::new();
    }

    entries.sort_by(|a, b| b.0.cmp(&a.0));

    let mut to_delete = Vec::new();
    let mut last_kept = entries[0].0;
    for &(timestamp, id) in entries.iter().skip(1) {
        if last_kept - timestamp < interval_ms {
            to_delete.push(id.clone());
        } else {
            last_kept = timestamp;
        }
    }
    to_delete
}

/// Outcome of a garbage collection run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcReport {
    /// Ids removed from the journal
    pub deleted: Vec<CheckpointId>,
    pub blobs_deleted: usize,
    pub bytes_freed: u64,
    pub duration_ms: u64,
}

impl GcReport {
    pub fn checkpoints_deleted(&self) -> usize {
        self.deleted.len()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            checkpoints = self.deleted.len(),
            blobs = self.blobs_deleted,
            bytes_freed = self.bytes_freed,
            duration_ms = self.duration_ms,
            "gc completed"
        );
    }
}

/// Deletes planned checkpoints and sweeps unreferenced blobs
pub struct GarbageCollector {
    policy: RetentionPolicy,
}

impl GarbageCollector {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Candidates at `now_ms` without mutating anything
    pub fn plan(&self, journal: &Journal, now_ms: u64) -> Result<Vec<CheckpointId>> {
        let records = journal.records()?;
        let current = journal.current_id()?;
        Ok(self.policy.plan(&records, current.as_ref(), now_ms))
    }

    /// Run retention at `now_ms`: delete candidates, then sweep blobs
    ///
    /// Safe to re-run; a second pass over the same state deletes nothing.
    pub fn collect(&self, journal: &Journal, store: &ContentStore, now_ms: u64) -> Result<GcReport> {
        let start = Instant::now();
        let mut report = GcReport::default();

        // Phase 1: drop checkpoint rows
        for id in self.plan(journal, now_ms)? {
            if journal.delete(&id)? {
                tracing::info!(%id, "pruned checkpoint");
                report.deleted.push(id);
            }
        }

        // Phase 2: mark every hash still referenced
        let live = journal.referenced_hashes()?;

        // Phase 3: sweep
        for hash in store.list()? {
            if !live.contains(&hash) {
                report.bytes_freed += store.remove(hash)?;
                report.blobs_deleted += 1;
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.log_summary();
        Ok(report)
    }
}
