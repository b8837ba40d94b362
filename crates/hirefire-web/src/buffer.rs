//! Per-second aggregation of queue time samples.
//!
//! Every operation runs under one mutex held only for the in-memory
//! mutation, so a sample added concurrently with a flush lands either in
//! the flushed snapshot or in the fresh buffer, never both and never neither.

use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Bucket key (unix-epoch second) → queue time samples in milliseconds.
pub type Snapshot = BTreeMap<u64, Vec<u64>>;

/// Result of merging a failed delivery back into the live buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Repopulated {
    /// Samples merged back for a later retry.
    pub kept: usize,
    /// Samples discarded because their bucket aged past the horizon.
    pub dropped: usize,
}

/// Live sample buffer owned by one web engine.
#[derive(Debug, Default)]
pub struct Buffer {
    inner: Mutex<Snapshot>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample to the bucket of the second containing `now_ms`.
    pub fn add_sample(&self, value: u64, now_ms: u64) {
        let bucket = now_ms / 1000;
        self.inner.lock().entry(bucket).or_default().push(value);
    }

    /// Swap the live buffer for an empty one and hand back the old contents.
    pub fn flush(&self) -> Snapshot {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Merge `old` into the live buffer, keeping buckets whose key is
    /// `>= now_secs - ttl_secs`. Older buckets are dropped for good.
    pub fn repopulate(&self, old: Snapshot, now_secs: u64, ttl_secs: u64) -> Repopulated {
        let horizon = now_secs.saturating_sub(ttl_secs);
        let mut result = Repopulated::default();

        let mut live = self.inner.lock();
        for (bucket, samples) in old {
            if bucket >= horizon {
                result.kept += samples.len();
                live.entry(bucket).or_default().extend(samples);
            } else {
                result.dropped += samples.len();
            }
        }
        result
    }

    /// Copy of the live buffer without flushing it.
    pub fn contents(&self) -> Snapshot {
        self.inner.lock().clone()
    }

    /// Number of buckets currently held.
    pub fn bucket_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Number of samples across all buckets.
    pub fn sample_count(&self) -> usize {
        count_samples(&self.inner.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Total number of samples in a snapshot.
pub fn count_samples(snapshot: &Snapshot) -> usize {
    snapshot.values().map(Vec::len).sum()
}
