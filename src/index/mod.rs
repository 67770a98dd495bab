//! Sparse `frame_index -> byte_offset` cache and the stride state machine
//! used to extend it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Kw6Error, Result};

/// Offsets of position headers that have been seen, keyed by frame index.
///
/// Entries are only ever added; an offset recorded for a frame index is
/// never replaced by a different one.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct IndexCache {
    entries: BTreeMap<i64, u64>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an offset. Returns false if the frame was already known.
    pub fn insert(&mut self, frame_index: i64, offset: u64) -> bool {
        match self.entries.entry(frame_index) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(offset);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Forget an entry that turned out not to point at its frame.
    pub fn remove(&mut self, frame_index: i64) -> Option<u64> {
        self.entries.remove(&frame_index)
    }

    pub fn get(&self, frame_index: i64) -> Option<u64> {
        self.entries.get(&frame_index).copied()
    }

    /// Closest known entry at or below `frame_index`.
    pub fn floor(&self, frame_index: i64) -> Option<(i64, u64)> {
        self.entries
            .range(..=frame_index)
            .next_back()
            .map(|(&k, &v)| (k, v))
    }

    pub fn first(&self) -> Option<(i64, u64)> {
        self.entries.iter().next().map(|(&k, &v)| (k, v))
    }

    pub fn last(&self) -> Option<(i64, u64)> {
        self.entries.iter().next_back().map(|(&k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending frame order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (i64, u64)> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }

    /// Merge another cache; existing entries win.
    pub fn extend(&mut self, other: &IndexCache) {
        for (frame_index, offset) in other.iter() {
            self.insert(frame_index, offset);
        }
    }
}

impl FromIterator<(i64, u64)> for IndexCache {
    fn from_iter<I: IntoIterator<Item = (i64, u64)>>(iter: I) -> Self {
        let mut cache = IndexCache::new();
        for (frame_index, offset) in iter {
            cache.insert(frame_index, offset);
        }
        cache
    }
}

/// How far the next extrapolation may leap from the current anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepConfidence {
    /// No stride verified yet: aim straight at the target.
    Unknown,
    /// A stride has held; leap this many frames at once.
    Confirmed(i64),
}

/// Growth factor applied to the leap after every confirmed extrapolation.
pub const STEP_GROWTH: i64 = 10;

impl StepConfidence {
    /// The frame index to aim for from `anchor` on the way to `target`.
    pub fn goal(self, anchor: i64, target: i64) -> i64 {
        match self {
            StepConfidence::Unknown => target,
            StepConfidence::Confirmed(multiplier) => anchor.saturating_add(multiplier).min(target),
        }
    }

    pub fn on_hit(self) -> Self {
        match self {
            StepConfidence::Unknown => StepConfidence::Confirmed(STEP_GROWTH),
            StepConfidence::Confirmed(multiplier) => {
                StepConfidence::Confirmed(multiplier.saturating_mul(STEP_GROWTH))
            }
        }
    }

    pub fn on_miss(self) -> Self {
        StepConfidence::Confirmed(1)
    }

    /// Single-record steps follow declared lengths and cannot miss by
    /// landing mid-record.
    pub fn is_single_step(self) -> bool {
        self == StepConfidence::Confirmed(1)
    }
}

/// A cache persisted alongside a recording.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IndexSnapshot {
    /// Unix seconds when the snapshot was taken.
    pub created_at: i64,
    /// Size of the recording the offsets belong to.
    pub file_size:  u64,
    pub entries:    Vec<(i64, u64)>,
}

impl IndexSnapshot {
    pub fn capture(cache: &IndexCache, file_size: u64) -> Self {
        Self {
            created_at: Utc::now().timestamp(),
            file_size,
            entries: cache.iter().collect(),
        }
    }

    /// The snapshot's entries, provided it was taken of a file this size.
    pub fn into_cache(self, file_size: u64) -> Result<IndexCache> {
        if self.file_size != file_size {
            return Err(Kw6Error::Format(format!(
                "index snapshot is for a {} byte file, recording is {file_size} bytes",
                self.file_size
            )));
        }
        Ok(self.entries.into_iter().collect())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
