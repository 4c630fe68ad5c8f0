// Per-version trend history: bounded ring buffers of recent connection counts.
// Presentation cache only; owned by one panel and dropped with it.

use std::collections::{HashMap, HashSet, VecDeque};

/// Default number of samples kept per version.
pub const DEFAULT_HISTORY_CAPACITY: usize = 18;

/// Consecutive snapshots a version may be missing before opt-in eviction drops it.
const EVICT_AFTER_MISSES: u32 = 2;

#[derive(Debug, Default)]
struct Series {
    samples: VecDeque<u64>,
    misses: u32,
}

#[derive(Debug)]
pub struct TrendHistory {
    capacity: usize,
    series: HashMap<String, Series>,
}

impl Default for TrendHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TrendHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push `value` for `identifier`, dropping the oldest sample once at capacity.
    pub fn append(&mut self, identifier: &str, value: u64) {
        let capacity = self.capacity;
        let series = self
            .series
            .entry(identifier.to_string())
            .or_insert_with(|| Series {
                samples: VecDeque::with_capacity(capacity),
                misses: 0,
            });
        if series.samples.len() == capacity {
            series.samples.pop_front();
        }
        series.samples.push_back(value);
        series.misses = 0;
    }

    /// Samples for `identifier`, oldest first. Empty when never seen.
    pub fn get(&self, identifier: &str) -> Vec<u64> {
        self.series
            .get(identifier)
            .map(|s| s.samples.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.series.contains_key(identifier)
    }

    /// Opt-in eviction: drop versions absent from two consecutive snapshots.
    /// `present` is the set of identifiers in the snapshot just observed.
    /// Returns the identifiers evicted.
    pub fn evict_missing(&mut self, present: &HashSet<&str>) -> Vec<String> {
        let mut evicted = Vec::new();
        self.series.retain(|id, series| {
            if present.contains(id.as_str()) {
                return true;
            }
            series.misses += 1;
            if series.misses >= EVICT_AFTER_MISSES {
                evicted.push(id.clone());
                false
            } else {
                true
            }
        });
        evicted
    }
}
