//! Partition health tracking.
//!
//! Each resource partition keeps a small ring of recent hit/miss samples.
//! Before paying for a lookup into a partition, a strategy can ask
//! [`PartitionStats::try_partition`]; a partition whose whole window is
//! misses is skipped. Nodes exchange their windows piggybacked on discovery
//! responses and OR-merge what they learn.

use dashmap::DashMap;

use caravela_proto::PartitionStateSnapshot;

use crate::resources::Resources;

/// Default number of samples kept per partition.
pub const DEFAULT_SAMPLES: usize = 13;

/// Per-partition bounded sample rings behind a sharded map.
#[derive(Debug)]
pub struct PartitionStats {
    states: DashMap<Resources, SampleRing>,
    samples: usize,
}

impl PartitionStats {
    /// Creates stats with `samples` slots per partition.
    #[must_use]
    pub fn new(samples: usize) -> Self {
        Self {
            states: DashMap::new(),
            samples: samples.max(1),
        }
    }

    /// True while the partition looks worth trying: uninitialised, or at
    /// least one recent sample was a hit.
    #[must_use]
    pub fn try_partition(&self, partition: Resources) -> bool {
        self.states
            .entry(partition)
            .or_insert_with(|| SampleRing::new(self.samples))
            .any_hit()
    }

    /// Records a successful probe of the partition.
    pub fn hit(&self, partition: Resources) {
        self.states
            .entry(partition)
            .or_insert_with(|| SampleRing::new(self.samples))
            .push(true);
    }

    /// Records a failed probe of the partition.
    pub fn miss(&self, partition: Resources) {
        self.states
            .entry(partition)
            .or_insert_with(|| SampleRing::new(self.samples))
            .push(false);
    }

    /// Exports the current windows for piggybacking on responses.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PartitionStateSnapshot> {
        self.states
            .iter()
            .map(|entry| PartitionStateSnapshot {
                resources: (*entry.key()).into(),
                hits: entry.value().window(),
            })
            .collect()
    }

    /// OR-merges another node's windows into the local ones.
    ///
    /// A remote hit can only improve the local view; remote misses never
    /// erase local hits.
    pub fn merge(&self, remote: &[PartitionStateSnapshot]) {
        for state in remote {
            let partition = Resources::from(state.resources);
            self.states
                .entry(partition)
                .or_insert_with(|| SampleRing::new(self.samples))
                .merge(&state.hits);
        }
    }
}

impl Default for PartitionStats {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLES)
    }
}

/// Fixed-size ring of hit/miss samples. Starts all-hits so an unprobed
/// partition is never skipped.
#[derive(Debug, Clone)]
struct SampleRing {
    samples: Vec<bool>,
    cursor: usize,
}

impl SampleRing {
    fn new(size: usize) -> Self {
        Self {
            samples: vec![true; size],
            cursor: 0,
        }
    }

    fn push(&mut self, hit: bool) {
        self.samples[self.cursor] = hit;
        self.cursor = (self.cursor + 1) % self.samples.len();
    }

    fn any_hit(&self) -> bool {
        self.samples.iter().any(|hit| *hit)
    }

    /// Window newest-first, matching the wire layout.
    fn window(&self) -> Vec<bool> {
        let len = self.samples.len();
        (0..len)
            .map(|age| self.samples[(self.cursor + len - 1 - age) % len])
            .collect()
    }

    fn merge(&mut self, remote: &[bool]) {
        for (age, hit) in remote.iter().enumerate().take(self.samples.len()) {
            let len = self.samples.len();
            let slot = (self.cursor + len - 1 - age) % len;
            self.samples[slot] |= *hit;
        }
    }
}
