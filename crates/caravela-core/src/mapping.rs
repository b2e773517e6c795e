//! The resource⇄GUID mapping.
//!
//! The identifier space is split into contiguous intervals, one per declared
//! resource partition, ordered lexicographically by (CPU class, cores, RAM).
//! A supplier advertising `(2, 2048)` picks a GUID inside that tuple's
//! interval; whoever the overlay says owns that GUID trades offers for the
//! tuple. The mapping is immutable once built.

use num_bigint::BigUint;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::error::{CoreError, Result};
use crate::guid::{Guid, GuidSpace};
use crate::resources::Resources;

/// Immutable mapping between resource partitions and GUID intervals.
pub struct ResourceMapping {
    space: GuidSpace,
    partitions: Vec<Resources>,
    starts: Vec<BigUint>,
    rng: Mutex<SmallRng>,
}

impl ResourceMapping {
    /// Builds a mapping over the given partitions.
    ///
    /// Partitions are sorted by (class, cores, RAM) and deduplicated; each
    /// receives an equal share of the space, with the last absorbing the
    /// division remainder.
    pub fn new(space: GuidSpace, mut partitions: Vec<Resources>) -> Result<Self> {
        partitions.sort_by_key(|p| (p.cpu_class().as_u8(), p.cpus(), p.ram()));
        partitions.dedup();

        if partitions.is_empty() {
            return Err(CoreError::NoPartitions);
        }
        if let Some(bad) = partitions.iter().find(|p| !p.is_valid()) {
            return Err(CoreError::InvalidResources(*bad));
        }

        let count = BigUint::from(partitions.len());
        let width = space.upper_bound() / &count;
        let starts = (0..partitions.len())
            .map(|i| &width * BigUint::from(i))
            .collect();

        Ok(Self {
            space,
            partitions,
            starts,
            rng: Mutex::new(SmallRng::from_entropy()),
        })
    }

    /// Builds the cartesian product of the declared class, core and RAM
    /// partitions, the shape configuration files describe.
    pub fn from_grid(
        space: GuidSpace,
        classes: &[caravela_proto::CpuClass],
        cores: &[u32],
        rams: &[u32],
    ) -> Result<Self> {
        let mut partitions = Vec::with_capacity(classes.len() * cores.len() * rams.len());
        for class in classes {
            for cpus in cores {
                for ram in rams {
                    partitions.push(Resources::new(*class, *cpus, *ram));
                }
            }
        }
        Self::new(space, partitions)
    }

    /// The identifier space this mapping divides.
    #[must_use]
    pub fn space(&self) -> GuidSpace {
        self.space
    }

    /// Declared partitions in interval order.
    #[must_use]
    pub fn partitions(&self) -> &[Resources] {
        &self.partitions
    }

    /// The least powerful declared tuple.
    #[must_use]
    pub fn lowest_resources(&self) -> Resources {
        self.partitions[0]
    }

    /// The largest declared tuple that fits inside `resources`, if any.
    /// Used to snap an arbitrary pool onto the partition grid before
    /// advertising.
    #[must_use]
    pub fn fittest(&self, resources: Resources) -> Option<Resources> {
        self.partitions
            .iter()
            .rev()
            .find(|partition| resources.contains(**partition))
            .copied()
    }

    /// The smallest declared tuple whose cores and RAM cover `resources`,
    /// if any. Used to snap a demand onto the partition grid before the
    /// discovery walk.
    #[must_use]
    pub fn covering(&self, resources: Resources) -> Option<Resources> {
        self.partitions
            .iter()
            .find(|partition| {
                partition.cpus() >= resources.cpus() && partition.ram() >= resources.ram()
            })
            .copied()
    }

    /// The partition a GUID falls into. Total: every GUID belongs to
    /// exactly one interval.
    #[must_use]
    pub fn resources_for(&self, guid: &Guid) -> Resources {
        self.partitions[self.interval_index(guid)]
    }

    /// First GUID of the tuple's interval.
    pub fn first_guid(&self, resources: Resources) -> Result<Guid> {
        let index = self.partition_index(resources)?;
        Ok(Guid::from_value(self.starts[index].clone()))
    }

    /// Last GUID of the tuple's interval.
    pub fn last_guid(&self, resources: Resources) -> Result<Guid> {
        let index = self.partition_index(resources)?;
        Ok(Guid::from_value(self.interval_end(index) - BigUint::from(1u8)))
    }

    /// Uniformly random GUID inside the tuple's interval.
    pub fn random_guid(&self, resources: Resources) -> Result<Guid> {
        let index = self.partition_index(resources)?;
        Ok(self.random_in_interval(index))
    }

    /// Random GUID in the next interval above `guid` whose tuple dominates
    /// `target` (cores and RAM both at least the target's).
    ///
    /// Fails with [`CoreError::PartitionsExhausted`] when no interval above
    /// qualifies.
    pub fn higher_random(&self, guid: &Guid, target: Resources) -> Result<Guid> {
        let from = self.interval_index(guid);
        for index in (from + 1)..self.partitions.len() {
            let candidate = self.partitions[index];
            if candidate.cpus() >= target.cpus() && candidate.ram() >= target.ram() {
                return Ok(self.random_in_interval(index));
            }
        }
        Err(CoreError::PartitionsExhausted)
    }

    /// Random GUID in the next interval below `guid` whose tuple is covered
    /// by `target` (cores and RAM both at most the target's).
    ///
    /// Used when advertising: a big offer can be handed to a trader of a
    /// smaller partition if nobody trades the exact tuple.
    pub fn lower_random(&self, guid: &Guid, target: Resources) -> Result<Guid> {
        let from = self.interval_index(guid);
        for index in (0..from).rev() {
            let candidate = self.partitions[index];
            if candidate.cpus() <= target.cpus() && candidate.ram() <= target.ram() {
                return Ok(self.random_in_interval(index));
            }
        }
        Err(CoreError::PartitionsExhausted)
    }

    fn partition_index(&self, resources: Resources) -> Result<usize> {
        self.partitions
            .iter()
            .position(|p| *p == resources)
            .ok_or(CoreError::UnknownPartition(resources))
    }

    /// Largest interval whose start is at or below the GUID.
    fn interval_index(&self, guid: &Guid) -> usize {
        match self
            .starts
            .binary_search_by(|start| start.cmp(guid.value()))
        {
            Ok(exact) => exact,
            Err(insertion) => insertion - 1,
        }
    }

    fn interval_end(&self, index: usize) -> BigUint {
        if index + 1 < self.starts.len() {
            self.starts[index + 1].clone()
        } else {
            self.space.upper_bound()
        }
    }

    fn random_in_interval(&self, index: usize) -> Guid {
        let lo = Guid::from_value(self.starts[index].clone());
        let hi = Guid::from_value(self.interval_end(index));
        let mut rng = self.rng.lock();
        self.space.random_between(&mut rng, &lo, &hi)
    }
}

impl std::fmt::Debug for ResourceMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMapping")
            .field("bits", &self.space.size_bits())
            .field("partitions", &self.partitions.len())
            .finish()
    }
}
