//! Round-robin assignment of input records to ranks
//!
//! Every rank decides on its own which records it owns, from nothing more
//! than the record's ordinal position and the world size.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed identity of one rank within a run. Rank 0 is the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(u32);

impl Rank {
    pub const COORDINATOR: Rank = Rank(0);

    pub const fn new(rank: u32) -> Self {
        Self(rank)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_coordinator(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank {}", self.0)
    }
}

/// True if the record at `index` belongs to `rank` in a world of `world_size` ranks.
///
/// An empty world owns nothing.
#[inline]
pub fn owns(index: u64, rank: u32, world_size: u32) -> bool {
    index.checked_rem(u64::from(world_size)) == Some(u64::from(rank))
}

/// The implicit slice of the input owned by one rank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    rank: Rank,
    world_size: u32,
}

impl Partition {
    pub fn new(rank: Rank, world_size: u32) -> Result<Self> {
        if world_size == 0 {
            return Err(anyhow!("World size must be at least 1"));
        }
        if rank.get() >= world_size {
            return Err(anyhow!(
                "{} is outside a world of {} ranks",
                rank,
                world_size
            ));
        }
        Ok(Self { rank, world_size })
    }

    /// The whole input, owned by a single rank
    pub fn whole() -> Self {
        Self {
            rank: Rank::COORDINATOR,
            world_size: 1,
        }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    pub fn owns(&self, index: u64) -> bool {
        owns(index, self.rank.get(), self.world_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_robin_assignment() {
        let p0 = Partition::new(Rank::new(0), 2).unwrap();
        let p1 = Partition::new(Rank::new(1), 2).unwrap();

        let owned0: Vec<u64> = (0..4).filter(|i| p0.owns(*i)).collect();
        let owned1: Vec<u64> = (0..4).filter(|i| p1.owns(*i)).collect();

        assert_eq!(owned0, vec![0, 2]);
        assert_eq!(owned1, vec![1, 3]);
    }

    #[test]
    fn test_single_rank_owns_everything() {
        let whole = Partition::whole();
        assert!((0..100).all(|i| whole.owns(i)));
        assert_eq!(whole, Partition::new(Rank::COORDINATOR, 1).unwrap());
    }

    #[test]
    fn test_invalid_partitions_rejected() {
        assert!(Partition::new(Rank::new(0), 0).is_err());

        let err = Partition::new(Rank::new(3), 3).unwrap_err();
        assert!(err.to_string().contains("rank 3"));
    }

    #[test]
    fn test_large_indices() {
        assert!(owns(u64::MAX, (u64::MAX % 7) as u32, 7));
        assert!(owns(u64::MAX, 0, 1));
    }

    #[test]
    fn test_empty_world_owns_nothing() {
        assert!(!owns(0, 0, 0));
        assert!(!owns(17, 3, 0));
    }

    proptest! {
        #[test]
        fn prop_exactly_one_owner(world_size in 1u32..64, index in any::<u64>()) {
            let owners = (0..world_size).filter(|r| owns(index, *r, world_size)).count();
            prop_assert_eq!(owners, 1);
        }

        #[test]
        fn prop_partitions_cover_input(world_size in 1u32..16, records in 0u64..500) {
            let mut seen = vec![0u32; records as usize];
            for rank in 0..world_size {
                let partition = Partition::new(Rank::new(rank), world_size).unwrap();
                for index in (0..records).filter(|i| partition.owns(*i)) {
                    seen[index as usize] += 1;
                }
            }
            prop_assert!(seen.iter().all(|count| *count == 1));
        }
    }
}
