//! Property-based tests for the work partitioning
//!
//! Every index of a sequence must be owned by exactly one worker, whatever the
//! sequence length and worker count.

use product_ledger::Partition;
use proptest::prelude::*;

proptest! {
    /// Property: partitions cover 0..len exactly once
    #[test]
    fn partitions_cover_every_index_once(len in 0usize..500, workers in 1usize..40) {
        let mut owners = vec![0u32; len];
        for id in 0..workers {
            for index in Partition::of(len, workers, id).indices() {
                prop_assert!(index < len);
                owners[index] += 1;
            }
        }
        prop_assert!(owners.iter().all(|&count| count == 1));
    }

    /// Property: each worker's indices come out in ascending order
    #[test]
    fn partition_preserves_order(len in 0usize..500, workers in 1usize..40) {
        for id in 0..workers {
            let indices: Vec<usize> = Partition::of(len, workers, id).indices().collect();
            prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        }
    }

    /// Property: partition sizes differ by at most one
    #[test]
    fn partitions_are_balanced(len in 0usize..500, workers in 1usize..40) {
        let sizes: Vec<usize> = (0..workers).map(|id| Partition::of(len, workers, id).len()).collect();
        let max = sizes.iter().copied().max().unwrap_or(0);
        let min = sizes.iter().copied().min().unwrap_or(0);
        prop_assert!(max - min <= 1);
        prop_assert_eq!(sizes.iter().sum::<usize>(), len);
    }
}

#[test]
fn ids_outside_the_pool_own_nothing() {
    assert!(Partition::of(10, 4, 4).is_empty());
}
