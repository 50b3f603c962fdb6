use swap_or_not_shuffle::{compute_shuffled_index, shuffle_list};
use types::Hash256;

/// The protocol shuffling primitive.
///
/// Committees are contiguous slices of `shuffle_list(active_indices, seed)`; proposer selection
/// samples single positions with `shuffled_index`. Implementations must agree between the two:
/// `shuffle_list(l, s)[i] == l[shuffled_index(i, l.len(), s)]`.
pub trait Shuffle: Send + Sync {
    /// Returns the position that `index` maps to in a permutation of `0..list_size`.
    fn shuffled_index(&self, index: usize, list_size: usize, seed: &Hash256) -> Option<usize>;

    /// Returns `indices` permuted under `seed`.
    fn shuffle_list(&self, indices: Vec<usize>, seed: &Hash256) -> Option<Vec<usize>> {
        let list_size = indices.len();
        (0..list_size)
            .map(|i| {
                self.shuffled_index(i, list_size, seed)
                    .and_then(|j| indices.get(j).copied())
            })
            .collect()
    }
}

/// The "swap or not" shuffle used by the beacon chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapOrNotShuffle {
    round_count: u8,
}

impl SwapOrNotShuffle {
    pub fn new(round_count: u8) -> Self {
        Self { round_count }
    }
}

impl Shuffle for SwapOrNotShuffle {
    fn shuffled_index(&self, index: usize, list_size: usize, seed: &Hash256) -> Option<usize> {
        compute_shuffled_index(index, list_size, seed.as_bytes(), self.round_count)
    }

    fn shuffle_list(&self, indices: Vec<usize>, seed: &Hash256) -> Option<Vec<usize>> {
        if self.round_count == 0 {
            return Some(indices);
        }
        shuffle_list(indices, self.round_count, seed.as_bytes(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A `Shuffle` that only implements the single-index method.
    struct SingleIndexOnly(SwapOrNotShuffle);

    impl Shuffle for SingleIndexOnly {
        fn shuffled_index(&self, index: usize, list_size: usize, seed: &Hash256) -> Option<usize> {
            self.0.shuffled_index(index, list_size, seed)
        }
    }

    #[test]
    fn default_list_shuffle_agrees_with_fast_shuffle() {
        let seed = Hash256::repeat_byte(9);
        let fast = SwapOrNotShuffle::new(10);
        let slow = SingleIndexOnly(fast);
        let indices: Vec<usize> = (0..300).map(|i| i * 2 + 1).collect();

        assert_eq!(
            fast.shuffle_list(indices.clone(), &seed),
            slow.shuffle_list(indices, &seed)
        );
    }

    #[test]
    fn zero_rounds_is_identity() {
        let shuffle = SwapOrNotShuffle::new(0);
        let indices = vec![5, 3, 1];
        assert_eq!(
            shuffle.shuffle_list(indices.clone(), &Hash256::zero()),
            Some(indices)
        );
    }
}
