//! Provides list-shuffling functions matching the Ethereum consensus specification.
//!
//! There are two functions exported by this crate:
//!
//! - `compute_shuffled_index`: given a single index, computes the index resulting from a shuffle.
//!   Runs in less time than it takes to run `shuffle_list`.
//! - `shuffle_list`: shuffles an entire list in-place. Runs in less time than it takes to run
//!   `compute_shuffled_index` on each index.
//!
//! In general, use `compute_shuffled_index` to calculate the shuffling of a small subset of a much
//! larger list (~250x larger is a good guide).

mod compute_shuffled_index;
mod shuffle_list;

pub use compute_shuffled_index::compute_shuffled_index;
pub use shuffle_list::shuffle_list;

type Hash256 = ethereum_types::H256;

const SEED_SIZE: usize = 32;
const ROUND_SIZE: usize = 1;
const POSITION_WINDOW_SIZE: usize = 4;
const PIVOT_VIEW_SIZE: usize = SEED_SIZE + ROUND_SIZE;
const TOTAL_SIZE: usize = SEED_SIZE + ROUND_SIZE + POSITION_WINDOW_SIZE;

/// The largest list either function will shuffle.
pub const MAX_LIST_SIZE: usize = 1 << 24;

/// Returns `true` if a list of `list_size` elements can be shuffled.
fn is_valid_list_size(list_size: usize) -> bool {
    list_size > 0 && list_size <= MAX_LIST_SIZE && list_size <= usize::MAX / 2
}

/// The `seed ++ round ++ position_window` preimage, reused across hashes.
struct Buf([u8; TOTAL_SIZE]);

impl Buf {
    /// Returns `None` if `seed` is not exactly 32 bytes.
    fn new(seed: &[u8]) -> Option<Self> {
        if seed.len() != SEED_SIZE {
            return None;
        }
        let mut buf = [0; TOTAL_SIZE];
        buf[0..SEED_SIZE].copy_from_slice(seed);
        Some(Self(buf))
    }

    fn set_round(&mut self, round: u8) {
        self.0[SEED_SIZE] = round;
    }

    /// Returns the unreduced pivot for the current round.
    fn raw_pivot(&self) -> u64 {
        let digest = ethereum_hashing::hash(&self.0[0..PIVOT_VIEW_SIZE]);
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&digest[0..8]);
        u64::from_le_bytes(bytes)
    }

    /// Writes the 256-bit window number `window` into the buffer.
    fn mix_in_position(&mut self, window: usize) {
        self.0[PIVOT_VIEW_SIZE..].copy_from_slice(&(window as u32).to_le_bytes());
    }

    fn hash(&self) -> Hash256 {
        Hash256::from_slice(&ethereum_hashing::hash(&self.0))
    }
}
