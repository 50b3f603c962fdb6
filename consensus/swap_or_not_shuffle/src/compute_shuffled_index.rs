use crate::{is_valid_list_size, Buf};
use std::cmp::max;

/// Return `p(index)` in a pseudorandom permutation `p` of `0...list_size-1` with ``seed`` as
/// entropy.
///
/// Utilizes 'swap or not' shuffling found in
/// https://link.springer.com/content/pdf/10.1007%2F978-3-642-32009-5_1.pdf
/// See the 'generalized domain' algorithm on page 3.
///
/// Returns `None` under any of the following conditions:
///  - `list_size == 0`
///  - `index >= list_size`
///  - `list_size > 2**24`
///  - `list_size > usize::MAX / 2`
///  - `seed` is not 32 bytes
pub fn compute_shuffled_index(
    index: usize,
    list_size: usize,
    seed: &[u8],
    shuffle_round_count: u8,
) -> Option<usize> {
    if !is_valid_list_size(list_size) || index >= list_size {
        return None;
    }

    let mut buf = Buf::new(seed)?;
    let mut index = index;
    for round in 0..shuffle_round_count {
        buf.set_round(round);
        let pivot = buf.raw_pivot() as usize % list_size;
        index = do_round(&mut buf, index, pivot, list_size);
    }
    Some(index)
}

fn do_round(buf: &mut Buf, index: usize, pivot: usize, list_size: usize) -> usize {
    let flip = (pivot + (list_size - index)) % list_size;
    let position = max(index, flip);
    buf.mix_in_position(position / 256);
    let source = buf.hash();
    let byte = source[(position % 256) / 8];
    let bit = (byte >> (position % 8)) % 2;
    if bit == 1 {
        flip
    } else {
        index
    }
}
