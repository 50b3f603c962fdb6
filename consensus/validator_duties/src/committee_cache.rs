use crate::{Error, Shuffle};
use safe_arith::SafeArith;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::ops::Range;
use types::{ChainSpec, Epoch, Hash256, Slot};

/// A single beacon committee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeAssignment {
    pub epoch: Epoch,
    pub slot: Slot,
    #[serde(with = "serde_utils::quoted_u64")]
    pub committee_index: u64,
    /// Validator indices, in committee order.
    pub members: Vec<usize>,
}

/// The attestation duty of a single validator in an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestationDuty {
    /// The slot during which the attester must attest.
    pub slot: Slot,
    /// The index of this committee within the committees in `slot`.
    pub committee_index: u64,
    /// The position of the attester within the committee.
    pub committee_position: usize,
    /// The total number of attesters in the committee.
    pub committee_len: usize,
    /// The committee count at `slot`.
    pub committees_at_slot: u64,
}

/// Computes and stores the shuffling for an epoch. Provides various getters to allow callers to
/// read the committees for the given epoch.
///
/// A `CommitteeCache` is immutable once built and depends only on `(epoch, active_indices, seed)`.
#[derive(Debug, PartialEq, Clone)]
pub struct CommitteeCache {
    epoch: Epoch,
    seed: Hash256,
    shuffling: Vec<usize>,
    /// `shuffling_positions[validator_index]` is one more than the position of the validator in
    /// `shuffling`, or `None` if the validator is not active.
    shuffling_positions: Vec<Option<NonZeroUsize>>,
    committees_per_slot: u64,
    slots_per_epoch: u64,
}

impl CommitteeCache {
    /// Return a new, fully initialized cache.
    pub fn initialized<S: Shuffle + ?Sized>(
        epoch: Epoch,
        active_validator_indices: Vec<usize>,
        seed: Hash256,
        shuffle: &S,
        spec: &ChainSpec,
    ) -> Result<CommitteeCache, Error> {
        // May cause divide-by-zero errors.
        if spec.slots_per_epoch == 0 {
            return Err(Error::ZeroSlotsPerEpoch);
        }

        if active_validator_indices.is_empty() {
            return Err(Error::EmptyActiveSet { epoch });
        }

        let committees_per_slot =
            get_committee_count_per_slot(active_validator_indices.len(), spec)?;

        // The positions table is sized to the highest index, rather than the registry.
        let positions_len = active_validator_indices
            .iter()
            .max()
            .map_or(0, |max| max.saturating_add(1));

        let shuffling = shuffle
            .shuffle_list(active_validator_indices, &seed)
            .ok_or(Error::ShuffleFailed {
                slot: epoch.start_slot(spec.slots_per_epoch),
            })?;

        let mut shuffling_positions = vec![None; positions_len];
        for (i, &v) in shuffling.iter().enumerate() {
            let position = shuffling_positions
                .get_mut(v)
                .ok_or(Error::UnknownValidator(v))?;
            *position = NonZeroUsize::new(i.safe_add(1)?);
        }

        Ok(CommitteeCache {
            epoch,
            seed,
            shuffling,
            shuffling_positions,
            committees_per_slot,
            slots_per_epoch: spec.slots_per_epoch,
        })
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn seed(&self) -> Hash256 {
        self.seed
    }

    /// Returns the **shuffled** list of active validator indices for the initialized epoch.
    ///
    /// These indices are not in ascending order.
    pub fn shuffling(&self) -> &[usize] {
        &self.shuffling
    }

    /// Returns the number of active validators in the initialized epoch.
    pub fn active_validator_count(&self) -> usize {
        self.shuffling.len()
    }

    pub fn committees_per_slot(&self) -> u64 {
        self.committees_per_slot
    }

    /// Returns the total number of committees in the initialized epoch.
    pub fn epoch_committee_count(&self) -> usize {
        epoch_committee_count(self.committees_per_slot as usize, self.slots_per_epoch as usize)
    }

    /// Get the beacon committee for the given `slot` and `index`.
    ///
    /// Return `None` if `slot` is not in the initialized epoch or `index` is out of range.
    pub fn get_beacon_committee(&self, slot: Slot, index: u64) -> Option<&[usize]> {
        if index >= self.committees_per_slot {
            return None;
        }

        let committee_index = compute_committee_index_in_epoch(
            slot,
            self.slots_per_epoch as usize,
            self.committees_per_slot as usize,
            index as usize,
        );
        self.compute_committee(committee_index)
    }

    /// Get all the beacon committees at a given `slot`, in committee index order.
    pub fn get_beacon_committees_at_slot(
        &self,
        slot: Slot,
    ) -> Result<Vec<CommitteeAssignment>, Error> {
        if self.epoch.position(slot, self.slots_per_epoch).is_none() {
            return Ok(vec![]);
        }

        (0..self.committees_per_slot)
            .map(|index| {
                self.get_beacon_committee(slot, index)
                    .map(|members| CommitteeAssignment {
                        epoch: self.epoch,
                        slot,
                        committee_index: index,
                        members: members.to_vec(),
                    })
                    .ok_or(Error::CommitteeOutOfBounds {
                        slot,
                        committee_index: index,
                    })
            })
            .collect()
    }

    /// Returns every committee in the epoch, grouped by slot.
    ///
    /// The union of all members is exactly the active validator set of the epoch.
    pub fn committees_by_slot(&self) -> Result<BTreeMap<Slot, Vec<CommitteeAssignment>>, Error> {
        self.epoch
            .slot_iter(self.slots_per_epoch)
            .map(|slot| Ok((slot, self.get_beacon_committees_at_slot(slot)?)))
            .collect()
    }

    /// Returns the `AttestationDuty` for the given `validator_index`.
    ///
    /// Returns `None` if the `validator_index` does not exist or is not active in the epoch.
    pub fn get_attestation_duties(&self, validator_index: usize) -> Option<AttestationDuty> {
        let i = self.shuffled_position(validator_index)?;

        (0..self.epoch_committee_count())
            .map(|nth_committee| (nth_committee, self.compute_committee_range(nth_committee)))
            .find(|(_, range)| {
                if let Some(range) = range {
                    range.start <= i && range.end > i
                } else {
                    false
                }
            })
            .and_then(|(nth_committee, range)| {
                let (slot, committee_index) =
                    self.convert_to_slot_and_index(nth_committee as u64)?;
                let range = range?;
                let committee_position = i - range.start;
                let committee_len = range.end - range.start;

                Some(AttestationDuty {
                    slot,
                    committee_index,
                    committee_position,
                    committee_len,
                    committees_at_slot: self.committees_per_slot,
                })
            })
    }

    /// Convert an index addressing the list of all epoch committees into a slot and per-slot
    /// committee index.
    fn convert_to_slot_and_index(&self, global_committee_index: u64) -> Option<(Slot, u64)> {
        let epoch_start_slot = self.epoch.start_slot(self.slots_per_epoch);
        let slot_offset = global_committee_index.checked_div(self.committees_per_slot)?;
        let index = global_committee_index.checked_rem(self.committees_per_slot)?;
        Some((epoch_start_slot.safe_add(slot_offset).ok()?, index))
    }

    /// Returns a slice of `self.shuffling` that represents the `index`'th committee in the epoch.
    fn compute_committee(&self, index: usize) -> Option<&[usize]> {
        self.shuffling.get(self.compute_committee_range(index)?)
    }

    /// Returns a range of `self.shuffling` that represents the `index`'th committee in the epoch.
    ///
    /// To avoid a divide-by-zero, returns `None` if there are no committees.
    ///
    /// Will also return `None` if the index is out of bounds.
    fn compute_committee_range(&self, index: usize) -> Option<Range<usize>> {
        compute_committee_range_in_epoch(self.epoch_committee_count(), index, self.shuffling.len())
    }

    /// Returns the index of some validator in `self.shuffling`.
    fn shuffled_position(&self, validator_index: usize) -> Option<usize> {
        self.shuffling_positions
            .get(validator_index)?
            .map(|p| p.get() - 1)
    }
}

/// Returns the number of committees in each slot of an epoch with `active_validator_count` active
/// validators.
pub fn get_committee_count_per_slot(
    active_validator_count: usize,
    spec: &ChainSpec,
) -> Result<u64, Error> {
    let slots_per_epoch = spec.slots_per_epoch as usize;

    Ok(std::cmp::max(
        1,
        std::cmp::min(
            spec.max_committees_per_slot,
            active_validator_count
                .safe_div(slots_per_epoch)?
                .safe_div(spec.target_committee_size)?,
        ),
    ) as u64)
}

/// Computes the position of the given `committee_index` with respect to all committees in the
/// epoch.
///
/// The return result may be used to provide input to the `compute_committee_range_in_epoch`
/// function.
pub fn compute_committee_index_in_epoch(
    slot: Slot,
    slots_per_epoch: usize,
    committees_per_slot: usize,
    committee_index: usize,
) -> usize {
    (slot.as_usize() % slots_per_epoch) * committees_per_slot + committee_index
}

/// Computes the range for slicing the shuffled indices to determine the members of a committee.
///
/// The `index_in_epoch` parameter can be computed with `compute_committee_index_in_epoch`.
pub fn compute_committee_range_in_epoch(
    epoch_committee_count: usize,
    index_in_epoch: usize,
    shuffling_len: usize,
) -> Option<Range<usize>> {
    if epoch_committee_count == 0 || index_in_epoch >= epoch_committee_count {
        return None;
    }

    let start = (shuffling_len * index_in_epoch) / epoch_committee_count;
    let end = (shuffling_len * (index_in_epoch + 1)) / epoch_committee_count;

    Some(start..end)
}

/// Returns the total number of committees in an epoch.
pub fn epoch_committee_count(committees_per_slot: usize, slots_per_epoch: usize) -> usize {
    committees_per_slot * slots_per_epoch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SwapOrNotShuffle;
    use std::collections::HashSet;

    fn spec_with(slots_per_epoch: u64, target_committee_size: usize) -> ChainSpec {
        ChainSpec {
            slots_per_epoch,
            target_committee_size,
            ..ChainSpec::minimal()
        }
    }

    fn build(epoch: u64, active: Vec<usize>, spec: &ChainSpec) -> CommitteeCache {
        let shuffle = SwapOrNotShuffle::new(spec.shuffle_round_count);
        CommitteeCache::initialized(
            Epoch::new(epoch),
            active,
            Hash256::repeat_byte(42),
            &shuffle,
            spec,
        )
        .unwrap()
    }

    #[test]
    fn committee_count_per_slot_is_clamped() {
        let spec = spec_with(32, 4);
        assert_eq!(get_committee_count_per_slot(0, &spec), Ok(1));
        assert_eq!(get_committee_count_per_slot(128, &spec), Ok(1));
        assert_eq!(get_committee_count_per_slot(256, &spec), Ok(2));
        assert_eq!(
            get_committee_count_per_slot(1_000_000, &spec),
            Ok(spec.max_committees_per_slot as u64)
        );
    }

    #[test]
    fn empty_active_set() {
        let spec = ChainSpec::minimal();
        let shuffle = SwapOrNotShuffle::new(spec.shuffle_round_count);
        assert_eq!(
            CommitteeCache::initialized(Epoch::new(3), vec![], Hash256::zero(), &shuffle, &spec),
            Err(Error::EmptyActiveSet {
                epoch: Epoch::new(3)
            })
        );
    }

    #[test]
    fn worked_example_128_validators() {
        // 128 validators, 32 slots, target committee size 4: one committee per slot of 4.
        let spec = spec_with(32, 4);
        let cache = build(2, (0..128).collect(), &spec);

        assert_eq!(cache.committees_per_slot(), 1);
        assert_eq!(cache.epoch_committee_count(), 32);

        let by_slot = cache.committees_by_slot().unwrap();
        assert_eq!(by_slot.len(), 32);
        assert_eq!(by_slot.keys().next(), Some(&Slot::new(64)));

        let mut total = 0;
        for committees in by_slot.values() {
            assert_eq!(committees.len(), 1);
            assert_eq!(committees[0].members.len(), 4);
            total += committees[0].members.len();
        }
        assert_eq!(total, 128);
    }

    #[test]
    fn committees_partition_the_active_set() {
        let spec = ChainSpec::minimal();
        for n in [1, 7, 31, 100, 257] {
            // Sparse, non-contiguous active indices.
            let active: Vec<usize> = (0..n).map(|i| i * 3 + 1).collect();
            let cache = build(5, active.clone(), &spec);

            let mut seen = HashSet::new();
            for committees in cache.committees_by_slot().unwrap().values() {
                for committee in committees {
                    for member in &committee.members {
                        assert!(seen.insert(*member), "{} appears twice", member);
                    }
                }
            }
            assert_eq!(seen, active.into_iter().collect::<HashSet<_>>());
        }
    }

    #[test]
    fn deterministic() {
        let spec = ChainSpec::minimal();
        let a = build(9, (0..64).collect(), &spec);
        let b = build(9, (0..64).collect(), &spec);
        assert_eq!(a, b);
        assert_eq!(a.committees_by_slot(), b.committees_by_slot());
    }

    #[test]
    fn attestation_duties_agree_with_committees() {
        let spec = ChainSpec::minimal();
        let cache = build(1, (0..50).collect(), &spec);

        for committees in cache.committees_by_slot().unwrap().values() {
            for committee in committees {
                for (position, member) in committee.members.iter().enumerate() {
                    let duty = cache.get_attestation_duties(*member).unwrap();
                    assert_eq!(duty.slot, committee.slot);
                    assert_eq!(duty.committee_index, committee.committee_index);
                    assert_eq!(duty.committee_position, position);
                    assert_eq!(duty.committee_len, committee.members.len());
                }
            }
        }
        assert_eq!(cache.get_attestation_duties(50), None);
    }

    #[test]
    fn out_of_epoch_slot_has_no_committees() {
        let spec = ChainSpec::minimal();
        let cache = build(1, (0..16).collect(), &spec);
        assert!(cache.get_beacon_committees_at_slot(Slot::new(0)).unwrap().is_empty());
        assert_eq!(cache.get_beacon_committee(Slot::new(8), 99), None);
    }
}
