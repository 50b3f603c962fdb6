use crate::beacon_proposer_cache::BeaconProposerCache;
use crate::{metrics, Error, Shuffle};
use ethereum_hashing::hash;
use parking_lot::Mutex;
use safe_arith::SafeArith;
use slog::{debug, Logger};
use std::collections::BTreeMap;
use std::sync::Arc;
use types::{ChainSpec, Epoch, Hash256, Slot, Validator};

const MAX_RANDOM_BYTE: u64 = (1 << 8) - 1;

/// Upper bound on the number of candidates sampled for a single slot.
///
/// With a realistic registry a proposer is found within a handful of samples; hitting this bound
/// means every sampled candidate had a negligible effective balance.
pub const MAX_PROPOSER_SAMPLES: usize = 1 << 16;

/// The block proposers for every slot of an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochProposers {
    pub epoch: Epoch,
    /// The proposer-domain seed of `epoch` the proposers were selected under.
    pub seed: Hash256,
    pub by_slot: BTreeMap<Slot, usize>,
    pub by_validator: BTreeMap<usize, Vec<Slot>>,
}

impl EpochProposers {
    pub fn proposer_at(&self, slot: Slot) -> Option<usize> {
        self.by_slot.get(&slot).copied()
    }

    /// The slots `validator_index` proposes in, ascending. Empty if it has no proposal duty.
    pub fn slots_for(&self, validator_index: usize) -> &[Slot] {
        self.by_validator
            .get(&validator_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}

/// Selects one proposer per slot and memoizes the result per `(epoch, seed)`.
pub struct ProposerDutyComputer<S> {
    shuffle: S,
    cache: Mutex<BeaconProposerCache>,
    spec: Arc<ChainSpec>,
    log: Logger,
}

impl<S: Shuffle> ProposerDutyComputer<S> {
    pub fn new(shuffle: S, cache_size: usize, spec: Arc<ChainSpec>, log: Logger) -> Self {
        Self {
            shuffle,
            cache: Mutex::new(BeaconProposerCache::new(cache_size)),
            spec,
            log,
        }
    }

    /// Returns the proposers of `epoch`.
    ///
    /// `seed` is the proposer-domain seed of `epoch` and `validators` the registry the active
    /// indices were taken from (effective balances weight the selection).
    pub fn compute_proposers(
        &self,
        epoch: Epoch,
        active_indices: &[usize],
        seed: Hash256,
        validators: &[Validator],
    ) -> Result<Arc<EpochProposers>, Error> {
        let generation = {
            let mut cache = self.cache.lock();
            if let Some(proposers) = cache.get_epoch(epoch, seed) {
                return Ok(proposers);
            }
            cache.generation()
        };

        // Selection runs without holding the lock; concurrent misses for the same key compute
        // the same value and the first insert wins. A result that straddles an invalidation is
        // returned but not cached.
        let proposers = {
            let _timer = metrics::start_timer(&metrics::PROPOSER_COMPUTATION_TIMES);
            compute_epoch_proposers(
                epoch,
                active_indices,
                seed,
                validators,
                &self.shuffle,
                &self.spec,
            )?
        };

        debug!(
            self.log,
            "Computed epoch proposers";
            "epoch" => epoch,
            "active_validators" => active_indices.len(),
            "proposers" => proposers.len(),
        );

        Ok(self.cache.lock().insert(Arc::new(proposers), generation))
    }

    /// Forget every cached epoch from `epoch` onwards.
    pub fn invalidate_from(&self, epoch: Epoch) {
        let removed = self.cache.lock().invalidate_from(epoch);
        if removed > 0 {
            debug!(
                self.log,
                "Invalidated proposer cache";
                "from_epoch" => epoch,
                "entries" => removed,
            );
        }
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }
}

/// Select the proposer of every slot in `epoch`, without caching.
///
/// The genesis slot has no proposer, so the genesis epoch yields one fewer entry than there are
/// slots in an epoch.
pub fn compute_epoch_proposers<S: Shuffle + ?Sized>(
    epoch: Epoch,
    active_indices: &[usize],
    seed: Hash256,
    validators: &[Validator],
    shuffle: &S,
    spec: &ChainSpec,
) -> Result<EpochProposers, Error> {
    if spec.slots_per_epoch == 0 {
        return Err(Error::ZeroSlotsPerEpoch);
    }
    if active_indices.is_empty() {
        return Err(Error::EmptyActiveSet { epoch });
    }

    let mut by_slot = BTreeMap::new();
    let mut by_validator: BTreeMap<usize, Vec<Slot>> = BTreeMap::new();

    for slot in epoch.slot_iter(spec.slots_per_epoch) {
        if slot == spec.genesis_slot {
            continue;
        }

        let slot_seed = proposer_seed(&seed, slot);
        let proposer =
            compute_proposer_index(active_indices, &slot_seed, validators, shuffle, spec)
                .map_err(|e| match e {
                    Error::ShuffleFailed { .. } => Error::ShuffleFailed { slot },
                    Error::ProposerSelectionFailed { .. } => {
                        Error::ProposerSelectionFailed { slot }
                    }
                    other => other,
                })?;

        by_slot.insert(slot, proposer);
        by_validator.entry(proposer).or_default().push(slot);
    }

    let expected = expected_proposer_count(epoch, spec);
    let found = by_validator.values().map(Vec::len).sum::<usize>();
    if by_slot.len() != expected || found != expected {
        return Err(Error::ProposerCountMismatch {
            epoch,
            expected,
            found: by_slot.len(),
        });
    }

    Ok(EpochProposers {
        epoch,
        seed,
        by_slot,
        by_validator,
    })
}

/// The number of proposers an epoch must have.
pub fn expected_proposer_count(epoch: Epoch, spec: &ChainSpec) -> usize {
    let slots = spec.slots_per_epoch as usize;
    if epoch.position(spec.genesis_slot, spec.slots_per_epoch).is_some() {
        slots.saturating_sub(1)
    } else {
        slots
    }
}

/// The per-slot seed: `hash(epoch_seed ++ slot)`.
pub fn proposer_seed(epoch_seed: &Hash256, slot: Slot) -> Hash256 {
    let mut preimage = epoch_seed.as_bytes().to_vec();
    preimage.extend_from_slice(&slot.as_u64().to_le_bytes());
    Hash256::from_slice(&hash(&preimage))
}

/// Compute the proposer from a list of active indices, weighting candidates by effective
/// balance.
pub fn compute_proposer_index<S: Shuffle + ?Sized>(
    indices: &[usize],
    seed: &Hash256,
    validators: &[Validator],
    shuffle: &S,
    spec: &ChainSpec,
) -> Result<usize, Error> {
    if indices.is_empty() {
        return Err(Error::EmptyActiveSet {
            epoch: Epoch::new(0),
        });
    }

    for i in 0..MAX_PROPOSER_SAMPLES {
        let shuffled_index = shuffle
            .shuffled_index(i.safe_rem(indices.len())?, indices.len(), seed)
            .ok_or(Error::ShuffleFailed {
                slot: Slot::new(0),
            })?;
        let candidate_index = *indices
            .get(shuffled_index)
            .ok_or(Error::ShuffleFailed {
                slot: Slot::new(0),
            })?;
        let random_byte = shuffling_random_byte(i, seed)?;
        let effective_balance = validators
            .get(candidate_index)
            .ok_or(Error::UnknownValidator(candidate_index))?
            .effective_balance;

        if effective_balance.safe_mul(MAX_RANDOM_BYTE)?
            >= spec
                .max_effective_balance
                .safe_mul(u64::from(random_byte))?
        {
            return Ok(candidate_index);
        }
    }

    Err(Error::ProposerSelectionFailed {
        slot: Slot::new(0),
    })
}

/// Get a random byte from the given `seed`.
fn shuffling_random_byte(i: usize, seed: &Hash256) -> Result<u8, Error> {
    let mut preimage = seed.as_bytes().to_vec();
    preimage.extend_from_slice(&(i.safe_div(32)? as u64).to_le_bytes());
    let index = i.safe_rem(32)?;
    Ok(hash(&preimage).get(index).copied().unwrap_or(u8::MAX))
}
