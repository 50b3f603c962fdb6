use crate::committee_cache::{CommitteeAssignment, CommitteeCache};
use crate::shuffling_cache::{ShufflingCache, ShufflingId};
use crate::{metrics, Error, Shuffle};
use parking_lot::Mutex;
use slog::{debug, Logger};
use std::collections::BTreeMap;
use std::sync::Arc;
use types::{ChainSpec, Epoch, Hash256, Slot};

/// Partitions the active validators of an epoch into per-slot committees.
///
/// The result is a pure function of `(epoch, active_indices, seed)`. Results are memoized in an
/// engine-owned `ShufflingCache` which must be invalidated when the head is reorganised, since a
/// reorg may change the active set that was computed under a given seed.
pub struct CommitteeAssignmentEngine<S> {
    shuffle: S,
    shuffling_cache: Mutex<ShufflingCache>,
    spec: Arc<ChainSpec>,
    log: Logger,
}

impl<S: Shuffle> CommitteeAssignmentEngine<S> {
    pub fn new(shuffle: S, cache_size: usize, spec: Arc<ChainSpec>, log: Logger) -> Self {
        Self {
            shuffle,
            shuffling_cache: Mutex::new(ShufflingCache::new(cache_size)),
            spec,
            log,
        }
    }

    /// Returns the committees of `epoch` grouped by slot.
    pub fn compute_committees(
        &self,
        epoch: Epoch,
        active_indices: Vec<usize>,
        seed: Hash256,
    ) -> Result<BTreeMap<Slot, Vec<CommitteeAssignment>>, Error> {
        self.committee_cache(epoch, active_indices, seed)?
            .committees_by_slot()
    }

    /// Returns the (possibly cached) shuffling of `epoch`.
    pub fn committee_cache(
        &self,
        epoch: Epoch,
        active_indices: Vec<usize>,
        seed: Hash256,
    ) -> Result<Arc<CommitteeCache>, Error> {
        let key = ShufflingId::new(epoch, seed);

        let generation = {
            let mut shuffling_cache = self.shuffling_cache.lock();
            if let Some(cache) = shuffling_cache.get(&key) {
                return Ok(cache);
            }
            shuffling_cache.generation()
        };

        // The shuffle is computed without the lock held so that other epochs can be served
        // concurrently.
        let active_validator_count = active_indices.len();
        let committee_cache = {
            let _timer = metrics::start_timer(&metrics::COMMITTEE_COMPUTATION_TIMES);
            CommitteeCache::initialized(epoch, active_indices, seed, &self.shuffle, &self.spec)?
        };

        debug!(
            self.log,
            "Computed committee shuffling";
            "epoch" => epoch,
            "active_validators" => active_validator_count,
            "committees_per_slot" => committee_cache.committees_per_slot(),
        );

        Ok(self
            .shuffling_cache
            .lock()
            .insert(key, Arc::new(committee_cache), generation))
    }

    /// Forget every cached shuffling from `epoch` onwards.
    pub fn invalidate_from(&self, epoch: Epoch) {
        let removed = self.shuffling_cache.lock().invalidate_from(epoch);
        if removed > 0 {
            debug!(
                self.log,
                "Invalidated shuffling cache";
                "from_epoch" => epoch,
                "entries" => removed,
            );
        }
    }

    pub fn cached_shufflings(&self) -> usize {
        self.shuffling_cache.lock().len()
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }
}
