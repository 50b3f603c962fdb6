//! An LRU cache of the proposers for an epoch.
//!
//! Proposer selection depends on the effective balances in the state as well as the seed, so a
//! cached entry is only valid while the registry it was computed from is canonical. Callers
//! invalidate the cache from the reorg epoch onwards whenever the head changes.
//!
//! Each invalidation starts a new generation and only results computed under the current
//! generation are stored, so a selection that began before a reorg is never cached after it.

use crate::metrics;
use crate::proposer_duties::EpochProposers;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use types::{Epoch, Hash256};

pub const DEFAULT_CACHE_SIZE: usize = 16;

pub struct BeaconProposerCache {
    cache: LruCache<(Epoch, Hash256), Arc<EpochProposers>>,
    generation: u64,
}

impl Default for BeaconProposerCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl BeaconProposerCache {
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN)),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the proposers for `epoch` computed under `seed`, if known.
    pub fn get_epoch(&mut self, epoch: Epoch, seed: Hash256) -> Option<Arc<EpochProposers>> {
        let opt = self.cache.get(&(epoch, seed)).cloned();

        if opt.is_some() {
            metrics::inc_counter(&metrics::PROPOSER_CACHE_HITS);
        } else {
            metrics::inc_counter(&metrics::PROPOSER_CACHE_MISSES);
        }

        opt
    }

    /// Insert the proposers for an epoch, keeping any entry which is already present.
    ///
    /// Proposers selected under an older `generation` are handed back without being cached.
    pub fn insert(
        &mut self,
        proposers: Arc<EpochProposers>,
        generation: u64,
    ) -> Arc<EpochProposers> {
        if generation != self.generation {
            metrics::inc_counter(&metrics::STALE_CACHE_INSERTS);
            return proposers;
        }
        let key = (proposers.epoch, proposers.seed);
        if let Some(existing) = self.cache.get(&key) {
            return existing.clone();
        }
        self.cache.put(key, proposers.clone());
        proposers
    }

    /// Drop every entry for `epoch` or later. Returns the number of entries removed.
    pub fn invalidate_from(&mut self, epoch: Epoch) -> usize {
        self.generation = self.generation.wrapping_add(1);
        let stale = self
            .cache
            .iter()
            .filter(|((cached_epoch, _), _)| *cached_epoch >= epoch)
            .map(|(key, _)| *key)
            .collect::<Vec<_>>();

        for key in &stale {
            self.cache.pop(key);
        }

        metrics::inc_counter_by(&metrics::CACHE_INVALIDATIONS, stale.len() as u64);
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn proposers(epoch: u64) -> Arc<EpochProposers> {
        Arc::new(EpochProposers {
            epoch: Epoch::new(epoch),
            seed: Hash256::repeat_byte(epoch as u8),
            by_slot: BTreeMap::new(),
            by_validator: BTreeMap::new(),
        })
    }

    #[test]
    fn keyed_by_epoch_and_seed() {
        let mut cache = BeaconProposerCache::new(4);
        let entry = proposers(3);
        cache.insert(entry.clone(), cache.generation());

        assert_eq!(cache.get_epoch(Epoch::new(3), entry.seed), Some(entry));
        assert_eq!(cache.get_epoch(Epoch::new(3), Hash256::zero()), None);
        assert_eq!(cache.get_epoch(Epoch::new(4), Hash256::repeat_byte(3)), None);
    }

    #[test]
    fn invalidation() {
        let mut cache = BeaconProposerCache::new(4);
        for epoch in 0..4 {
            cache.insert(proposers(epoch), cache.generation());
        }
        assert_eq!(cache.invalidate_from(Epoch::new(2)), 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.get_epoch(Epoch::new(1), Hash256::repeat_byte(1)).is_some());
        assert!(cache.get_epoch(Epoch::new(2), Hash256::repeat_byte(2)).is_none());
    }

    #[test]
    fn selection_from_before_a_reorg_is_not_cached() {
        let mut cache = BeaconProposerCache::new(4);
        let generation = cache.generation();
        cache.invalidate_from(Epoch::new(3));

        let stale = proposers(3);
        let returned = cache.insert(stale.clone(), generation);
        assert!(Arc::ptr_eq(&returned, &stale));
        assert!(cache.is_empty());

        // A selection that started after the reorg is cached, even for the same seed.
        let fresh = proposers(3);
        let returned = cache.insert(fresh.clone(), cache.generation());
        assert!(Arc::ptr_eq(&returned, &fresh));
        let cached = cache.get_epoch(Epoch::new(3), fresh.seed).unwrap();
        assert!(Arc::ptr_eq(&cached, &fresh));
    }
}
