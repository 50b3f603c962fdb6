use crate::committee_cache::CommitteeCache;
use crate::metrics;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use types::{Epoch, Hash256};

/// The default number of epochs of committees kept in memory.
///
/// Each entry is roughly `8 * active_validators` bytes (the shuffling) plus the same again for
/// the position table, so 16 entries with 1M validators is approx 256 MB.
pub const DEFAULT_CACHE_SIZE: usize = 16;

/// Identifies a shuffling. Two states which agree on the attester seed for an epoch agree on its
/// committees, so the seed stands in for the block root used by fork choice.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct ShufflingId {
    pub shuffling_epoch: Epoch,
    pub seed: Hash256,
}

impl ShufflingId {
    pub fn new(shuffling_epoch: Epoch, seed: Hash256) -> Self {
        Self {
            shuffling_epoch,
            seed,
        }
    }
}

/// Provides an LRU cache for `CommitteeCache`.
///
/// It has been named `ShufflingCache` because `CommitteeCacheCache` is a bit weird and looks like
/// a find/replace error.
///
/// Every invalidation starts a new generation. A shuffling may only be inserted under the
/// generation that was current when its computation started, so a computation that straddles an
/// invalidation cannot put a pre-reorg result back into the cache.
pub struct ShufflingCache {
    cache: LruCache<ShufflingId, Arc<CommitteeCache>>,
    generation: u64,
}

impl Default for ShufflingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl ShufflingCache {
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN)),
            generation: 0,
        }
    }

    /// The generation a computation must present when inserting its result.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&mut self, key: &ShufflingId) -> Option<Arc<CommitteeCache>> {
        let opt = self.cache.get(key).cloned();

        if opt.is_some() {
            metrics::inc_counter(&metrics::SHUFFLING_CACHE_HITS);
        } else {
            metrics::inc_counter(&metrics::SHUFFLING_CACHE_MISSES);
        }

        opt
    }

    pub fn contains(&self, key: &ShufflingId) -> bool {
        self.cache.contains(key)
    }

    /// Insert `committee_cache`, computed under `generation`, returning the entry to use.
    ///
    /// If another caller raced us and already inserted the same shuffling, the existing entry is
    /// kept and returned so all callers share one allocation. A result from an older generation
    /// is returned to its caller but not cached.
    pub fn insert(
        &mut self,
        key: ShufflingId,
        committee_cache: Arc<CommitteeCache>,
        generation: u64,
    ) -> Arc<CommitteeCache> {
        if generation != self.generation {
            metrics::inc_counter(&metrics::STALE_CACHE_INSERTS);
            return committee_cache;
        }
        if let Some(existing) = self.cache.get(&key) {
            return existing.clone();
        }
        self.cache.put(key, committee_cache.clone());
        committee_cache
    }

    /// Drop every shuffling for `epoch` or later and start a new generation. Returns the number
    /// of entries removed.
    pub fn invalidate_from(&mut self, epoch: Epoch) -> usize {
        self.generation = self.generation.wrapping_add(1);
        let stale = self
            .cache
            .iter()
            .filter(|(key, _)| key.shuffling_epoch >= epoch)
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
    use crate::SwapOrNotShuffle;
    use types::ChainSpec;

    fn committee_cache(epoch: u64, seed: Hash256) -> Arc<CommitteeCache> {
        let spec = ChainSpec::minimal();
        let shuffle = SwapOrNotShuffle::new(spec.shuffle_round_count);
        Arc::new(
            CommitteeCache::initialized(Epoch::new(epoch), (0..16).collect(), seed, &shuffle, &spec)
                .unwrap(),
        )
    }

    fn key(epoch: u64, seed: Hash256) -> ShufflingId {
        ShufflingId::new(Epoch::new(epoch), seed)
    }

    #[test]
    fn insert_and_get() {
        let mut cache = ShufflingCache::new(4);
        let seed = Hash256::repeat_byte(1);
        assert!(cache.get(&key(1, seed)).is_none());

        let entry = committee_cache(1, seed);
        cache.insert(key(1, seed), entry.clone(), cache.generation());
        assert_eq!(cache.get(&key(1, seed)), Some(entry));
        assert!(cache.get(&key(1, Hash256::repeat_byte(2))).is_none());
    }

    #[test]
    fn first_insert_wins() {
        let mut cache = ShufflingCache::new(4);
        let seed = Hash256::repeat_byte(1);
        let first = committee_cache(1, seed);
        let second = committee_cache(1, seed);

        let kept = cache.insert(key(1, seed), first.clone(), cache.generation());
        assert!(Arc::ptr_eq(&kept, &first));
        let kept = cache.insert(key(1, seed), second, cache.generation());
        assert!(Arc::ptr_eq(&kept, &first));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = ShufflingCache::new(2);
        let seed = Hash256::zero();
        cache.insert(key(1, seed), committee_cache(1, seed), cache.generation());
        cache.insert(key(2, seed), committee_cache(2, seed), cache.generation());
        cache.insert(key(3, seed), committee_cache(3, seed), cache.generation());

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&key(1, seed)));
        assert!(cache.contains(&key(3, seed)));
    }

    #[test]
    fn zero_size_still_caches_one_entry() {
        let mut cache = ShufflingCache::new(0);
        let seed = Hash256::zero();
        cache.insert(key(1, seed), committee_cache(1, seed), cache.generation());
        assert!(cache.contains(&key(1, seed)));
    }

    #[test]
    fn invalidate_from_epoch() {
        let mut cache = ShufflingCache::new(8);
        let seed = Hash256::zero();
        for epoch in 1..=5 {
            cache.insert(key(epoch, seed), committee_cache(epoch, seed), cache.generation());
        }

        assert_eq!(cache.invalidate_from(Epoch::new(3)), 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key(2, seed)));
        assert!(!cache.contains(&key(3, seed)));
        assert_eq!(cache.invalidate_from(Epoch::new(3)), 0);
    }

    #[test]
    fn insert_started_before_invalidation_is_not_cached() {
        let mut cache = ShufflingCache::new(8);
        let old_seed = Hash256::repeat_byte(1);
        let new_seed = Hash256::repeat_byte(2);

        // Computation on the old branch starts, then a reorg invalidates the epoch.
        let stale_generation = cache.generation();
        cache.invalidate_from(Epoch::new(3));
        let fresh_generation = cache.generation();

        let stale = committee_cache(3, old_seed);
        let returned = cache.insert(key(3, old_seed), stale.clone(), stale_generation);
        assert!(Arc::ptr_eq(&returned, &stale));
        assert!(cache.is_empty());

        let fresh = committee_cache(3, new_seed);
        let returned = cache.insert(key(3, new_seed), fresh.clone(), fresh_generation);
        assert!(Arc::ptr_eq(&returned, &fresh));
        assert_eq!(cache.get(&key(3, new_seed)), Some(fresh));
    }
}
