use serde::{Deserialize, Serialize};

/// Tunables of the duty service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity of each event feed before slow subscribers start lagging.
    pub event_channel_capacity: usize,
    /// Number of epochs of committee shufflings kept in memory.
    pub shuffling_cache_size: usize,
    /// Number of epochs of proposers kept in memory.
    pub proposer_cache_size: usize,
    /// Capacity of the per-connection outbound channel.
    pub outbound_buffer: usize,
    /// Upper bound on the number of keys a single validator-info connection may watch.
    pub max_validator_info_keys: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_channel_capacity: crate::events::DEFAULT_CHANNEL_CAPACITY,
            shuffling_cache_size: validator_duties::shuffling_cache::DEFAULT_CACHE_SIZE,
            proposer_cache_size: validator_duties::beacon_proposer_cache::DEFAULT_CACHE_SIZE,
            outbound_buffer: 32,
            max_validator_info_keys: 10_000,
        }
    }
}
