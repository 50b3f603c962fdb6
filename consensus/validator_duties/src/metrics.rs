pub use metrics::*;
use std::sync::LazyLock;

/*
 * Shuffling cache
 */
pub static SHUFFLING_CACHE_HITS: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "validator_duties_shuffling_cache_hits_total",
        "Count of times the committee shuffling was served from the cache",
    )
});
pub static SHUFFLING_CACHE_MISSES: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "validator_duties_shuffling_cache_misses_total",
        "Count of times the committee shuffling had to be computed",
    )
});
pub static COMMITTEE_COMPUTATION_TIMES: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "validator_duties_committee_computation_seconds",
        "Time taken to shuffle the active set into committees for an epoch",
    )
});

/*
 * Proposer cache
 */
pub static PROPOSER_CACHE_HITS: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "validator_duties_proposer_cache_hits_total",
        "Count of times epoch proposers were served from the cache",
    )
});
pub static PROPOSER_CACHE_MISSES: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "validator_duties_proposer_cache_misses_total",
        "Count of times epoch proposers had to be computed",
    )
});
pub static PROPOSER_COMPUTATION_TIMES: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "validator_duties_proposer_computation_seconds",
        "Time taken to select the proposers for an epoch",
    )
});

/*
 * Invalidation
 */
pub static CACHE_INVALIDATIONS: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "validator_duties_cache_invalidated_entries_total",
        "Count of cache entries dropped following a chain reorganisation",
    )
});
pub static STALE_CACHE_INSERTS: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "validator_duties_cache_stale_inserts_total",
        "Count of results not cached because they were computed before an invalidation",
    )
});

/*
 * Queue simulation
 */
pub static ACTIVATION_SIMULATION_EPOCHS: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram_with_buckets(
        "validator_duties_activation_simulation_epochs",
        "Number of epochs simulated to project the activation queue",
        Ok(vec![1.0, 4.0, 16.0, 64.0, 256.0, 1024.0, 4096.0]),
    )
});
