pub use metrics::*;
use std::sync::LazyLock;

/*
 * Streams
 */
pub static ACTIVE_DUTY_STREAMS: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "duty_service_active_duty_streams",
        "Number of open duty info streams",
    )
});
pub static ACTIVE_VALIDATOR_INFO_STREAMS: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "duty_service_active_validator_info_streams",
        "Number of open validator info streams",
    )
});
pub static DUTY_SNAPSHOTS_PUSHED: LazyLock<Result<IntCounterVec>> = LazyLock::new(|| {
    try_create_int_counter_vec(
        "duty_service_duty_snapshots_pushed_total",
        "Count of duty snapshots pushed to clients, by trigger",
        &["trigger"],
    )
});
pub static DUTY_EPOCHS_SKIPPED: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "duty_service_duty_epochs_skipped_total",
        "Count of epochs not pushed because their snapshot could not be computed",
    )
});
pub static DUTY_STREAMS_CLOSED: LazyLock<Result<IntCounterVec>> = LazyLock::new(|| {
    try_create_int_counter_vec(
        "duty_service_duty_streams_closed_total",
        "Count of duty streams closed, by reason",
        &["reason"],
    )
});
pub static EVENT_FEED_LAGGED: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "duty_service_event_feed_lagged_total",
        "Count of times a stream fell behind its event feed",
    )
});
pub static DUTY_SNAPSHOT_TIMES: LazyLock<Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "duty_service_duty_snapshot_seconds",
        "Time taken to compute a duty snapshot",
    )
});
pub static VALIDATOR_INFO_RECORDS_PUSHED: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "duty_service_validator_info_records_pushed_total",
        "Count of validator info records pushed to clients",
    )
});

/*
 * Requests
 */
pub static REQUESTS_TOTAL: LazyLock<Result<IntCounterVec>> = LazyLock::new(|| {
    try_create_int_counter_vec(
        "duty_service_requests_total",
        "Count of request/response calls, by endpoint",
        &["endpoint"],
    )
});
pub static REQUEST_TIMES: LazyLock<Result<HistogramVec>> = LazyLock::new(|| {
    try_create_histogram_vec(
        "duty_service_request_seconds",
        "Time taken to serve request/response calls, by endpoint",
        &["endpoint"],
    )
});
