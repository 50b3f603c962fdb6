pub use metrics::*;
use std::sync::LazyLock;

pub static ASYNC_TASKS_COUNT: LazyLock<Result<IntGaugeVec>> = LazyLock::new(|| {
    try_create_int_gauge_vec(
        "executor_async_tasks_count",
        "Number of running tasks, by task name",
        &["task"],
    )
});
pub static TASKS_HISTOGRAM: LazyLock<Result<HistogramVec>> = LazyLock::new(|| {
    try_create_histogram_vec(
        "executor_async_tasks_seconds",
        "Time from spawn until a task completes or is cancelled by the exit signal",
        &["task"],
    )
});
