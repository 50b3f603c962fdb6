use crate::TaskExecutor;
use logging::test_logger;
use slog::Logger;
use std::sync::Arc;
use tokio::runtime;

/// Whilst the `TestRuntime` is not necessarily useful in itself, it provides the necessary
/// components for creating a `TaskExecutor` during tests.
///
/// May create its own runtime or use an existing one.
///
/// ## Warning
///
/// This struct should never be used in production, only testing.
pub struct TestRuntime {
    runtime: Option<Arc<tokio::runtime::Runtime>>,
    exit_signal: async_channel::Sender<()>,
    pub task_executor: TaskExecutor,
    pub log: Logger,
}

impl Default for TestRuntime {
    /// If called *inside* an existing runtime, instantiates `Self` using a handle to that runtime.
    /// If called *outside* any existing runtime, create a new `Runtime` and keep it alive until
    /// the `Self` is dropped.
    fn default() -> Self {
        let (exit_signal, exit) = async_channel::bounded(1);
        let log = test_logger();

        let (runtime, handle) = if let Ok(handle) = runtime::Handle::try_current() {
            (None, handle)
        } else {
            let runtime = Arc::new(
                runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .expect("Should build test runtime"),
            );
            let handle = runtime.handle().clone();
            (Some(runtime), handle)
        };

        let task_executor = TaskExecutor::new(handle, exit, log.clone());

        Self {
            runtime,
            exit_signal,
            task_executor,
            log,
        }
    }
}

impl TestRuntime {
    /// Fires the exit signal observed by every task spawned on `self.task_executor`.
    pub fn fire_exit(&self) {
        self.exit_signal.close();
    }
}

impl Drop for TestRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            if let Ok(runtime) = Arc::try_unwrap(runtime) {
                runtime.shutdown_background()
            }
        }
    }
}
