mod metrics;
pub mod test_utils;

use futures::prelude::*;
use slog::{debug, trace, warn};
use std::future::Future;
use tokio::runtime::Handle;

/// A runtime handle paired with the service-wide exit signal.
#[derive(Clone)]
pub struct TaskExecutor {
    /// The handle to the runtime on which tasks are spawned
    handle: Handle,
    /// Closed when the service shuts down.
    exit: async_channel::Receiver<()>,

    log: slog::Logger,
}

impl TaskExecutor {
    /// Create a new task executor.
    ///
    /// ## Note
    ///
    /// The executor's tasks observe `exit`: the service shuts down once every sender of the
    /// channel has been dropped or closed.
    pub fn new(handle: Handle, exit: async_channel::Receiver<()>, log: slog::Logger) -> Self {
        Self { handle, exit, log }
    }

    /// Spawn a future on the tokio runtime.
    ///
    /// The future is wrapped in an exit future which cancels the task when the executor's exit
    /// signal fires. This function generates metrics on the number of tasks and task duration.
    /// The task is spawned even if those metrics are unavailable.
    pub fn spawn(&self, task: impl Future<Output = ()> + Send + 'static, name: &'static str) {
        let exit = self.exit();
        let log = self.log.clone();
        let int_gauge = self.task_gauge(name);
        let timer = metrics::start_timer_vec(&metrics::TASKS_HISTOGRAM, &[name]);

        // Task is shutdown before it completes if `exit` receives
        let future = future::select(Box::pin(task), Box::pin(exit)).then(move |either| {
            match either {
                future::Either::Left(_) => trace!(log, "Async task completed"; "task" => name),
                future::Either::Right(_) => {
                    debug!(log, "Async task shutdown, exit received"; "task" => name)
                }
            }
            if let Some(int_gauge) = int_gauge {
                int_gauge.dec();
            }
            metrics::stop_timer(timer);
            futures::future::ready(())
        });

        self.handle.spawn(future);
    }

    /// Spawn a future on the tokio runtime. This function does not wrap the task in an exit
    /// future, the task is expected to observe `TaskExecutor::exit` itself.
    pub fn spawn_without_exit(
        &self,
        task: impl Future<Output = ()> + Send + 'static,
        name: &'static str,
    ) {
        let int_gauge = self.task_gauge(name);
        let future = task.then(move |_| {
            if let Some(int_gauge) = int_gauge {
                int_gauge.dec();
            }
            futures::future::ready(())
        });

        self.handle.spawn(future);
    }

    /// Counts a new task against `name`, returning the gauge to decrement when it ends.
    fn task_gauge(&self, name: &'static str) -> Option<metrics::IntGauge> {
        match metrics::get_int_gauge(&metrics::ASYNC_TASKS_COUNT, &[name]) {
            Some(int_gauge) => {
                int_gauge.inc();
                Some(int_gauge)
            }
            None => {
                warn!(self.log, "Spawning task without metrics"; "task" => name);
                None
            }
        }
    }

    /// Returns a future that completes when `async-channel::Sender` is dropped or () is sent,
    /// which translates to the exit signal being triggered.
    pub fn exit(&self) -> impl Future<Output = ()> {
        let exit = self.exit.clone();
        async move {
            let _ = exit.recv().await;
        }
    }
}
